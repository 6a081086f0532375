//! # Main — CLI Entry Point
//!
//! Parses arguments, initialises logging, and routes subcommands to the
//! execution functions in `cli.rs`.
//!
//! ## Subcommands
//!
//! - `run`: resume from the prime store and generate primes until Ctrl-C
//!   (or up to `--to`).
//! - `count`: report how many primes are stored and the current checkpoint.
//! - `configure`: write the TOML configuration file.
//! - `version`: program details.
//!
//! ## Logging
//!
//! `LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` sets the filter
//! (default `info`). Logs go to stderr so command output on stdout stays clean.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "primegen", version, about = "Generate primes from a resumable checkpoint")]
struct Cli {
    /// Path to the TOML config file (default: ~/.primegen/config.toml)
    #[arg(long, env = "PRIMEGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate primes, resuming from the last stored prime
    Run {
        /// Exclusive upper bound; runs until interrupted when omitted
        #[arg(long)]
        to: Option<String>,
        /// Worker pool width (0 = all cores)
        #[arg(long)]
        workers: Option<usize>,
        /// Number of primes per sorted batch written to the store
        #[arg(long)]
        max_buffer_size: Option<usize>,
        /// Log rejected candidates
        #[arg(long)]
        show_fails: bool,
        /// Test candidates without writing to the store
        #[arg(long)]
        dry_run: bool,
    },
    /// Display the number of stored primes and the current checkpoint
    Count {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a configuration file
    Configure {
        #[arg(long)]
        max_buffer_size: Option<usize>,
        #[arg(long)]
        show_fails: Option<bool>,
        /// Fallback checkpoint when the store is empty (odd, >= 3)
        #[arg(long)]
        starting_prime: Option<String>,
        /// Directory holding the prime store
        #[arg(long)]
        base_path: Option<PathBuf>,
        /// Store file name, without `.txt`
        #[arg(long)]
        file_name: Option<String>,
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Display program details
    Version,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { .. } => cli::run_generate(&cli),
        Commands::Count { json } => cli::run_count(&cli, *json),
        Commands::Configure { .. } => cli::run_configure(&cli),
        Commands::Version => {
            cli::show_program_details();
            Ok(())
        }
    }
}
