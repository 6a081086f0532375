//! # CLI Execution Functions
//!
//! Kept out of `main.rs` so the entry point only parses and dispatches.

use anyhow::{Context, Result};
use primegen::candidates::CandidateSource;
use primegen::config::{self, PrimegenConfig};
use primegen::flush::FlushManager;
use primegen::pipeline::{Pipeline, PipelineConfig};
use primegen::progress::Progress;
use primegen::MillerRabin;
use rug::Integer;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Cli, Commands};

fn load_config(cli: &Cli) -> Result<(std::path::PathBuf, PrimegenConfig)> {
    let path = config::resolve_path(cli.config.as_deref())?;
    let config = PrimegenConfig::load(&path)?;
    Ok((path, config))
}

// ── Run ─────────────────────────────────────────────────────────

pub fn run_generate(cli: &Cli) -> Result<()> {
    let Commands::Run {
        to,
        workers,
        max_buffer_size,
        show_fails,
        dry_run,
    } = &cli.command
    else {
        unreachable!()
    };

    let (_, mut config) = load_config(cli)?;
    if let Some(w) = workers {
        config.workers = *w;
    }
    if let Some(m) = max_buffer_size {
        config.max_buffer_size = *m;
    }
    config.show_fails |= *show_fails;
    config.validate()?;

    let store = config.store();
    let start = store.read_last_prime(&config.starting_prime()?)?;
    let source = match to {
        Some(bound) => {
            let bound: Integer = bound
                .trim()
                .parse()
                .with_context(|| format!("--to {:?} is not an integer", bound))?;
            CandidateSource::bounded(start, bound)
        }
        None => CandidateSource::unbounded(start),
    };

    let initial_sequence = store.count()?;
    let persist = (!*dry_run).then(|| store.clone());
    let manager = Arc::new(FlushManager::new(
        persist,
        config.max_buffer_size,
        initial_sequence,
    ));
    let progress = Progress::new();
    let reporter =
        progress.start_reporter(Duration::from_secs(config.report_interval_secs.max(1)));

    info!(
        store = %store.path().display(),
        resume_from = %source.peek(),
        stored = initial_sequence,
        dry_run = *dry_run,
        "primegen starting"
    );

    let pipeline = Pipeline::new(
        PipelineConfig {
            workers: config.worker_count(),
            channel_capacity: config.channel_capacity,
            show_fails: config.show_fails,
        },
        Arc::new(MillerRabin {
            rounds: config.mr_rounds,
        }),
        manager,
        Arc::clone(&progress),
    );

    let rt = tokio::runtime::Runtime::new()?;
    let cancel = CancellationToken::new();
    let result = rt.block_on(async {
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            wait_for_shutdown().await;
            info!("Stop requested, draining pipeline");
            signal_cancel.cancel();
        });
        pipeline.run(source, cancel).await
    });

    progress.stop();
    let _ = reporter.join();
    progress.print_status();

    let summary = result.context("prime generation aborted")?;
    let checkpoint = summary
        .last_flushed
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unchanged".to_string());
    info!(
        primes = summary.primes,
        tested = summary.tested,
        stored = summary.sequence,
        checkpoint = %checkpoint,
        "Run complete"
    );
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

// ── Count ───────────────────────────────────────────────────────

pub fn run_count(cli: &Cli, json: bool) -> Result<()> {
    let (_, config) = load_config(cli)?;
    let store = config.store();
    let count = store.count()?;
    let checkpoint = store.read_last_prime(&config.starting_prime()?)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "count": count,
                "checkpoint": checkpoint.to_string(),
                "store": store.path().display().to_string(),
            })
        );
    } else {
        println!("{} primes stored in {}", count, store.path().display());
        println!("Checkpoint: {}", checkpoint);
    }
    Ok(())
}

// ── Configure ───────────────────────────────────────────────────

pub fn run_configure(cli: &Cli) -> Result<()> {
    let Commands::Configure {
        max_buffer_size,
        show_fails,
        starting_prime,
        base_path,
        file_name,
        workers,
    } = &cli.command
    else {
        unreachable!()
    };

    let (path, mut config) = load_config(cli)?;
    if let Some(v) = max_buffer_size {
        config.max_buffer_size = *v;
    }
    if let Some(v) = show_fails {
        config.show_fails = *v;
    }
    if let Some(v) = starting_prime {
        config.starting_prime = v.clone();
    }
    if let Some(v) = base_path {
        config.base_path = v.clone();
    }
    if let Some(v) = file_name {
        config.file_name = v.clone();
    }
    if let Some(v) = workers {
        config.workers = *v;
    }
    config.validate()?;
    config.save(&path)?;

    println!("Configuration saved to {}", path.display());
    Ok(())
}

// ── Version ─────────────────────────────────────────────────────

pub fn show_program_details() {
    println!("primegen {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!("This program comes with ABSOLUTELY NO WARRANTY.");
    println!("Distributed under the terms of the MIT licence.");
}
