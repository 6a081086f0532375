//! # Config — TOML Run Configuration
//!
//! Saved to `~/.primegen/config.toml` by default (`$PRIMEGEN_CONFIG` or the
//! `--config` flag override the location). Every field has a default, so a
//! missing file or a partial file is valid. CLI flags are layered on top by
//! the caller before [`PrimegenConfig::validate`] runs.

use crate::checkpoint::CheckpointStore;
use anyhow::{bail, Context, Result};
use rug::Integer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "PRIMEGEN_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimegenConfig {
    /// Batch size that triggers a flush.
    pub max_buffer_size: usize,
    /// Log rejected candidates.
    pub show_fails: bool,
    /// Decimal fallback used when the store holds no checkpoint.
    pub starting_prime: String,
    /// Directory holding the prime store.
    pub base_path: PathBuf,
    /// Store file name without the `.txt` extension.
    pub file_name: String,
    /// Worker pool width (0 = available parallelism).
    pub workers: usize,
    /// Capacity of each inter-stage queue.
    pub channel_capacity: usize,
    pub mr_rounds: u32,
    pub report_interval_secs: u64,
}

impl Default for PrimegenConfig {
    fn default() -> Self {
        PrimegenConfig {
            max_buffer_size: 100,
            show_fails: false,
            starting_prime: "3".to_string(),
            base_path: PathBuf::from("."),
            file_name: "primes".to_string(),
            workers: 0,
            channel_capacity: 100,
            mr_rounds: 25,
            report_interval_secs: 30,
        }
    }
}

impl PrimegenConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading config {}", path.display()))
            }
        };
        let config: PrimegenConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_size == 0 {
            bail!("max_buffer_size must be at least 1");
        }
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be at least 1");
        }
        if self.file_name.trim().is_empty() {
            bail!("file_name must not be empty");
        }
        self.starting_prime()?;
        Ok(())
    }

    /// Parsed starting prime; must be an odd integer >= 3.
    pub fn starting_prime(&self) -> Result<Integer> {
        let n: Integer = self
            .starting_prime
            .trim()
            .parse()
            .with_context(|| {
                format!("starting_prime {:?} is not an integer", self.starting_prime)
            })?;
        if n < 3 || n.is_even() {
            bail!("starting_prime must be an odd integer >= 3, got {}", n);
        }
        Ok(n)
    }

    pub fn store(&self) -> CheckpointStore {
        CheckpointStore::in_dir(&self.base_path, &self.file_name)
    }

    /// Effective pool width.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

/// Resolve the config file location: explicit flag, then `$PRIMEGEN_CONFIG`,
/// then `~/.primegen/config.toml`.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.is_empty() {
            return Ok(PathBuf::from(p));
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".primegen").join("config.toml"))
}
