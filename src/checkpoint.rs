//! # Checkpoint — Append-Only Prime Store
//!
//! Confirmed primes are persisted as plain text, one decimal integer per line.
//! The file is only ever appended to; its last non-empty line is the
//! checkpoint that the next run resumes from.
//!
//! ## Fallbacks
//!
//! A missing file, an empty (or all-whitespace) file, a last line equal to the
//! sentinel `0`, a last line that does not parse as an integer, or one that
//! parses but is even or below 3 all resolve to the configured starting prime.
//! Only genuine I/O failures are errors.
//!
//! ## Concurrency
//!
//! The flush manager is the only writer within a process. Readers such as the
//! `count` command may open the file at any time and see some prefix of lines.

use anyhow::{Context, Result};
use rug::Integer;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sentinel line meaning "no checkpoint yet".
const EMPTY_SENTINEL: &str = "0";

#[derive(Clone, Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CheckpointStore { path: path.into() }
    }

    /// Store at `<base>/<name>.txt`.
    pub fn in_dir(base: &Path, name: &str) -> Self {
        CheckpointStore::new(base.join(format!("{}.txt", name)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the checkpoint: the last non-empty line parsed as an integer,
    /// or `starting_prime` when there is nothing usable.
    pub fn read_last_prime(&self, starting_prime: &Integer) -> Result<Integer> {
        let last = match self.last_line()? {
            Some(line) => line,
            None => {
                debug!(path = %self.path.display(), "no checkpoint, using starting prime");
                return Ok(starting_prime.clone());
            }
        };
        if last == EMPTY_SENTINEL {
            return Ok(starting_prime.clone());
        }
        match last.parse::<Integer>() {
            Ok(n) if n.is_odd() && n >= 3 => Ok(n),
            Ok(n) => {
                warn!(
                    path = %self.path.display(),
                    checkpoint = %n,
                    "checkpoint is not an odd value of at least 3, using starting prime"
                );
                Ok(starting_prime.clone())
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    line = %last,
                    error = %e,
                    "unparsable checkpoint, using starting prime"
                );
                Ok(starting_prime.clone())
            }
        }
    }

    /// Append `batch` in the given order, one value per line, and sync to disk.
    pub fn append(&self, batch: &[Integer]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("creating store directory {}", parent.display())
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {} for append", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        for prime in batch {
            writeln!(writer, "{}", prime)
                .with_context(|| format!("writing to {}", self.path.display()))?;
        }
        let file = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("flushing {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("syncing {}", self.path.display()))?;
        Ok(())
    }

    /// Number of persisted primes (non-empty lines). A missing file counts as zero.
    pub fn count(&self) -> Result<u64> {
        let Some(reader) = self.open_reader()? else {
            return Ok(0);
        };
        let mut count = 0u64;
        for line in reader.lines() {
            let line = line.with_context(|| format!("reading {}", self.path.display()))?;
            let line = line.trim();
            if !line.is_empty() && line != EMPTY_SENTINEL {
                count += 1;
            }
        }
        Ok(count)
    }

    fn last_line(&self) -> Result<Option<String>> {
        let Some(reader) = self.open_reader()? else {
            return Ok(None);
        };
        let mut last = None;
        for line in reader.lines() {
            let line = line.with_context(|| format!("reading {}", self.path.display()))?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                last = Some(trimmed.to_string());
            }
        }
        Ok(last)
    }

    fn open_reader(&self) -> Result<Option<BufReader<File>>> {
        match File::open(&self.path) {
            Ok(f) => Ok(Some(BufReader::new(f))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("opening {} for read", self.path.display()))
            }
        }
    }
}
