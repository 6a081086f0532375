//! # Router — Prime / Reject Split and Drains
//!
//! [`route`] forwards each [`TestResult`] to exactly one of two queues.
//!
//! ## Ordering
//!
//! Workers finish out of numeric order. The router holds completed slots in a
//! reorder buffer keyed by generation index and releases them only once every
//! lower index has arrived, rejects and dropped candidates included. Both
//! drains therefore see ascending values, so every persisted batch sorts
//! above the previous one and the checkpoint never falls behind a stored
//! prime. The buffer holds at most the slots that overtook the slowest
//! in-flight candidate.
//!
//! [`drain_primes`] displays every prime and hands it to the
//! [`FlushManager`]; [`drain_rejects`] only logs when `show_fails` is set.

use crate::exact_digits;
use crate::flush::FlushManager;
use crate::progress::Progress;
use crate::worker::{Completed, TestResult};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts of results forwarded to each sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteStats {
    pub primes: u64,
    pub rejects: u64,
    pub dropped: u64,
}

/// Release completed slots in generation order, starting at index 0.
pub async fn route(
    mut results: mpsc::Receiver<Completed>,
    primes: mpsc::Sender<TestResult>,
    rejects: mpsc::Sender<TestResult>,
) -> RouteStats {
    let mut stats = RouteStats::default();
    let mut pending: BTreeMap<u64, Option<TestResult>> = BTreeMap::new();
    let mut next = 0u64;

    'recv: while let Some(slot) = results.recv().await {
        pending.insert(slot.index, slot.result);
        while let Some(released) = pending.remove(&next) {
            next += 1;
            let Some(result) = released else {
                stats.dropped += 1;
                continue;
            };
            let is_prime = result.is_prime;
            let sink = if is_prime { &primes } else { &rejects };
            if sink.send(result).await.is_err() {
                debug!(is_prime, "sink closed, router stopping");
                break 'recv;
            }
            if is_prime {
                stats.primes += 1;
            } else {
                stats.rejects += 1;
            }
        }
    }

    if !pending.is_empty() {
        warn!(next, held = pending.len(), "results discarded before release");
    }
    stats
}

/// Display and buffer every confirmed prime. A flush failure cancels the run
/// and is returned; dropping the receiver then unwinds the upstream stages.
pub async fn drain_primes(
    mut primes: mpsc::Receiver<TestResult>,
    manager: Arc<FlushManager>,
    progress: Arc<Progress>,
    cancel: CancellationToken,
) -> Result<u64> {
    let mut drained = 0u64;
    while let Some(result) = primes.recv().await {
        let value = result.value;
        info!(
            prime = %value,
            digits = exact_digits(&value),
            elapsed = ?result.elapsed,
            sequence_id = ?result.sequence_id,
            "prime found"
        );
        progress.found.fetch_add(1, Ordering::Relaxed);
        *progress.current.lock().unwrap() = value.to_string();

        let mgr = Arc::clone(&manager);
        let appended = tokio::task::spawn_blocking(move || mgr.append(value))
            .await
            .context("flush task panicked")
            .and_then(|r| r);
        if let Err(e) = appended {
            cancel.cancel();
            return Err(e);
        }
        drained += 1;
    }
    Ok(drained)
}

pub async fn drain_rejects(
    mut rejects: mpsc::Receiver<TestResult>,
    show_fails: bool,
    progress: Arc<Progress>,
) -> u64 {
    let mut drained = 0u64;
    while let Some(result) = rejects.recv().await {
        if show_fails {
            info!(candidate = %result.value, elapsed = ?result.elapsed, "composite");
        }
        progress.rejected.fetch_add(1, Ordering::Relaxed);
        drained += 1;
    }
    drained
}
