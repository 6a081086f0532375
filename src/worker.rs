//! # Worker — Fixed-Width Primality Worker Pool
//!
//! `width` tokio tasks share one bounded candidate queue. Each task pulls a
//! candidate, runs the [`PrimalityTest`] on the blocking pool, times it, and
//! forwards a [`Completed`] slot carrying the candidate's generation index.
//! Concurrency is capped by the pool width and memory by the queue capacities.
//!
//! A predicate error drops that candidate with a warning. The slot is still
//! forwarded with no result so the router's reorder buffer can move past it.
//! Workers stop when
//! the candidate queue is exhausted, the result queue closes, or the
//! cancellation token fires; an in-flight test always completes and is
//! forwarded.

use crate::flush::SequenceHandle;
use crate::progress::Progress;
use crate::PrimalityTest;
use anyhow::{Context, Result};
use rug::Integer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of testing one candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct TestResult {
    pub value: Integer,
    pub is_prime: bool,
    pub elapsed: Duration,
    /// Batch-range id read at verdict time. `None` for composites.
    pub sequence_id: Option<u64>,
}

/// One finished generation slot. `result` is `None` when the candidate was
/// dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct Completed {
    pub index: u64,
    pub result: Option<TestResult>,
}

/// Test a single candidate and time it.
pub fn classify(
    predicate: &dyn PrimalityTest,
    candidate: Integer,
    sequence: &SequenceHandle,
) -> Result<TestResult> {
    let start = Instant::now();
    let is_prime = predicate
        .test(&candidate)
        .with_context(|| format!("testing candidate {}", candidate))?;
    let elapsed = start.elapsed();
    Ok(TestResult {
        sequence_id: is_prime.then(|| sequence.current()),
        value: candidate,
        is_prime,
        elapsed,
    })
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<u64>>,
}

impl WorkerPool {
    pub fn spawn(
        width: usize,
        predicate: Arc<dyn PrimalityTest>,
        candidates: mpsc::Receiver<(u64, Integer)>,
        results: mpsc::Sender<Completed>,
        sequence: SequenceHandle,
        progress: Arc<Progress>,
        cancel: CancellationToken,
    ) -> Self {
        let width = width.max(1);
        let candidates = Arc::new(Mutex::new(candidates));
        let handles = (0..width)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&predicate),
                    Arc::clone(&candidates),
                    results.clone(),
                    sequence.clone(),
                    Arc::clone(&progress),
                    cancel.clone(),
                ))
            })
            .collect();
        WorkerPool { handles }
    }

    pub fn width(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker. Returns the total number of candidates tested.
    pub async fn join(self) -> Result<u64> {
        let mut tested = 0;
        for handle in self.handles {
            tested += handle.await.context("worker task panicked")?;
        }
        Ok(tested)
    }
}

async fn worker_loop(
    worker_id: usize,
    predicate: Arc<dyn PrimalityTest>,
    candidates: Arc<Mutex<mpsc::Receiver<(u64, Integer)>>>,
    results: mpsc::Sender<Completed>,
    sequence: SequenceHandle,
    progress: Arc<Progress>,
    cancel: CancellationToken,
) -> u64 {
    debug!(worker_id, "worker started");
    let mut tested = 0u64;

    loop {
        let next = {
            let mut rx = candidates.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                c = rx.recv() => c,
            }
        };
        let Some((index, candidate)) = next else {
            break;
        };

        let predicate = Arc::clone(&predicate);
        let seq = sequence.clone();
        let outcome =
            tokio::task::spawn_blocking(move || classify(predicate.as_ref(), candidate, &seq))
                .await;

        let result = match outcome {
            Ok(Ok(result)) => {
                tested += 1;
                progress.tested.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            Ok(Err(e)) => {
                let reason = format!("{:#}", e);
                warn!(worker_id, index, error = %reason, "candidate dropped");
                None
            }
            Err(e) => {
                warn!(worker_id, index, error = %e, "primality task failed, candidate dropped");
                None
            }
        };
        if results.send(Completed { index, result }).await.is_err() {
            debug!(worker_id, "result queue closed");
            break;
        }
    }

    debug!(worker_id, tested, "worker stopped");
    tested
}
