//! # Pipeline — Stage Wiring and Shutdown
//!
//! Connects the candidate source, worker pool, router and drains with bounded
//! queues and runs them to completion.
//!
//! ## Shutdown
//!
//! A run ends when the source is exhausted (bounded mode) or the
//! [`CancellationToken`] fires. Either way the queues close front to back:
//! the generator stops, workers finish their in-flight test, the router
//! releases every slot up to the last dequeued candidate, the drains empty
//! their queues, and the partially filled batch is persisted by
//! [`FlushManager::flush_remaining`]. If a flush fails the token is cancelled,
//! the stages unwind, and the error is returned without a final flush.

use crate::candidates::{self, CandidateSource};
use crate::flush::FlushManager;
use crate::progress::Progress;
use crate::router;
use crate::worker::WorkerPool;
use crate::PrimalityTest;
use anyhow::{Context, Result};
use rug::Integer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub workers: usize,
    pub channel_capacity: usize,
    pub show_fails: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            workers: 4,
            channel_capacity: 100,
            show_fails: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub generated: u64,
    pub tested: u64,
    pub primes: u64,
    pub rejects: u64,
    pub flushes: u64,
    pub sequence: u64,
    pub last_flushed: Option<Integer>,
}

pub struct Pipeline {
    config: PipelineConfig,
    predicate: Arc<dyn PrimalityTest>,
    manager: Arc<FlushManager>,
    progress: Arc<Progress>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        predicate: Arc<dyn PrimalityTest>,
        manager: Arc<FlushManager>,
        progress: Arc<Progress>,
    ) -> Self {
        Pipeline {
            config,
            predicate,
            manager,
            progress,
        }
    }

    pub async fn run(
        &self,
        source: CandidateSource,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let capacity = self.config.channel_capacity.max(1);
        let (cand_tx, cand_rx) = mpsc::channel(capacity);
        let (res_tx, res_rx) = mpsc::channel(capacity);
        let (prime_tx, prime_rx) = mpsc::channel(capacity);
        let (reject_tx, reject_rx) = mpsc::channel(capacity);

        info!(
            from = %source.peek(),
            bounded = source.is_bounded(),
            workers = self.config.workers,
            capacity,
            max_buffer_size = self.manager.max_buffer_size(),
            "pipeline starting"
        );

        let generator = tokio::spawn(candidates::produce(source, cand_tx, cancel.clone()));
        let pool = WorkerPool::spawn(
            self.config.workers,
            Arc::clone(&self.predicate),
            cand_rx,
            res_tx,
            self.manager.sequence(),
            Arc::clone(&self.progress),
            cancel.clone(),
        );
        let routing = tokio::spawn(router::route(res_rx, prime_tx, reject_tx));
        let prime_drain = tokio::spawn(router::drain_primes(
            prime_rx,
            Arc::clone(&self.manager),
            Arc::clone(&self.progress),
            cancel.clone(),
        ));
        let reject_drain = tokio::spawn(router::drain_rejects(
            reject_rx,
            self.config.show_fails,
            Arc::clone(&self.progress),
        ));

        let generated = generator.await.context("candidate generator panicked")?;
        let tested = pool.join().await?;
        let routed = routing.await.context("result router panicked")?;
        let drained = prime_drain.await.context("prime drain panicked")?;
        let rejects = reject_drain.await.context("reject drain panicked")?;
        let primes = drained?;

        let mgr = Arc::clone(&self.manager);
        if let Some(report) = tokio::task::spawn_blocking(move || mgr.flush_remaining())
            .await
            .context("final flush panicked")??
        {
            info!(count = report.count, last = %report.last, "flushed partial batch on shutdown");
        }

        let summary = RunSummary {
            generated,
            tested,
            primes,
            rejects,
            flushes: self.manager.flushes(),
            sequence: self.manager.sequence().current(),
            last_flushed: self.manager.last_flushed(),
        };
        info!(
            generated,
            tested,
            primes,
            rejects,
            routed_primes = routed.primes,
            dropped = routed.dropped,
            flushes = summary.flushes,
            "pipeline finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointStore;
    use crate::MillerRabin;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bounded_run_persists_every_prime() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::in_dir(dir.path(), "primes");
        let manager = Arc::new(FlushManager::new(Some(store.clone()), 5, 0));
        let pipeline = Pipeline::new(
            PipelineConfig {
                workers: 4,
                ..PipelineConfig::default()
            },
            Arc::new(MillerRabin::default()),
            manager,
            Progress::new(),
        );

        let summary = pipeline
            .run(
                CandidateSource::bounded(Integer::from(11), Integer::from(30)),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.generated, 10);
        assert_eq!(summary.tested, 10);
        assert_eq!(summary.primes, 6);
        assert_eq!(summary.rejects, 4);
        assert_eq!(summary.flushes, 2);
        assert_eq!(summary.sequence, 6);
        assert_eq!(summary.last_flushed, Some(Integer::from(29)));
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "11\n13\n17\n19\n23\n29\n"
        );
    }

    #[tokio::test]
    async fn pre_cancelled_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::in_dir(dir.path(), "primes");
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            Arc::new(MillerRabin::default()),
            Arc::new(FlushManager::new(Some(store.clone()), 5, 0)),
            Progress::new(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = pipeline
            .run(CandidateSource::unbounded(Integer::from(3)), cancel)
            .await
            .unwrap();
        assert_eq!(summary.generated, 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn flush_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            Arc::new(MillerRabin::default()),
            Arc::new(FlushManager::new(
                Some(CheckpointStore::new(dir.path())),
                2,
                0,
            )),
            Progress::new(),
        );
        let result = pipeline
            .run(
                CandidateSource::unbounded(Integer::from(3)),
                CancellationToken::new(),
            )
            .await;
        assert!(result.is_err());
    }
}
