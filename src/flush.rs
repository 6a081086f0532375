//! # Flush — Prime Buffer and Batch Persistence
//!
//! Confirmed primes accumulate in an in-memory batch owned by
//! [`FlushManager`]. Once the batch reaches `max_buffer_size` it is sorted,
//! appended to the [`CheckpointStore`], and cleared. The pipeline already
//! delivers primes in ascending order; the sort keeps direct callers safe.
//!
//! A failed flush keeps the batch. The next attempt waits until the batch
//! reaches the following multiple of `max_buffer_size`.
//!
//! ## Locking
//!
//! The batch and the sequence counter sit behind a single mutex that is held
//! for the whole sort-and-write. The guard is scoped to the call, so it is
//! released on every exit path including I/O failure. Only one flush can run
//! at a time and the store never sees two writers.
//!
//! ## Sequence Counter
//!
//! Advanced by the size of each persisted batch. Workers read it (without
//! committing) to tag confirmed primes, so ids identify a batch range rather
//! than an individual prime.

use crate::checkpoint::CheckpointStore;
use anyhow::Result;
use rayon::slice::ParallelSliceMut;
use rug::Integer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Read-only view of the flush manager's sequence counter.
#[derive(Clone, Debug)]
pub struct SequenceHandle(Arc<AtomicU64>);

impl SequenceHandle {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

/// Summary of one completed flush.
#[derive(Clone, Debug, PartialEq)]
pub struct FlushReport {
    pub count: usize,
    pub first: Integer,
    pub last: Integer,
    pub sequence: u64,
    pub persisted: bool,
}

struct FlushState {
    batch: Vec<Integer>,
    /// Batch length that triggers the next flush.
    flush_at: usize,
    last_flushed: Option<Integer>,
    flushes: u64,
}

pub struct FlushManager {
    store: Option<CheckpointStore>,
    max_buffer_size: usize,
    state: Mutex<FlushState>,
    sequence: Arc<AtomicU64>,
}

impl FlushManager {
    /// `store = None` runs without persistence: batches are still sorted,
    /// counted and cleared, but nothing is written.
    pub fn new(
        store: Option<CheckpointStore>,
        max_buffer_size: usize,
        initial_sequence: u64,
    ) -> Self {
        assert!(max_buffer_size > 0, "max_buffer_size must be positive");
        FlushManager {
            store,
            max_buffer_size,
            state: Mutex::new(FlushState {
                batch: Vec::with_capacity(max_buffer_size),
                flush_at: max_buffer_size,
                last_flushed: None,
                flushes: 0,
            }),
            sequence: Arc::new(AtomicU64::new(initial_sequence)),
        }
    }

    pub fn sequence(&self) -> SequenceHandle {
        SequenceHandle(Arc::clone(&self.sequence))
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Number of primes waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.state.lock().unwrap().batch.len()
    }

    /// Largest value of the most recent flush.
    pub fn last_flushed(&self) -> Option<Integer> {
        self.state.lock().unwrap().last_flushed.clone()
    }

    pub fn flushes(&self) -> u64 {
        self.state.lock().unwrap().flushes
    }

    /// Add a confirmed prime, flushing when the batch reaches `max_buffer_size`.
    ///
    /// On a store failure the batch is kept and the error returned. The flush
    /// is re-attempted once another `max_buffer_size` primes have arrived.
    pub fn append(&self, prime: Integer) -> Result<Option<FlushReport>> {
        let mut state = self.state.lock().unwrap();
        state.batch.push(prime);
        if state.batch.len() < state.flush_at {
            return Ok(None);
        }
        self.flush_locked(&mut state).map(Some)
    }

    /// Persist whatever is buffered regardless of size. Used on shutdown.
    pub fn flush_remaining(&self) -> Result<Option<FlushReport>> {
        let mut state = self.state.lock().unwrap();
        if state.batch.is_empty() {
            return Ok(None);
        }
        self.flush_locked(&mut state).map(Some)
    }

    fn flush_locked(&self, state: &mut FlushState) -> Result<FlushReport> {
        let count = state.batch.len();
        info!(count, "writing buffer");
        state.batch.par_sort_unstable();

        if let Some(store) = &self.store {
            if let Err(e) = store.append(&state.batch) {
                state.flush_at = (count / self.max_buffer_size + 1) * self.max_buffer_size;
                let reason = format!("{:#}", e);
                error!(
                    count,
                    retry_at = state.flush_at,
                    error = %reason,
                    "flush failed, batch kept"
                );
                return Err(e);
            }
        }

        let sequence = self.sequence.fetch_add(count as u64, Ordering::AcqRel) + count as u64;
        let batch = std::mem::take(&mut state.batch);
        state.batch.reserve(self.max_buffer_size);
        state.flush_at = self.max_buffer_size;
        let first = batch[0].clone();
        let last = batch[count - 1].clone();
        state.last_flushed = Some(last.clone());
        state.flushes += 1;
        info!(count, first = %first, last = %last, sequence, "finished writing buffer");

        Ok(FlushReport {
            count,
            first,
            last,
            sequence,
            persisted: self.store.is_some(),
        })
    }
}
