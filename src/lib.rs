//! # primegen — Resumable Concurrent Prime Generation
//!
//! Walks the odd integers upward from a persisted checkpoint, tests each one
//! on a fixed-width worker pool, and appends confirmed primes to a plain-text
//! store in sorted batches.
//!
//! ## Pipeline
//!
//! ```text
//! CandidateSource ──> WorkerPool ──> route ──┬──> drain_primes ──> FlushManager ──> CheckpointStore
//!                                            └──> drain_rejects
//! ```
//!
//! Every arrow is a bounded `tokio::sync::mpsc` queue; a full queue suspends
//! the producer. See [`pipeline`] for the wiring and shutdown sequence.

pub mod candidates;
pub mod checkpoint;
pub mod config;
pub mod flush;
pub mod pipeline;
pub mod progress;
pub mod router;
pub mod worker;

use anyhow::{bail, Result};
use rug::integer::IsPrime;
use rug::Integer;

/// Primality predicate used by the worker pool.
///
/// Implementations must be deterministic and side-effect free. An `Err` marks
/// the candidate as malformed: the worker drops it and moves on.
pub trait PrimalityTest: Send + Sync {
    fn test(&self, n: &Integer) -> Result<bool>;
}

impl<F> PrimalityTest for F
where
    F: Fn(&Integer) -> Result<bool> + Send + Sync,
{
    fn test(&self, n: &Integer) -> Result<bool> {
        self(n)
    }
}

/// Trial division by small primes followed by a screened Miller-Rabin test.
#[derive(Clone, Copy, Debug)]
pub struct MillerRabin {
    pub rounds: u32,
}

impl Default for MillerRabin {
    fn default() -> Self {
        MillerRabin { rounds: 25 }
    }
}

impl PrimalityTest for MillerRabin {
    fn test(&self, n: &Integer) -> Result<bool> {
        if *n < 0 {
            bail!("negative candidate {}", n);
        }
        if *n < 2 {
            return Ok(false);
        }
        if has_small_factor(n) {
            return Ok(false);
        }
        Ok(mr_screened_test(n, self.rounds) != IsPrime::No)
    }
}

/// Small primes for trial division pre-filter.
const SMALL_PRIMES: [u32; 64] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307,
    311,
];

/// Quick check if n is divisible by any small prime.
/// Returns true if n is definitely composite (has a small factor).
pub fn has_small_factor(n: &Integer) -> bool {
    for &p in &SMALL_PRIMES {
        if n.is_divisible_u(p) {
            // n equal to the small prime itself is prime
            return n > &Integer::from(p);
        }
    }
    false
}

/// Two-round Miller-Rabin pre-screening: run 2 fast rounds first, full rounds only for survivors.
pub fn mr_screened_test(candidate: &Integer, mr_rounds: u32) -> IsPrime {
    if mr_rounds > 2 && candidate.is_probably_prime(2) == IsPrime::No {
        return IsPrime::No;
    }
    candidate.is_probably_prime(mr_rounds)
}

/// Exact decimal digit count.
pub fn exact_digits(n: &Integer) -> u64 {
    n.to_string_radix(10).trim_start_matches('-').len() as u64
}
