//! # Progress — Atomic Run Counters
//!
//! Counters shared between pipeline stages and a background status reporter.
//! Stages bump the atomics lock-free; the latest prime string is behind a
//! `Mutex` and is only written by the prime drain.
//!
//! ## Background Reporter
//!
//! A dedicated thread logs tested/found/rate and the latest prime every
//! `interval`. It polls the shutdown flag in short steps so `stop()` followed
//! by `join()` returns promptly.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const POLL_STEP: Duration = Duration::from_millis(200);

pub struct Progress {
    pub tested: AtomicU64,
    pub found: AtomicU64,
    pub rejected: AtomicU64,
    pub current: Mutex<String>,
    start: Instant,
    shutdown: AtomicBool,
}

impl Progress {
    pub fn new() -> Arc<Self> {
        Arc::new(Progress {
            tested: AtomicU64::new(0),
            found: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            current: Mutex::new(String::new()),
            start: Instant::now(),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn start_reporter(self: &Arc<Self>, interval: Duration) -> thread::JoinHandle<()> {
        let progress = Arc::clone(self);
        thread::spawn(move || {
            let mut waited = Duration::ZERO;
            loop {
                thread::sleep(POLL_STEP);
                if progress.shutdown.load(Ordering::Relaxed) {
                    break;
                }
                waited += POLL_STEP;
                if waited >= interval {
                    progress.print_status();
                    waited = Duration::ZERO;
                }
            }
        })
    }

    pub fn print_status(&self) {
        let elapsed = self.start.elapsed();
        let tested = self.tested.load(Ordering::Relaxed);
        let found = self.found.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let current = self.current.lock().unwrap().clone();
        let rate = if elapsed.as_secs() > 0 {
            tested as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let h = elapsed.as_secs() / 3600;
        let m = (elapsed.as_secs() % 3600) / 60;
        let s = elapsed.as_secs() % 60;
        info!(
            last_prime = %current,
            tested,
            rate = format_args!("{:.2}", rate),
            found,
            rejected,
            elapsed = format_args!("{:02}:{:02}:{:02}", h, m, s),
            "search progress"
        );
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero() {
        let p = Progress::new();
        assert_eq!(p.tested.load(Ordering::Relaxed), 0);
        assert_eq!(p.found.load(Ordering::Relaxed), 0);
        assert_eq!(p.rejected.load(Ordering::Relaxed), 0);
        assert_eq!(*p.current.lock().unwrap(), "");
    }

    /// 8 threads x 1000 increments must land exactly; workers share these.
    #[test]
    fn concurrent_increments_are_accurate() {
        let p = Progress::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let p = Arc::clone(&p);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        p.tested.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(p.tested.load(Ordering::Relaxed), 8000);
    }

    #[test]
    fn print_status_with_zero_elapsed() {
        let p = Progress::new();
        p.print_status();
    }

    #[test]
    fn reporter_exits_promptly_after_stop() {
        let p = Progress::new();
        let handle = p.start_reporter(Duration::from_secs(3600));
        let started = Instant::now();
        p.stop();
        handle.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn multiple_stops_are_idempotent() {
        let p = Progress::new();
        p.stop();
        p.stop();
        assert!(p.shutdown.load(Ordering::Relaxed));
    }
}
