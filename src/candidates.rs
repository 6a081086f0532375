//! # Candidates — Odd-Step Candidate Source
//!
//! Lazily yields `from, from + 2, from + 4, …`. The first candidate is the
//! checkpoint itself. Bounded sources stop at the first term that is not
//! less than `to`; unbounded sources never end on their own.
//!
//! Generation is single-threaded. [`produce`] feeds a bounded queue and is the
//! only place candidates enter the pipeline, so fan-out downstream cannot skip
//! or duplicate a value. Each candidate is tagged with its generation index,
//! which the router uses to put results back into numeric order.

use rug::Integer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct CandidateSource {
    next: Integer,
    bound: Option<Integer>,
}

impl CandidateSource {
    pub fn unbounded(from: Integer) -> Self {
        CandidateSource {
            next: from,
            bound: None,
        }
    }

    /// Candidates in `[from, to)`.
    pub fn bounded(from: Integer, to: Integer) -> Self {
        CandidateSource {
            next: from,
            bound: Some(to),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.bound.is_some()
    }

    /// The value the next call to `next()` would yield.
    pub fn peek(&self) -> &Integer {
        &self.next
    }
}

impl Iterator for CandidateSource {
    type Item = Integer;

    fn next(&mut self) -> Option<Integer> {
        if let Some(bound) = &self.bound {
            if self.next >= *bound {
                return None;
            }
        }
        let current = self.next.clone();
        self.next += 2u32;
        Some(current)
    }
}

/// Push `(index, candidate)` pairs into `tx` until the source runs dry,
/// `cancel` fires, or the receiving side goes away. Indices start at 0 and
/// have no gaps. Returns the number of candidates handed off.
pub async fn produce(
    source: CandidateSource,
    tx: mpsc::Sender<(u64, Integer)>,
    cancel: CancellationToken,
) -> u64 {
    let mut sent = 0u64;
    for candidate in source {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(sent, "candidate generation cancelled");
                break;
            }
            res = tx.send((sent, candidate)) => {
                if res.is_err() {
                    debug!("candidate queue closed");
                    break;
                }
                sent += 1;
            }
        }
    }
    debug!(sent, "candidate generation finished");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[u32]) -> Vec<Integer> {
        values.iter().map(|&v| Integer::from(v)).collect()
    }

    #[test]
    fn bounded_yields_odd_steps_below_bound() {
        let got: Vec<Integer> =
            CandidateSource::bounded(Integer::from(11), Integer::from(30)).collect();
        assert_eq!(got, ints(&[11, 13, 15, 17, 19, 21, 23, 25, 27, 29]));
    }

    #[test]
    fn bounded_excludes_bound_itself() {
        let got: Vec<Integer> =
            CandidateSource::bounded(Integer::from(3), Integer::from(9)).collect();
        assert_eq!(got, ints(&[3, 5, 7]));
    }

    #[test]
    fn bounded_with_bound_at_or_below_start_is_empty() {
        assert_eq!(
            CandidateSource::bounded(Integer::from(11), Integer::from(11)).count(),
            0
        );
        assert_eq!(
            CandidateSource::bounded(Integer::from(11), Integer::from(5)).count(),
            0
        );
    }

    #[test]
    fn unbounded_keeps_going() {
        let source = CandidateSource::unbounded(Integer::from(101));
        assert!(!source.is_bounded());
        let got: Vec<Integer> = source.skip(1000).take(2).collect();
        assert_eq!(got, ints(&[2101, 2103]));
    }

    #[test]
    fn peek_tracks_next_value() {
        let mut source = CandidateSource::unbounded(Integer::from(7));
        assert_eq!(*source.peek(), 7);
        source.next();
        assert_eq!(*source.peek(), 9);
    }

    #[tokio::test]
    async fn produce_sends_every_bounded_candidate() {
        let (tx, mut rx) = mpsc::channel(4);
        let source = CandidateSource::bounded(Integer::from(3), Integer::from(21));
        let handle = tokio::spawn(produce(source, tx, CancellationToken::new()));

        let mut indices = Vec::new();
        let mut got = Vec::new();
        while let Some((i, c)) = rx.recv().await {
            indices.push(i);
            got.push(c);
        }
        assert_eq!(handle.await.unwrap(), 9);
        assert_eq!(indices, (0..9).collect::<Vec<u64>>());
        assert_eq!(got, ints(&[3, 5, 7, 9, 11, 13, 15, 17, 19]));
    }

    #[tokio::test]
    async fn produce_stops_on_cancel() {
        let (tx, mut rx) = mpsc::channel(2);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(produce(
            CandidateSource::unbounded(Integer::from(3)),
            tx,
            cancel.clone(),
        ));

        assert_eq!(rx.recv().await.unwrap(), (0, Integer::from(3)));
        cancel.cancel();
        let sent = handle.await.unwrap();
        // queue capacity bounds how far the generator got ahead
        assert!(sent <= 4, "generator ran ahead: {}", sent);
    }

    #[tokio::test]
    async fn produce_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sent = produce(
            CandidateSource::unbounded(Integer::from(3)),
            tx,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(sent, 0);
    }
}
