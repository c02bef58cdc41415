//! Bounded FIFO between the scanner tasks and the executor.
//!
//! Many producers, one consumer. A full queue makes `push` wait, which is the
//! only backpressure the scanner sees.

use tokio::sync::mpsc;

use crate::candidate::RiskCandidate;

/// Default number of candidates held before producers wait.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Create a queue holding at most `capacity` candidates.
pub fn candidate_queue(capacity: usize) -> (CandidateSender, CandidateReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CandidateSender { tx }, CandidateReceiver { rx })
}

/// The consumer side is gone; the candidate is handed back.
#[derive(Debug)]
pub struct QueueClosed(pub RiskCandidate);

/// Producer handle, cloned into every scan task.
#[derive(Debug, Clone)]
pub struct CandidateSender {
    tx: mpsc::Sender<RiskCandidate>,
}

impl CandidateSender {
    /// Enqueue, waiting while the queue is full.
    pub async fn push(&self, candidate: RiskCandidate) -> Result<(), QueueClosed> {
        self.tx
            .send(candidate)
            .await
            .map_err(|mpsc::error::SendError(candidate)| QueueClosed(candidate))
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer handle, owned by the executor.
#[derive(Debug)]
pub struct CandidateReceiver {
    rx: mpsc::Receiver<RiskCandidate>,
}

impl CandidateReceiver {
    /// Dequeue the oldest candidate, waiting while empty.
    /// `None` once every sender is dropped and the queue is drained.
    pub async fn pop(&mut self) -> Option<RiskCandidate> {
        self.rx.recv().await
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
