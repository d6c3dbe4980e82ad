// horizon_core/src/smoother/queue.rs

use crossbeam_channel::{Receiver, Sender};

use crate::error::SubmitError;
use crate::transaction::Transaction;

/// A transaction as it waits in the ingestion queue.
#[derive(Debug, Clone)]
pub struct Submission {
    pub source: String,
    pub transaction: Transaction,
}

/// A queued submission tagged with its arrival order.
#[derive(Debug, Clone)]
pub(crate) struct Arrival {
    pub sequence: u64,
    pub source: String,
    pub transaction: Transaction,
}

/// The producer side of a smoother's ingestion queue. Cheap to clone; one per producer.
#[derive(Debug, Clone)]
pub struct TransactionSender {
    sender: Sender<Submission>,
}

impl TransactionSender {
    pub(crate) fn new(sender: Sender<Submission>) -> Self {
        Self { sender }
    }

    /// Queues a transaction for the next cycle. Never blocks.
    pub fn submit(&self, source: &str, transaction: Transaction) -> Result<(), SubmitError> {
        self.sender
            .send(Submission {
                source: source.to_string(),
                transaction,
            })
            .map_err(|_| SubmitError::Closed)
    }
}

/// Drains everything currently queued, numbering arrivals from `next_sequence`.
pub(crate) fn drain(receiver: &Receiver<Submission>, pending: &mut Vec<Arrival>, next_sequence: &mut u64) {
    for submission in receiver.try_iter() {
        push(pending, submission, next_sequence);
    }
}

pub(crate) fn push(pending: &mut Vec<Arrival>, submission: Submission, next_sequence: &mut u64) {
    pending.push(Arrival {
        sequence: *next_sequence,
        source: submission.source,
        transaction: submission.transaction,
    });
    *next_sequence += 1;
}
