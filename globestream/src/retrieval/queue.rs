//! Priority ordering for queued retrievals.
//!
//! Wraps a submission with ordering support for the scheduler's
//! `BinaryHeap`: higher priority first, FIFO (by submission sequence)
//! within the same priority. A plain FIFO queue here would let prefetch
//! traffic starve on-demand requests submitted moments later.

use super::service::SubmittedRetrieval;

/// A submission waiting for a free worker.
pub(crate) struct QueuedRetrieval {
    /// The submission awaiting dispatch.
    pub submitted: SubmittedRetrieval,
    /// Sequence number for FIFO ordering within the same priority level.
    pub sequence: u64,
}

impl PartialEq for QueuedRetrieval {
    fn eq(&self, other: &Self) -> bool {
        self.submitted.priority == other.submitted.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedRetrieval {}

impl PartialOrd for QueuedRetrieval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRetrieval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher priority first, then lower sequence (older) first
        match self.submitted.priority.cmp(&other.submitted.priority) {
            std::cmp::Ordering::Equal => other.sequence.cmp(&self.sequence),
            other_ordering => other_ordering,
        }
    }
}

impl std::fmt::Debug for QueuedRetrieval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedRetrieval")
            .field("key", &self.submitted.key)
            .field("priority", &self.submitted.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}
