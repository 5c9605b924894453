//! Shared future for a submitted retrieval.
//!
//! [`RetrievalFuture`] is returned by
//! [`run_retriever`](super::RetrievalService::run_retriever). It is
//! cloneable; all clones observe the same retrieval, including clones handed
//! out when a duplicate submission is coalesced onto an in-flight fetch.
//! Cancelling any clone cancels the underlying retrieval for every holder.

use super::types::{RetrievalError, RetrievalKey};
use bytes::Bytes;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a retrieval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetrievalState {
    /// Queued, waiting for a worker.
    #[default]
    Pending,

    /// A worker is executing the fetch.
    Running,

    /// Fetch and post-processing completed.
    Succeeded,

    /// Fetch or post-processing failed.
    Failed,

    /// Cancelled before completion.
    Cancelled,
}

impl RetrievalState {
    /// True once the retrieval has finished, one way or another.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// True while the retrieval is queued or running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for RetrievalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Final result of a retrieval, exactly one per submission.
#[derive(Clone, Debug, PartialEq)]
pub enum RetrievalOutcome {
    /// Completed; the payload is `None` when the post-processor consumed
    /// the bytes (e.g. wrote them through to a store).
    Complete(Option<Bytes>),

    /// Failed in the fetch or the post-processor.
    Failed(RetrievalError),

    /// Cancelled before completion; the post-processor did not run.
    Cancelled,
}

impl RetrievalOutcome {
    /// The payload, when the retrieval completed with one.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Complete(Some(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// True for a completed retrieval, with or without payload.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// The state this outcome settles the future into.
    pub(crate) fn state(&self) -> RetrievalState {
        match self {
            Self::Complete(_) => RetrievalState::Succeeded,
            Self::Failed(_) => RetrievalState::Failed,
            Self::Cancelled => RetrievalState::Cancelled,
        }
    }
}

/// Shared slot the scheduler settles the outcome into.
pub(crate) type OutcomeSlot = Arc<Mutex<Option<RetrievalOutcome>>>;

/// Handle to a submitted retrieval.
///
/// Unlike a one-shot result channel, the outcome stays readable after
/// [`wait`](Self::wait) returns and from every clone, because coalesced
/// duplicate submissions all hold clones of the same future.
#[derive(Clone)]
pub struct RetrievalFuture {
    key: RetrievalKey,
    state_rx: watch::Receiver<RetrievalState>,
    outcome: OutcomeSlot,
    cancel: CancellationToken,
}

impl RetrievalFuture {
    pub(crate) fn new(
        key: RetrievalKey,
        state_rx: watch::Receiver<RetrievalState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            key,
            state_rx,
            outcome: Arc::new(Mutex::new(None)),
            cancel,
        }
    }

    /// Slot for the scheduler to settle; written before the terminal state
    /// is broadcast.
    pub(crate) fn outcome_slot(&self) -> OutcomeSlot {
        Arc::clone(&self.outcome)
    }

    /// Identity of the underlying retrieval.
    pub fn key(&self) -> &RetrievalKey {
        &self.key
    }

    /// Current state, without waiting.
    pub fn state(&self) -> RetrievalState {
        *self.state_rx.borrow()
    }

    /// Request cancellation.
    ///
    /// Non-blocking and best-effort: a queued retrieval will be skipped, a
    /// running one is interrupted at its next await point. A retrieval that
    /// completes before the request lands keeps its completed outcome.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The settled outcome, if the retrieval has finished.
    pub fn outcome(&self) -> Option<RetrievalOutcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait for the retrieval to finish and return its outcome.
    pub async fn wait(&mut self) -> RetrievalOutcome {
        loop {
            if self.state().is_terminal() {
                break;
            }
            if self.state_rx.changed().await.is_err() {
                // Scheduler gone without settling this future; only
                // possible on immediate shutdown.
                break;
            }
        }
        self.outcome().unwrap_or(RetrievalOutcome::Cancelled)
    }
}

impl std::fmt::Debug for RetrievalFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalFuture")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}
