//! Scheduler loop: dispatch, completion handling, shutdown.
//!
//! A single task owns the priority queue and the set of running retrievals.
//! Workers are spawned tasks; each executes one fetch (plus post-processing)
//! and reports back through the completion channel. Because the loop is the
//! only writer of queue and active state, dispatch decisions need no locks.

use super::future::{OutcomeSlot, RetrievalOutcome, RetrievalState};
use super::queue::QueuedRetrieval;
use super::retriever::{RetrievalContext, Retriever};
use super::service::{ServiceState, SubmittedRetrieval};
use super::types::{RetrievalError, RetrievalKey};
use futures::FutureExt;
use std::collections::{BinaryHeap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// A worker reporting its retrieval's outcome back to the loop.
struct RetrievalCompletion {
    key: RetrievalKey,
    outcome: RetrievalOutcome,
}

/// Channels back to a running retrieval's future.
struct ActiveRetrieval {
    state_tx: watch::Sender<RetrievalState>,
    outcome_slot: OutcomeSlot,
    cancel: CancellationToken,
}

pub(crate) struct Scheduler {
    state: Arc<ServiceState>,
    submission_rx: mpsc::UnboundedReceiver<SubmittedRetrieval>,
    completion_tx: mpsc::UnboundedSender<RetrievalCompletion>,
    completion_rx: mpsc::UnboundedReceiver<RetrievalCompletion>,
    drain: CancellationToken,
    shutdown_now: CancellationToken,
    queue: BinaryHeap<QueuedRetrieval>,
    active: HashMap<RetrievalKey, ActiveRetrieval>,
    /// Monotonic sequence for FIFO ordering within a priority level.
    sequence: u64,
    draining: bool,
}

impl Scheduler {
    pub fn new(
        state: Arc<ServiceState>,
        submission_rx: mpsc::UnboundedReceiver<SubmittedRetrieval>,
        drain: CancellationToken,
        shutdown_now: CancellationToken,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            state,
            submission_rx,
            completion_tx,
            completion_rx,
            drain,
            shutdown_now,
            queue: BinaryHeap::new(),
            active: HashMap::new(),
            sequence: 0,
            draining: false,
        }
    }

    /// Runs until shut down (and, when draining, until running work ends).
    pub async fn run(mut self) {
        info!(
            pool_size = self.state.pool_size.load(Ordering::Relaxed),
            "Retrieval service started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_now.cancelled() => {
                    self.shutdown_immediate();
                    break;
                }

                _ = self.drain.cancelled(), if !self.draining => {
                    self.begin_drain();
                }

                Some(submitted) = self.submission_rx.recv() => {
                    self.handle_submission(submitted);
                }

                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }

                _ = self.state.work_notify.notified() => {}
            }

            self.dispatch();

            if self.draining && self.active.is_empty() {
                break;
            }
        }

        info!("Retrieval service stopped");
    }

    fn handle_submission(&mut self, submitted: SubmittedRetrieval) {
        trace!(key = %submitted.key, priority = %submitted.priority, "Retrieval queued");
        let sequence = self.sequence;
        self.sequence += 1;
        self.queue.push(QueuedRetrieval {
            submitted,
            sequence,
        });
    }

    /// Pops queued retrievals onto free workers, highest priority first.
    fn dispatch(&mut self) {
        while self.state.running.load(Ordering::Relaxed)
            < self.state.pool_size.load(Ordering::Relaxed)
        {
            let Some(queued) = self.queue.pop() else {
                return;
            };
            let submitted = queued.submitted;
            self.state.queued.fetch_sub(1, Ordering::Relaxed);

            if submitted.cancel.is_cancelled() {
                // Cancelled while queued: never runs, no post-processing.
                debug!(key = %submitted.key, "Skipping cancelled queued retrieval");
                self.finalize(
                    &submitted.key,
                    &submitted.state_tx,
                    &submitted.outcome_slot,
                    RetrievalOutcome::Cancelled,
                );
                continue;
            }

            self.spawn_retrieval(submitted);
        }
    }

    fn spawn_retrieval(&mut self, submitted: SubmittedRetrieval) {
        let SubmittedRetrieval {
            retriever,
            key,
            priority,
            state_tx,
            outcome_slot,
            cancel,
        } = submitted;

        debug!(key = %key, priority = %priority, "Retrieval started");
        let _ = state_tx.send(RetrievalState::Running);
        self.state.running.fetch_add(1, Ordering::Relaxed);
        self.active.insert(
            key.clone(),
            ActiveRetrieval {
                state_tx,
                outcome_slot,
                cancel: cancel.clone(),
            },
        );

        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let outcome = execute_retrieval(retriever, &key, cancel).await;
            // Send fails only when the scheduler already shut down; the
            // futures were settled as cancelled in that case.
            let _ = completion_tx.send(RetrievalCompletion { key, outcome });
        });
    }

    fn handle_completion(&mut self, completion: RetrievalCompletion) {
        let RetrievalCompletion { key, outcome } = completion;
        let Some(active) = self.active.remove(&key) else {
            // Settled already by an immediate shutdown racing this worker.
            return;
        };
        self.state.running.fetch_sub(1, Ordering::Relaxed);

        match &outcome {
            RetrievalOutcome::Complete(payload) => {
                let len = payload.as_ref().map(|bytes| bytes.len()).unwrap_or(0);
                debug!(key = %key, bytes = len, "Retrieval complete");
            }
            RetrievalOutcome::Failed(error) => {
                warn!(key = %key, error = %error, "Retrieval failed");
            }
            RetrievalOutcome::Cancelled => {
                debug!(key = %key, "Retrieval cancelled");
            }
        }

        self.finalize(&key, &active.state_tx, &active.outcome_slot, outcome);
    }

    /// Stop accepting, discard queued work, let running work finish.
    fn begin_drain(&mut self) {
        info!(
            discarded = self.queue.len(),
            running = self.active.len(),
            "Draining retrieval service"
        );
        self.draining = true;
        self.submission_rx.close();
        self.discard_queued();
    }

    /// Cancel everything, running work included, and settle all futures.
    fn shutdown_immediate(&mut self) {
        info!(
            queued = self.queue.len(),
            running = self.active.len(),
            "Stopping retrieval service immediately"
        );
        self.submission_rx.close();
        self.discard_queued();

        let active: Vec<(RetrievalKey, ActiveRetrieval)> = self.active.drain().collect();
        for (key, entry) in active {
            entry.cancel.cancel();
            self.state.running.fetch_sub(1, Ordering::Relaxed);
            self.finalize(
                &key,
                &entry.state_tx,
                &entry.outcome_slot,
                RetrievalOutcome::Cancelled,
            );
        }
    }

    /// Settles every queued retrieval (and any submission still buffered in
    /// the channel) as cancelled.
    fn discard_queued(&mut self) {
        while let Ok(submitted) = self.submission_rx.try_recv() {
            self.state.queued.fetch_sub(1, Ordering::Relaxed);
            self.finalize(
                &submitted.key,
                &submitted.state_tx,
                &submitted.outcome_slot,
                RetrievalOutcome::Cancelled,
            );
        }
        while let Some(queued) = self.queue.pop() {
            let submitted = queued.submitted;
            self.state.queued.fetch_sub(1, Ordering::Relaxed);
            self.finalize(
                &submitted.key,
                &submitted.state_tx,
                &submitted.outcome_slot,
                RetrievalOutcome::Cancelled,
            );
        }
    }

    /// Removes the retrieval from the dedup registry and settles its
    /// future. Counter updates happen in the callers, before this runs, so
    /// a waiter woken by the broadcast observes them already applied.
    fn finalize(
        &self,
        key: &RetrievalKey,
        state_tx: &watch::Sender<RetrievalState>,
        outcome_slot: &OutcomeSlot,
        outcome: RetrievalOutcome,
    ) {
        self.state.registry.remove(key);
        let state = outcome.state();
        *outcome_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        let _ = state_tx.send(state);
    }
}

/// One worker's whole retrieval: fetch, then post-process.
///
/// Panics in the retriever or post-processor are caught here so a buggy
/// implementation fails one future instead of a worker. The post-processor
/// runs exactly once, on success or failure; a cancelled fetch never
/// reaches it.
async fn execute_retrieval(
    retriever: Arc<dyn Retriever>,
    key: &RetrievalKey,
    cancel: CancellationToken,
) -> RetrievalOutcome {
    let ctx = RetrievalContext::new(cancel.clone());

    let fetched = tokio::select! {
        biased;

        _ = cancel.cancelled() => {
            return RetrievalOutcome::Cancelled;
        }

        result = AssertUnwindSafe(retriever.fetch(&ctx)).catch_unwind() => {
            match result {
                Ok(fetched) => fetched,
                Err(_) => {
                    warn!(key = %key, "Retriever panicked");
                    Err(RetrievalError::Panicked)
                }
            }
        }
    };

    match retriever.post_processor() {
        Some(processor) => {
            match AssertUnwindSafe(processor.process(key, fetched))
                .catch_unwind()
                .await
            {
                Ok(Ok(payload)) => RetrievalOutcome::Complete(payload),
                Ok(Err(error)) => RetrievalOutcome::Failed(error),
                Err(_) => {
                    warn!(key = %key, "Post-processor panicked");
                    RetrievalOutcome::Failed(RetrievalError::Panicked)
                }
            }
        }
        None => match fetched {
            Ok(bytes) => RetrievalOutcome::Complete(Some(bytes)),
            Err(error) => RetrievalOutcome::Failed(error),
        },
    }
}
