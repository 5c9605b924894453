//! Retrieval service: public handle and submission path.
//!
//! [`RetrievalService`] is a cheap-to-clone handle. Submissions flow through
//! an unbounded channel to the scheduler loop; introspection reads shared
//! atomics, so callers on a render path never contend with the pool.
//!
//! Deduplication happens here, at submission time: the in-flight registry is
//! keyed by [`RetrievalKey`], and a submission whose key is already queued or
//! running receives a clone of the existing [`RetrievalFuture`] instead of
//! scheduling a second fetch.

use super::config::{RetrievalConfig, RetrievalConfigError};
use super::future::{OutcomeSlot, RetrievalFuture, RetrievalState};
use super::retriever::Retriever;
use super::scheduler::Scheduler;
use super::types::{Priority, RetrievalKey, SubmitError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// State shared between the service handle and the scheduler loop.
pub(crate) struct ServiceState {
    /// Queued-or-running retrievals by identity; the dedup registry.
    pub registry: DashMap<RetrievalKey, RetrievalFuture>,
    /// Submissions accepted but not yet dispatched.
    pub queued: AtomicUsize,
    /// Retrievals currently executing on a worker.
    pub running: AtomicUsize,
    /// Worker pool size; read by the scheduler on every dispatch pass.
    pub pool_size: AtomicUsize,
    /// Cleared when shutdown is initiated.
    pub accepting: AtomicBool,
    /// Wakes the scheduler when dispatch conditions may have changed.
    pub work_notify: Notify,
}

/// A submission travelling from the service handle to the scheduler.
pub(crate) struct SubmittedRetrieval {
    pub retriever: Arc<dyn Retriever>,
    pub key: RetrievalKey,
    pub priority: Priority,
    pub state_tx: watch::Sender<RetrievalState>,
    pub outcome_slot: OutcomeSlot,
    pub cancel: CancellationToken,
}

/// Concurrent retrieval pool with priority scheduling and deduplication.
///
/// A bounded pool of workers consumes a priority queue of
/// [`Retriever`]s; equivalent submissions coalesce onto one fetch. The
/// service is an explicit component instance, so independent pools (one for
/// imagery, one for metadata) can coexist and shut down separately.
///
/// # Example
///
/// ```ignore
/// use globestream::retrieval::{Priority, RetrievalConfig, RetrievalService};
///
/// let service = RetrievalService::new(RetrievalConfig::default())?;
/// let mut future = service.run_retriever(retriever, Priority::ON_DEMAND)?;
/// let outcome = future.wait().await;
///
/// service.shutdown(false);
/// service.join().await;
/// ```
///
/// Must be created inside a Tokio runtime; the scheduler loop is spawned by
/// the constructor.
#[derive(Clone)]
pub struct RetrievalService {
    state: Arc<ServiceState>,
    submission_tx: mpsc::UnboundedSender<SubmittedRetrieval>,
    drain: CancellationToken,
    shutdown_now: CancellationToken,
    scheduler: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RetrievalService {
    /// Start a retrieval service.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalConfigError::InvalidConfig`] for a zero pool size.
    pub fn new(config: RetrievalConfig) -> Result<Self, RetrievalConfigError> {
        config.validate()?;

        let state = Arc::new(ServiceState {
            registry: DashMap::new(),
            queued: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            pool_size: AtomicUsize::new(config.pool_size),
            accepting: AtomicBool::new(true),
            work_notify: Notify::new(),
        });

        let (submission_tx, submission_rx) = mpsc::unbounded_channel();
        let drain = CancellationToken::new();
        let shutdown_now = CancellationToken::new();

        let scheduler = Scheduler::new(
            Arc::clone(&state),
            submission_rx,
            drain.clone(),
            shutdown_now.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        Ok(Self {
            state,
            submission_tx,
            drain,
            shutdown_now,
            scheduler: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// Schedule a retrieval.
    ///
    /// Non-blocking: the retriever is enqueued for the worker pool and a
    /// future for its outcome is returned. If an equivalent retrieval (same
    /// key and target) is already queued or running, no new work is
    /// scheduled and the returned future observes the in-flight one. Higher
    /// priority runs first; FIFO among equals. The coalesced submission
    /// keeps the first submission's priority.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Unavailable`] once shutdown has been initiated,
    /// [`SubmitError::EmptyKey`] for a retriever with an empty resource key.
    pub fn run_retriever(
        &self,
        retriever: Arc<dyn Retriever>,
        priority: Priority,
    ) -> Result<RetrievalFuture, SubmitError> {
        if !self.state.accepting.load(Ordering::SeqCst) {
            return Err(SubmitError::Unavailable);
        }
        if retriever.key().is_empty() {
            return Err(SubmitError::EmptyKey);
        }

        let key = RetrievalKey::new(retriever.key(), retriever.target());

        let (future, submitted) = {
            use dashmap::mapref::entry::Entry;
            match self.state.registry.entry(key.clone()) {
                Entry::Occupied(in_flight) => {
                    debug!(key = %key, "Coalesced duplicate retrieval");
                    return Ok(in_flight.get().clone());
                }
                Entry::Vacant(vacant) => {
                    let (state_tx, state_rx) = watch::channel(RetrievalState::Pending);
                    let cancel = CancellationToken::new();
                    let future = RetrievalFuture::new(key.clone(), state_rx, cancel.clone());
                    let outcome_slot = future.outcome_slot();
                    vacant.insert(future.clone());
                    let submitted = SubmittedRetrieval {
                        retriever,
                        key,
                        priority,
                        state_tx,
                        outcome_slot,
                        cancel,
                    };
                    (future, submitted)
                }
            }
        };

        trace!(key = %submitted.key, priority = %priority, "Retrieval submitted");

        match self.submission_tx.send(submitted) {
            Ok(()) => {
                self.state.queued.fetch_add(1, Ordering::Relaxed);
                Ok(future)
            }
            Err(failed) => {
                // Scheduler exited between the availability check and the
                // send; undo the registration.
                self.state.registry.remove(&failed.0.key);
                Err(SubmitError::Unavailable)
            }
        }
    }

    /// Whether an equivalent retrieval is currently queued or running.
    pub fn contains(&self, retriever: &dyn Retriever) -> bool {
        self.contains_key(&RetrievalKey::new(retriever.key(), retriever.target()))
    }

    /// Whether a retrieval with this identity is queued or running.
    pub fn contains_key(&self, key: &RetrievalKey) -> bool {
        self.state.registry.contains_key(key)
    }

    /// Whether any retrieval is currently executing on a worker.
    pub fn has_active_tasks(&self) -> bool {
        self.state.running.load(Ordering::Relaxed) > 0
    }

    /// Number of submissions accepted but not yet dispatched to a worker.
    pub fn pending_count(&self) -> usize {
        self.state.queued.load(Ordering::Relaxed)
    }

    /// Current worker pool size.
    pub fn pool_size(&self) -> usize {
        self.state.pool_size.load(Ordering::Relaxed)
    }

    /// Resize the worker pool.
    ///
    /// Takes effect for new dispatches; already-running retrievals are not
    /// interrupted when shrinking.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalConfigError::InvalidConfig`] for a zero size.
    pub fn set_pool_size(&self, pool_size: usize) -> Result<(), RetrievalConfigError> {
        if pool_size == 0 {
            return Err(RetrievalConfigError::InvalidConfig(
                "pool size must be at least one".to_string(),
            ));
        }
        self.state.pool_size.store(pool_size, Ordering::Relaxed);
        self.state.work_notify.notify_one();
        info!(pool_size, "Retriever pool resized");
        Ok(())
    }

    /// Whether the service is accepting submissions.
    pub fn is_available(&self) -> bool {
        self.state.accepting.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Non-blocking; pair with [`join`](Self::join) to
    /// wait for the scheduler to stop.
    ///
    /// With `immediately` set, running retrievals are cancelled and every
    /// unsettled future resolves cancelled, with no post-processing.
    /// Otherwise queued retrievals are discarded (their futures resolve
    /// cancelled) but running ones complete and deliver their results.
    pub fn shutdown(&self, immediately: bool) {
        if self.state.accepting.swap(false, Ordering::SeqCst) {
            info!(immediately, "Retrieval service shutdown requested");
        }
        if immediately {
            self.shutdown_now.cancel();
        } else {
            self.drain.cancel();
        }
    }

    /// Wait for the scheduler loop to terminate.
    ///
    /// Returns immediately if another clone already collected it.
    pub async fn join(&self) {
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("pool_size", &self.pool_size())
            .field("pending", &self.pending_count())
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::retriever::RetrievalContext;
    use crate::retrieval::types::RetrievalError;
    use crate::retrieval::RetrievalOutcome;
    use bytes::Bytes;
    use std::future::Future;
    use std::pin::Pin;

    struct EchoRetriever {
        key: String,
        payload: Bytes,
    }

    impl Retriever for EchoRetriever {
        fn key(&self) -> &str {
            &self.key
        }

        fn target(&self) -> &str {
            "mem://echo"
        }

        fn fetch<'a>(
            &'a self,
            _ctx: &'a RetrievalContext,
        ) -> Pin<Box<dyn Future<Output = Result<Bytes, RetrievalError>> + Send + 'a>> {
            let payload = self.payload.clone();
            Box::pin(async move { Ok(payload) })
        }
    }

    fn echo(key: &str, payload: &'static [u8]) -> Arc<EchoRetriever> {
        Arc::new(EchoRetriever {
            key: key.to_string(),
            payload: Bytes::from_static(payload),
        })
    }

    #[tokio::test]
    async fn test_zero_pool_size_rejected() {
        let result = RetrievalService::new(RetrievalConfig::default().with_pool_size(0));
        assert!(matches!(result, Err(RetrievalConfigError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let service = RetrievalService::new(RetrievalConfig::default()).unwrap();

        let mut future = service
            .run_retriever(echo("tile/1", b"payload"), Priority::ON_DEMAND)
            .unwrap();

        let outcome = future.wait().await;
        assert_eq!(
            outcome,
            RetrievalOutcome::Complete(Some(Bytes::from_static(b"payload")))
        );

        // Settled work leaves the dedup registry.
        assert!(!service.contains_key(future.key()));
        assert_eq!(service.pending_count(), 0);
        assert!(!service.has_active_tasks());

        service.shutdown(false);
        service.join().await;
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let service = RetrievalService::new(RetrievalConfig::default()).unwrap();

        let result = service.run_retriever(echo("", b""), Priority::PREFETCH);
        assert_eq!(result.err(), Some(SubmitError::EmptyKey));

        service.shutdown(true);
        service.join().await;
    }

    #[tokio::test]
    async fn test_unavailable_after_shutdown() {
        let service = RetrievalService::new(RetrievalConfig::default()).unwrap();
        assert!(service.is_available());

        service.shutdown(false);
        assert!(!service.is_available());

        let result = service.run_retriever(echo("tile/2", b"x"), Priority::ON_DEMAND);
        assert_eq!(result.err(), Some(SubmitError::Unavailable));

        service.join().await;
    }

    #[tokio::test]
    async fn test_set_pool_size() {
        let service = RetrievalService::new(RetrievalConfig::default()).unwrap();
        assert_eq!(service.pool_size(), crate::retrieval::DEFAULT_POOL_SIZE);

        service.set_pool_size(9).unwrap();
        assert_eq!(service.pool_size(), 9);

        assert!(matches!(
            service.set_pool_size(0),
            Err(RetrievalConfigError::InvalidConfig(_))
        ));
        assert_eq!(service.pool_size(), 9);

        service.shutdown(true);
        service.join().await;
    }

    #[tokio::test]
    async fn test_join_twice_returns() {
        let service = RetrievalService::new(RetrievalConfig::default()).unwrap();
        let clone = service.clone();

        service.shutdown(false);
        service.join().await;
        clone.join().await;
    }
}
