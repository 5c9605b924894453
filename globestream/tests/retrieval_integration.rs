//! Integration tests for the retrieval pipeline.
//!
//! These tests verify the complete retrieval workflow including:
//! - Submission, execution and outcome delivery
//! - Priority ordering under a constrained worker pool
//! - Deduplication of concurrent submissions for one key
//! - Cancellation of queued retrievals
//! - Graceful and immediate shutdown semantics
//! - Live worker pool resizing
//! - Caller-side wiring of cache, store and absent list

use bytes::Bytes;
use globestream::absent::{AbsentListConfig, AbsentResourceList};
use globestream::cache::{CacheObject, MemoryCache, MemoryCacheSet};
use globestream::retrieval::{
    Priority, RetrievalConfig, RetrievalContext, RetrievalError, RetrievalKey, RetrievalOutcome,
    RetrievalPostProcessor, RetrievalService, Retriever, SubmitError,
};
use globestream::store::FileStore;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

// =============================================================================
// Test Helpers
// =============================================================================

/// A retriever that blocks on a semaphore gate before returning its payload,
/// recording the order in which fetches start.
struct GatedRetriever {
    key: String,
    payload: Bytes,
    gate: Arc<Semaphore>,
    started: Arc<Mutex<Vec<String>>>,
    post_processor: Option<Arc<dyn RetrievalPostProcessor>>,
}

impl GatedRetriever {
    fn new(key: &str, payload: &'static [u8], gate: Arc<Semaphore>) -> Self {
        Self {
            key: key.to_string(),
            payload: Bytes::from_static(payload),
            gate,
            started: Arc::new(Mutex::new(Vec::new())),
            post_processor: None,
        }
    }

    fn with_started(mut self, started: Arc<Mutex<Vec<String>>>) -> Self {
        self.started = started;
        self
    }

    fn with_post_processor(mut self, processor: Arc<dyn RetrievalPostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }
}

impl Retriever for GatedRetriever {
    fn key(&self) -> &str {
        &self.key
    }

    fn target(&self) -> &str {
        "test://gated"
    }

    fn post_processor(&self) -> Option<Arc<dyn RetrievalPostProcessor>> {
        self.post_processor.clone()
    }

    fn fetch<'a>(
        &'a self,
        _ctx: &'a RetrievalContext,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, RetrievalError>> + Send + 'a>> {
        Box::pin(async move {
            self.started.lock().unwrap().push(self.key.clone());
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| RetrievalError::Transfer("gate closed".to_string()))?;
            permit.forget();
            Ok(self.payload.clone())
        })
    }
}

/// A retriever that serves a fixed payload, or reports the resource missing
/// when it has none, counting how many times it actually runs.
struct MapRetriever {
    key: String,
    payload: Option<Bytes>,
    executions: Arc<AtomicUsize>,
}

impl MapRetriever {
    fn new(key: &str, payload: Option<&'static [u8]>) -> Self {
        Self {
            key: key.to_string(),
            payload: payload.map(Bytes::from_static),
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Retriever for MapRetriever {
    fn key(&self) -> &str {
        &self.key
    }

    fn target(&self) -> &str {
        "test://map"
    }

    fn fetch<'a>(
        &'a self,
        _ctx: &'a RetrievalContext,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, RetrievalError>> + Send + 'a>> {
        Box::pin(async move {
            self.executions.fetch_add(1, Ordering::SeqCst);
            match &self.payload {
                Some(bytes) => Ok(bytes.clone()),
                None => Err(RetrievalError::NotFound {
                    target: "test://map".to_string(),
                }),
            }
        })
    }
}

/// Post-processor that counts invocations and passes the result through.
struct RecordingProcessor {
    calls: Arc<AtomicUsize>,
}

impl RetrievalPostProcessor for RecordingProcessor {
    fn process<'a>(
        &'a self,
        _key: &'a RetrievalKey,
        result: Result<Bytes, RetrievalError>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, RetrievalError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            result.map(Some)
        })
    }
}

fn service_with_pool(pool_size: usize) -> RetrievalService {
    RetrievalService::new(RetrievalConfig::default().with_pool_size(pool_size))
        .expect("service should start")
}

/// Poll until `predicate` holds, panicking after two seconds.
async fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if predicate() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {what}");
}

// =============================================================================
// Integration Tests
// =============================================================================

#[tokio::test]
async fn test_service_executes_single_retrieval() {
    let service = service_with_pool(2);
    let retriever = Arc::new(MapRetriever::new("tiles/12/654/1583", Some(b"imagery")));
    let executions = retriever.executions.clone();

    let mut pending = service
        .run_retriever(retriever, Priority::ON_DEMAND)
        .unwrap();

    tokio::select! {
        outcome = pending.wait() => {
            assert_eq!(outcome.bytes().map(|b| &b[..]), Some(&b"imagery"[..]));
        }
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Retrieval timed out");
        }
    }

    assert_eq!(executions.load(Ordering::SeqCst), 1);
    assert!(!service.contains_key(pending.key()));
    assert!(!service.has_active_tasks());
    assert_eq!(service.pending_count(), 0);

    service.shutdown(false);
    service.join().await;
}

#[tokio::test]
async fn test_priority_order_on_single_worker() {
    let service = service_with_pool(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    // Occupy the only worker so later submissions stack up in the queue.
    let blocker_gate = Arc::new(Semaphore::new(0));
    let blocker = Arc::new(
        GatedRetriever::new("blocker", b"done", blocker_gate.clone())
            .with_started(started.clone()),
    );
    let mut blocker_pending = service
        .run_retriever(blocker, Priority::ON_DEMAND)
        .unwrap();

    wait_until("blocker to start", || started.lock().unwrap().len() == 1).await;

    // Submit in scrambled priority order while the worker is busy.
    let open_gate = Arc::new(Semaphore::new(16));
    let mut pendings = Vec::new();
    for (key, priority) in [
        ("low", Priority::HOUSEKEEPING),
        ("high", Priority::ON_DEMAND),
        ("mid", Priority::PREFETCH),
        ("low2", Priority::HOUSEKEEPING),
    ] {
        let retriever = Arc::new(
            GatedRetriever::new(key, b"done", open_gate.clone()).with_started(started.clone()),
        );
        pendings.push(service.run_retriever(retriever, priority).unwrap());
    }
    assert_eq!(service.pending_count(), 4);

    blocker_gate.add_permits(1);

    tokio::select! {
        _ = async {
            blocker_pending.wait().await;
            for pending in &mut pendings {
                pending.wait().await;
            }
        } => {}
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Retrievals timed out");
        }
    }

    // Highest priority first; equal priorities keep submission order.
    let order = started.lock().unwrap().clone();
    assert_eq!(order, vec!["blocker", "high", "mid", "low", "low2"]);

    service.shutdown(false);
    service.join().await;
}

#[tokio::test]
async fn test_duplicate_submission_coalesces() {
    let service = service_with_pool(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    let gate = Arc::new(Semaphore::new(0));
    let first = Arc::new(
        GatedRetriever::new("tiles/dup", b"original", gate.clone()).with_started(started.clone()),
    );
    let mut first_pending = service.run_retriever(first, Priority::PREFETCH).unwrap();

    wait_until("first fetch to start", || {
        started.lock().unwrap().len() == 1
    })
    .await;

    // Same key while in flight: must coalesce onto the running retrieval,
    // not queue a second fetch.
    let second = Arc::new(MapRetriever::new("tiles/dup", Some(b"should not run")));
    let second_executions = second.executions.clone();
    let mut second_pending = service
        .run_retriever(second, Priority::ON_DEMAND)
        .unwrap();

    assert_eq!(service.pending_count(), 0);
    assert_eq!(first_pending.key(), second_pending.key());

    gate.add_permits(1);

    tokio::select! {
        _ = async {
            let first_outcome = first_pending.wait().await;
            let second_outcome = second_pending.wait().await;
            assert_eq!(first_outcome, second_outcome);
            assert_eq!(
                second_outcome.bytes().map(|b| &b[..]),
                Some(&b"original"[..])
            );
        } => {}
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Retrievals timed out");
        }
    }

    assert_eq!(second_executions.load(Ordering::SeqCst), 0);

    service.shutdown(false);
    service.join().await;
}

#[tokio::test]
async fn test_cancel_queued_retrieval_never_runs() {
    let service = service_with_pool(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    let blocker_gate = Arc::new(Semaphore::new(0));
    let blocker = Arc::new(
        GatedRetriever::new("blocker", b"done", blocker_gate.clone())
            .with_started(started.clone()),
    );
    let mut blocker_pending = service
        .run_retriever(blocker, Priority::ON_DEMAND)
        .unwrap();

    wait_until("blocker to start", || started.lock().unwrap().len() == 1).await;

    let processor_calls = Arc::new(AtomicUsize::new(0));
    let victim = Arc::new(
        GatedRetriever::new("victim", b"never", Arc::new(Semaphore::new(16)))
            .with_started(started.clone())
            .with_post_processor(Arc::new(RecordingProcessor {
                calls: processor_calls.clone(),
            })),
    );
    let mut victim_pending = service.run_retriever(victim, Priority::PREFETCH).unwrap();

    victim_pending.cancel();
    blocker_gate.add_permits(1);

    tokio::select! {
        outcome = victim_pending.wait() => {
            assert_eq!(outcome, RetrievalOutcome::Cancelled);
        }
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Cancelled retrieval never settled");
        }
    }
    blocker_pending.wait().await;

    // The victim never reached a worker and its processor never fired.
    assert_eq!(started.lock().unwrap().clone(), vec!["blocker"]);
    assert_eq!(processor_calls.load(Ordering::SeqCst), 0);
    assert!(!service.contains_key(victim_pending.key()));

    service.shutdown(false);
    service.join().await;
}

#[tokio::test]
async fn test_graceful_shutdown_delivers_running_work() {
    let service = service_with_pool(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    let gate = Arc::new(Semaphore::new(0));
    let running = Arc::new(
        GatedRetriever::new("running", b"finished", gate.clone()).with_started(started.clone()),
    );
    let mut running_pending = service
        .run_retriever(running, Priority::ON_DEMAND)
        .unwrap();

    wait_until("retrieval to start", || started.lock().unwrap().len() == 1).await;

    let queued = Arc::new(MapRetriever::new("queued", Some(b"discarded")));
    let queued_executions = queued.executions.clone();
    let mut queued_pending = service.run_retriever(queued, Priority::PREFETCH).unwrap();

    service.shutdown(false);

    // New work is refused and queued work is discarded, but the running
    // retrieval still completes and delivers its payload.
    assert!(!service.is_available());
    let rejected = Arc::new(MapRetriever::new("late", Some(b"late")));
    assert!(matches!(
        service.run_retriever(rejected, Priority::ON_DEMAND),
        Err(SubmitError::Unavailable)
    ));

    tokio::select! {
        outcome = queued_pending.wait() => {
            assert_eq!(outcome, RetrievalOutcome::Cancelled);
        }
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Discarded retrieval never settled");
        }
    }
    assert_eq!(queued_executions.load(Ordering::SeqCst), 0);

    gate.add_permits(1);

    tokio::select! {
        outcome = running_pending.wait() => {
            assert_eq!(outcome.bytes().map(|b| &b[..]), Some(&b"finished"[..]));
        }
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Running retrieval never completed");
        }
    }

    service.join().await;
    assert!(!service.has_active_tasks());
}

#[tokio::test]
async fn test_immediate_shutdown_cancels_running_and_skips_processing() {
    let service = service_with_pool(2);
    let started = Arc::new(Mutex::new(Vec::new()));
    let processor_calls = Arc::new(AtomicUsize::new(0));

    // Two retrievals stuck mid-transfer on a gate that never opens.
    let stuck_gate = Arc::new(Semaphore::new(0));
    let mut pendings = Vec::new();
    for key in ["stuck-a", "stuck-b"] {
        let retriever = Arc::new(
            GatedRetriever::new(key, b"never", stuck_gate.clone())
                .with_started(started.clone())
                .with_post_processor(Arc::new(RecordingProcessor {
                    calls: processor_calls.clone(),
                })),
        );
        pendings.push(
            service
                .run_retriever(retriever, Priority::ON_DEMAND)
                .unwrap(),
        );
    }

    wait_until("both retrievals to start", || {
        started.lock().unwrap().len() == 2
    })
    .await;

    service.shutdown(true);

    tokio::select! {
        _ = async {
            for pending in &mut pendings {
                assert_eq!(pending.wait().await, RetrievalOutcome::Cancelled);
            }
        } => {}
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Cancelled retrievals never settled");
        }
    }

    assert_eq!(processor_calls.load(Ordering::SeqCst), 0);

    service.join().await;
}

#[tokio::test]
async fn test_pool_resize_releases_queued_work() {
    let service = service_with_pool(2);
    let started = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(Semaphore::new(0));

    let mut pendings = Vec::new();
    for key in ["a", "b", "c", "d"] {
        let retriever =
            Arc::new(GatedRetriever::new(key, b"done", gate.clone()).with_started(started.clone()));
        pendings.push(
            service
                .run_retriever(retriever, Priority::ON_DEMAND)
                .unwrap(),
        );
    }

    // Only pool_size retrievals may run at once.
    wait_until("two retrievals to start", || {
        started.lock().unwrap().len() == 2
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(started.lock().unwrap().len(), 2);
    assert_eq!(service.pending_count(), 2);

    // Growing the pool dispatches the queued retrievals without any
    // completions happening first.
    service.set_pool_size(4).unwrap();
    wait_until("all four to start", || started.lock().unwrap().len() == 4).await;

    gate.add_permits(4);

    tokio::select! {
        _ = async {
            for pending in &mut pendings {
                assert!(pending.wait().await.is_complete());
            }
        } => {}
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
            panic!("Retrievals timed out");
        }
    }

    service.shutdown(false);
    service.join().await;
}

// =============================================================================
// Pipeline Wiring
// =============================================================================

/// Resolve one resource the way a virtual-globe client does: absent list
/// first, then memory cache, then file store, then the retrieval service,
/// writing successful payloads back into the store and cache.
async fn fetch_resource(
    service: &RetrievalService,
    cache: &Arc<MemoryCache>,
    store: &FileStore,
    absent: &AbsentResourceList,
    retriever: Arc<MapRetriever>,
) -> Option<Bytes> {
    let key = retriever.key.clone();

    if absent.is_resource_absent(&key) {
        return None;
    }
    if let Some(object) = cache.get(&key) {
        if let Ok(bytes) = object.downcast::<Bytes>() {
            return Some(bytes.as_ref().clone());
        }
    }
    if let Ok(Some(bytes)) = store.read(&key) {
        let _ = cache.put(&key, Arc::new(bytes.clone()) as CacheObject, bytes.len());
        return Some(bytes);
    }

    let mut pending = service.run_retriever(retriever, Priority::ON_DEMAND).ok()?;
    match pending.wait().await {
        RetrievalOutcome::Complete(Some(bytes)) => {
            store.write(&key, &bytes).ok()?;
            let _ = cache.put(&key, Arc::new(bytes.clone()) as CacheObject, bytes.len());
            Some(bytes)
        }
        RetrievalOutcome::Failed(RetrievalError::NotFound { .. }) => {
            absent.mark_resource_absent(&key);
            None
        }
        _ => None,
    }
}

#[tokio::test]
async fn test_pipeline_wires_cache_store_and_absent_list() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::single(temp_dir.path()).unwrap();

    let caches = MemoryCacheSet::new();
    let cache = caches.get_or_insert_with("tiles", || {
        Arc::new(MemoryCache::new("tiles", 1024 * 1024).unwrap())
    });

    let absent = AbsentResourceList::new(AbsentListConfig::default()).unwrap();
    let service = service_with_pool(2);

    // First fetch goes to the source and lands in both store and cache.
    let first = Arc::new(MapRetriever::new("tiles/12/654/1583", Some(b"imagery")));
    let first_executions = first.executions.clone();
    let payload = fetch_resource(&service, &cache, &store, &absent, first).await;
    assert_eq!(payload.as_deref(), Some(&b"imagery"[..]));
    assert_eq!(first_executions.load(Ordering::SeqCst), 1);
    assert!(store.exists("tiles/12/654/1583"));
    assert!(cache.contains("tiles/12/654/1583"));

    // Second fetch is served from cache; the retriever never runs.
    let cached = Arc::new(MapRetriever::new("tiles/12/654/1583", Some(b"imagery")));
    let cached_executions = cached.executions.clone();
    let payload = fetch_resource(&service, &cache, &store, &absent, cached).await;
    assert_eq!(payload.as_deref(), Some(&b"imagery"[..]));
    assert_eq!(cached_executions.load(Ordering::SeqCst), 0);

    // With the cache entry dropped, the store satisfies the fetch.
    cache.remove("tiles/12/654/1583");
    let stored = Arc::new(MapRetriever::new("tiles/12/654/1583", Some(b"imagery")));
    let stored_executions = stored.executions.clone();
    let payload = fetch_resource(&service, &cache, &store, &absent, stored).await;
    assert_eq!(payload.as_deref(), Some(&b"imagery"[..]));
    assert_eq!(stored_executions.load(Ordering::SeqCst), 0);
    assert!(cache.contains("tiles/12/654/1583"));

    // A missing resource is recorded and the next fetch is short-circuited
    // before it reaches the retrieval service.
    let missing = Arc::new(MapRetriever::new("tiles/0/0/0", None));
    let missing_executions = missing.executions.clone();
    let payload = fetch_resource(&service, &cache, &store, &absent, missing).await;
    assert!(payload.is_none());
    assert_eq!(missing_executions.load(Ordering::SeqCst), 1);
    assert!(absent.is_resource_absent("tiles/0/0/0"));

    let retry = Arc::new(MapRetriever::new("tiles/0/0/0", None));
    let retry_executions = retry.executions.clone();
    let payload = fetch_resource(&service, &cache, &store, &absent, retry).await;
    assert!(payload.is_none());
    assert_eq!(retry_executions.load(Ordering::SeqCst), 0);

    service.shutdown(false);
    service.join().await;
}
