//! HTTP retriever backed by reqwest.

use crate::retrieval::{
    RetrievalContext, RetrievalError, RetrievalPostProcessor, Retriever, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_READ_TIMEOUT,
};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// Default User-Agent string for HTTP requests.
/// Required by some tile servers that reject requests without a User-Agent.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Builds the shared HTTP client retrievers are cloned around.
///
/// Optimized for high-throughput tile download:
/// - Large connection pool with high idle limits
/// - TCP keepalive to maintain warm connections
/// - TCP nodelay for reduced latency
///
/// The connect timeout is a client property; per-request read budgets come
/// from each retriever.
pub fn default_http_client(connect_timeout: Duration) -> Result<reqwest::Client, RetrievalError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(DEFAULT_USER_AGENT)
        .pool_max_idle_per_host(128)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .tcp_nodelay(true)
        .build()
        .map_err(|e| RetrievalError::Transfer(format!("failed to create HTTP client: {e}")))
}

/// Fetches one resource over HTTP GET.
///
/// The [`reqwest::Client`] is shared (it is internally reference-counted),
/// so constructing one retriever per tile request is cheap and reuses the
/// client's connection pool.
///
/// # Example
///
/// ```ignore
/// use globestream::retrievers::{default_http_client, HttpRetriever};
///
/// let client = default_http_client(DEFAULT_CONNECT_TIMEOUT)?;
/// let retriever = HttpRetriever::new(
///     client.clone(),
///     "imagery/9/14/7",
///     "https://tiles.example.com/9/14/7.jpg",
/// );
/// let future = service.run_retriever(Arc::new(retriever), Priority::ON_DEMAND)?;
/// ```
pub struct HttpRetriever {
    client: reqwest::Client,
    key: String,
    url: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    post_processor: Option<Arc<dyn RetrievalPostProcessor>>,
}

impl HttpRetriever {
    /// Create a retriever for `url`, identified by `key`.
    pub fn new(client: reqwest::Client, key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client,
            key: key.into(),
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            post_processor: None,
        }
    }

    /// Override the advertised connect timeout.
    ///
    /// The effective connect timeout is the shared client's; pass the same
    /// value to [`default_http_client`] for the two to agree.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the total per-request time budget.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Attach a post-processor to run on this retrieval's outcome.
    pub fn with_post_processor(mut self, processor: Arc<dyn RetrievalPostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    async fn get(&self) -> Result<Bytes, RetrievalError> {
        trace!(url = %self.url, "HTTP GET request starting");

        let response = self
            .client
            .get(&self.url)
            .timeout(self.read_timeout)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RetrievalError::NotFound {
                target: self.url.clone(),
            });
        }
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "HTTP error status");
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                target: self.url.clone(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;
        trace!(url = %self.url, bytes = bytes.len(), "HTTP response body read");
        Ok(bytes)
    }

    fn map_request_error(&self, error: reqwest::Error) -> RetrievalError {
        if error.is_timeout() {
            RetrievalError::Timeout(self.read_timeout)
        } else if error.is_connect() {
            RetrievalError::Transfer(format!("connect to {} failed: {error}", self.url))
        } else {
            RetrievalError::Transfer(format!("request to {} failed: {error}", self.url))
        }
    }
}

impl Retriever for HttpRetriever {
    fn key(&self) -> &str {
        &self.key
    }

    fn target(&self) -> &str {
        &self.url
    }

    fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn post_processor(&self) -> Option<Arc<dyn RetrievalPostProcessor>> {
        self.post_processor.clone()
    }

    // Cancellation is handled by the service, which races this future
    // against the retrieval's token; reqwest's awaits are interruption
    // points, so a cancelled transfer stops at the next chunk.
    fn fetch<'a>(
        &'a self,
        _ctx: &'a RetrievalContext,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, RetrievalError>> + Send + 'a>> {
        Box::pin(self.get())
    }
}

impl std::fmt::Debug for HttpRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRetriever")
            .field("key", &self.key)
            .field("url", &self.url)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> reqwest::Client {
        default_http_client(DEFAULT_CONNECT_TIMEOUT).unwrap()
    }

    #[test]
    fn test_identity_and_timeouts() {
        let retriever = HttpRetriever::new(
            test_client(),
            "imagery/9/14/7",
            "https://tiles.example.com/9/14/7.jpg",
        )
        .with_connect_timeout(Duration::from_secs(5))
        .with_read_timeout(Duration::from_secs(12));

        assert_eq!(retriever.key(), "imagery/9/14/7");
        assert_eq!(retriever.target(), "https://tiles.example.com/9/14/7.jpg");
        assert_eq!(retriever.connect_timeout(), Duration::from_secs(5));
        assert_eq!(retriever.read_timeout(), Duration::from_secs(12));
        assert!(retriever.post_processor().is_none());
    }

    #[test]
    fn test_default_client_builds() {
        assert!(default_http_client(Duration::from_secs(3)).is_ok());
    }
}
