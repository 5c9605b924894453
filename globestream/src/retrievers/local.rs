//! File-system retriever for bundled or pre-installed data.
//!
//! Globe data often ships partly on disk (base-layer imagery, coastline
//! vectors) with only higher detail fetched over the network. A
//! [`LocalRetriever`] runs such reads through the same pool, priority
//! queue, and dedup registry as remote fetches, so callers handle one
//! completion path for both.

use crate::retrieval::{
    RetrievalContext, RetrievalError, RetrievalPostProcessor, Retriever,
};
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tracing::trace;

/// Fetches one resource from a local file.
pub struct LocalRetriever {
    key: String,
    path: PathBuf,
    target: String,
    post_processor: Option<Arc<dyn RetrievalPostProcessor>>,
}

impl LocalRetriever {
    /// Create a retriever for the file at `path`, identified by `key`.
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let target = path.display().to_string();
        Self {
            key: key.into(),
            path,
            target,
            post_processor: None,
        }
    }

    /// Attach a post-processor to run on this retrieval's outcome.
    pub fn with_post_processor(mut self, processor: Arc<dyn RetrievalPostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    /// The file this retriever reads.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Bytes, RetrievalError> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => {
                trace!(path = %self.target, bytes = data.len(), "Local file read");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RetrievalError::NotFound {
                target: self.target.clone(),
            }),
            Err(e) => Err(RetrievalError::Io(format!(
                "reading {} failed: {e}",
                self.target
            ))),
        }
    }
}

impl Retriever for LocalRetriever {
    fn key(&self) -> &str {
        &self.key
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn post_processor(&self) -> Option<Arc<dyn RetrievalPostProcessor>> {
        self.post_processor.clone()
    }

    fn fetch<'a>(
        &'a self,
        _ctx: &'a RetrievalContext,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, RetrievalError>> + Send + 'a>> {
        Box::pin(self.read())
    }
}

impl std::fmt::Debug for LocalRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRetriever")
            .field("key", &self.key)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
