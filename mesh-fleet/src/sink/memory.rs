//! In-memory sink for testing.

use super::{ArtifactSink, SinkError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One artifact captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Key it was stored under.
    pub key: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
    /// Declared content type.
    pub content_type: String,
}

/// Keeps every artifact in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemorySinkInner>>,
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    artifacts: Vec<StoredArtifact>,
    failure: Option<String>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemorySinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every `put()` fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    /// Everything stored so far, in order.
    pub fn artifacts(&self) -> Vec<StoredArtifact> {
        self.lock().artifacts.clone()
    }

    /// The last stored artifact.
    pub fn last(&self) -> Option<StoredArtifact> {
        self.lock().artifacts.last().cloned()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), SinkError> {
        let mut inner = self.lock();
        if let Some(message) = &inner.failure {
            return Err(SinkError::Unavailable(message.clone()));
        }
        inner.artifacts.push(StoredArtifact {
            key: key.to_string(),
            bytes: bytes.to_vec(),
            content_type: content_type.to_string(),
        });
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_puts() {
        let sink = MemorySink::new();
        sink.put("k", b"v", "application/json").await.unwrap();
        let last = sink.last().unwrap();
        assert_eq!(last.key, "k");
        assert_eq!(last.content_type, "application/json");
        assert_eq!(sink.artifacts().len(), 1);
    }

    #[tokio::test]
    async fn scripted_failure() {
        let sink = MemorySink::new();
        sink.fail_with("bucket gone");
        assert!(matches!(
            sink.put("k", b"v", "application/json").await,
            Err(SinkError::Unavailable(_))
        ));
        assert!(sink.artifacts().is_empty());
    }
}
