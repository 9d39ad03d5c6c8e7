//! Artifact sinks for run reports.
//!
//! A sink stores one blob under a key. The pipeline writes a single JSON
//! report per run, keyed by timestamp.

mod file;
mod memory;
mod s3;

pub use file::FileSink;
pub use memory::{MemorySink, StoredArtifact};
pub use s3::S3Sink;

use async_trait::async_trait;
use bgpmesh_types::Report;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Content type of encoded reports.
pub const REPORT_CONTENT_TYPE: &str = "application/json";

/// Artifact sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the local file system failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The report could not be serialized.
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    /// The key cannot be stored by this sink.
    #[error("invalid artifact key: {0:?}")]
    InvalidKey(String),

    /// The object store rejected the upload.
    #[error("upload to s3://{bucket}/{key} failed: {reason}")]
    Upload {
        /// Target bucket.
        bucket: String,
        /// Target key.
        key: String,
        /// Error chain from the SDK.
        reason: String,
    },

    /// The sink was told to fail.
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Stores artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous artifact.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), SinkError>;

    /// Human-readable location of `key`, for logs.
    fn location(&self, key: &str) -> String;
}

/// `{prefix}/{YYYYmmdd_HHMMSS}_results.json`.
pub fn report_key(prefix: &str, at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S");
    match prefix.trim_end_matches('/') {
        "" => format!("{stamp}_results.json"),
        prefix => format!("{prefix}/{stamp}_results.json"),
    }
}

/// Serialize a report as indented JSON.
pub fn encode_report(report: &Report) -> Result<Vec<u8>, SinkError> {
    Ok(serde_json::to_vec_pretty(report)?)
}
