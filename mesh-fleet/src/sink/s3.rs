//! S3 sink.

use super::{ArtifactSink, SinkError};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

/// Uploads artifacts to one S3 bucket.
///
/// Credentials and region come from the standard AWS environment chain.
#[derive(Debug, Clone)]
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Sink {
    /// Wrap an existing client.
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the environment, optionally pinning the region.
    pub async fn from_env(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self::new(aws_sdk_s3::Client::new(&sdk_config), bucket)
    }
}

#[async_trait]
impl ArtifactSink for S3Sink {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), SinkError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| SinkError::Upload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        tracing::debug!(bucket = %self.bucket, key, bytes = bytes.len(), "artifact uploaded");
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
