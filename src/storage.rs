use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::R2Config;

#[derive(Debug, thiserror::Error)]
#[error("object storage request failed: {0}")]
pub struct StorageError(pub String);

/// Somewhere uploaded bytes can be put and later fetched by public URL.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `body` under `key` and returns its public URL.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String, StorageError>;
}

/// Cloudflare R2 through its S3-compatible API.
#[derive(Clone)]
pub struct R2Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl R2Storage {
    pub fn new(config: &R2Config) -> Self {
        let credentials = Credentials::new(
            config.api_key.clone(),
            config.api_secret.clone(),
            None,
            None,
            "cloudflare-r2",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .endpoint_url(config.endpoint())
            .credentials_provider(credentials)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket_name.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorage for R2Storage {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key, error = %e, "R2 upload failed");
                StorageError(e.to_string())
            })?;

        tracing::info!(key, bucket = %self.bucket, "object uploaded");
        Ok(format!("{}/{}", self.public_url, key))
    }
}
