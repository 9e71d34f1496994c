// backuptool/src/store/mod.rs
use anyhow::{Context, Result};
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::Region;
use s3::error::SdkError;
use s3::operation::list_objects_v2::ListObjectsV2Error;
use s3::primitives::ByteStream;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::StoreConfig;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// One listed object under the backup prefix.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub size_bytes: u64,
    /// Remote last-modified metadata; authoritative creation instant for a
    /// snapshot, since the id string truncates to whole seconds.
    pub last_modified: DateTime<Utc>,
}

/// Thin client over an S3-compatible object store, constructed once from a
/// validated [`StoreConfig`]. All calls are direct passthroughs; SDK-internal
/// retries are disabled so the health prober is the only retry layer.
#[derive(Debug, Clone)]
pub struct StoreClient {
    client: s3::Client,
    bucket: String,
    prefix: String,
}

impl StoreClient {
    pub async fn connect(config: &StoreConfig) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static", // provider_name
            ))
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                    .build(),
            )
            .load()
            .await;

        StoreClient {
            client: s3::Client::new(&sdk_config),
            bucket: config.bucket_name.clone(),
            prefix: config.path_prefix.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full object key for a snapshot id.
    pub fn key_for(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Streams a local file to the store under `key`, attaching `metadata`
    /// as object metadata.
    pub async fn put_file(
        &self,
        key: &str,
        file_path: &Path,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        let body = ByteStream::from_path(file_path).await.with_context(|| {
            format!("Failed to create ByteStream from file: {}", file_path.display())
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .set_metadata(Some(metadata))
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to upload {} to bucket {} with key {}",
                    file_path.display(),
                    self.bucket,
                    key
                )
            })?;

        debug!(key, "upload complete");
        Ok(())
    }

    /// Streams the object at `key` into `destination_path`, returning the
    /// number of bytes written.
    pub async fn download_to(&self, key: &str, destination_path: &Path) -> Result<u64> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get object {} from bucket {}", key, self.bucket))?;

        let mut body = object.body.into_async_read();
        let mut file = tokio::fs::File::create(destination_path)
            .await
            .with_context(|| {
                format!("Failed to create destination file: {}", destination_path.display())
            })?;

        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .with_context(|| format!("Failed to write downloaded object to {}", destination_path.display()))?;
        file.flush().await?;

        debug!(key, bytes, "download complete");
        Ok(bytes)
    }

    /// Lists up to `max_keys` objects under the configured prefix.
    pub async fn list(&self, max_keys: i32) -> Result<Vec<ObjectInfo>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .max_keys(max_keys)
            .send()
            .await
            .with_context(|| format!("Failed to list objects under {}", self.prefix))?;

        let mut objects = Vec::new();
        for object in response.contents() {
            let Some(key) = object.key() else { continue };
            let Some(last_modified) = object.last_modified().and_then(to_chrono) else {
                continue;
            };
            objects.push(ObjectInfo {
                key: key.to_string(),
                size_bytes: object.size().unwrap_or(0).max(0) as u64,
                last_modified,
            });
        }
        Ok(objects)
    }

    /// Object metadata as written at upload time, or `None` when the store
    /// reports none.
    pub async fn head_metadata(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to read metadata for {}", key))?;
        Ok(response.metadata().cloned())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete object {}", key))?;
        Ok(())
    }

    /// Cheapest possible round-trip, used by the health prober. Returns the
    /// raw SDK error so failures can be classified structurally.
    pub async fn probe(&self) -> std::result::Result<(), SdkError<ListObjectsV2Error>> {
        self.client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .max_keys(1)
            .send()
            .await?;
        Ok(())
    }
}

fn to_chrono(timestamp: &s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_chrono_second_precision() {
        let ts = s3::primitives::DateTime::from_secs(1_704_067_200); // 2024-01-01T00:00:00Z
        let converted = to_chrono(&ts).unwrap();
        assert_eq!(converted.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }
}
