// backuptool/src/config/mod.rs
use std::env;
use std::path::PathBuf;
use tracing::warn;
use url::Url;

pub const ENV_ACCESS_KEY_ID: &str = "STORE_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "STORE_SECRET_ACCESS_KEY";
pub const ENV_BUCKET_NAME: &str = "STORE_BUCKET_NAME";
pub const ENV_ENDPOINT: &str = "STORE_ENDPOINT";
pub const ENV_REGION: &str = "STORE_REGION";
pub const ENV_BACKUP_PATH: &str = "STORE_BACKUP_PATH";
pub const ENV_DATABASE_FILE_PATH: &str = "DATABASE_FILE_PATH";
pub const ENV_RETENTION_DAYS: &str = "BACKUP_RETENTION_DAYS";
pub const ENV_PERIODIC_ENABLED: &str = "PERIODIC_BACKUP_ENABLED";
pub const ENV_PERIODIC_INTERVAL_HOURS: &str = "PERIODIC_BACKUP_INTERVAL_HOURS";

const DEFAULT_REGION: &str = "auto";
const DEFAULT_BACKUP_PATH: &str = "backups/";
const DEFAULT_DATABASE_FILE: &str = "./data/app.db";
const DEFAULT_RETENTION_DAYS: i64 = 30;
const DEFAULT_PERIODIC_INTERVAL_HOURS: u64 = 24;

// Values that look copied straight out of a sample .env file. A key matching
// one of these would only fail later as an opaque TLS/signature error, so the
// coordinator refuses them up front and stays disabled.
const PLACEHOLDER_MARKERS: &[&str] = &["your_", "your-", "changeme", "example", "placeholder", "xxxx"];

const MIN_ACCESS_KEY_LEN: usize = 8;
const MIN_SECRET_KEY_LEN: usize = 16;

/// Connection settings for the remote object store. Only ever constructed
/// through [`StoreConfig::from_env`] / [`StoreConfig::from_parts`], which
/// return `None` when any required field is missing or implausible. The
/// coordinator then runs disabled for the rest of the process lifetime.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub path_prefix: String,
}

impl StoreConfig {
    pub fn from_env() -> Option<Self> {
        let config = Self::from_parts(
            env::var(ENV_ACCESS_KEY_ID).ok(),
            env::var(ENV_SECRET_ACCESS_KEY).ok(),
            env::var(ENV_BUCKET_NAME).ok(),
            env::var(ENV_ENDPOINT).ok(),
            env::var(ENV_REGION).ok(),
            env::var(ENV_BACKUP_PATH).ok(),
        );
        if config.is_none() {
            warn!(
                "store credentials missing or implausible ({}, {}, {}, {}); backups are disabled for this process",
                ENV_ACCESS_KEY_ID, ENV_SECRET_ACCESS_KEY, ENV_BUCKET_NAME, ENV_ENDPOINT
            );
        }
        config
    }

    pub fn from_parts(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        bucket_name: Option<String>,
        endpoint_url: Option<String>,
        region: Option<String>,
        path_prefix: Option<String>,
    ) -> Option<Self> {
        let access_key_id = access_key_id.filter(|s| plausible_credential(s, MIN_ACCESS_KEY_LEN))?;
        let secret_access_key =
            secret_access_key.filter(|s| plausible_credential(s, MIN_SECRET_KEY_LEN))?;
        let bucket_name = bucket_name.filter(|s| !s.trim().is_empty())?;
        let endpoint_url = endpoint_url.filter(|s| plausible_endpoint(s))?;

        let region = region
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let path_prefix = normalize_prefix(path_prefix);

        Some(StoreConfig {
            endpoint_url,
            region,
            access_key_id,
            secret_access_key,
            bucket_name,
            path_prefix,
        })
    }
}

fn plausible_credential(value: &str, min_len: usize) -> bool {
    let trimmed = value.trim();
    if trimmed.len() < min_len {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    !PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m))
}

fn plausible_endpoint(value: &str) -> bool {
    match Url::parse(value.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Object keys are always `prefix + id`; an empty prefix is allowed but a
/// non-empty one must end in `/` so listing stays scoped to the folder.
fn normalize_prefix(prefix: Option<String>) -> String {
    let mut prefix = prefix
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BACKUP_PATH.to_string());
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

/// Local path of the database file that gets snapshotted and restored.
pub fn database_path() -> PathBuf {
    env::var(ENV_DATABASE_FILE_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE_FILE))
}

/// Retention window in days. Re-read from the environment on every sweep so
/// a changed value applies without rebuilding the coordinator.
pub fn retention_days() -> i64 {
    env::var(ENV_RETENTION_DAYS)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|days| *days >= 0)
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

pub fn periodic_enabled() -> bool {
    env::var(ENV_PERIODIC_ENABLED)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

pub fn periodic_interval_hours() -> u64 {
    env::var(ENV_PERIODIC_INTERVAL_HOURS)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|hours| *hours > 0)
        .unwrap_or(DEFAULT_PERIODIC_INTERVAL_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_parts() -> (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    ) {
        (
            Some("AKIAIOSFODNN7".to_string()),
            Some("wJalrXUtnFEMI/K7MDENG/bPxRfiCY".to_string()),
            Some("app-backups".to_string()),
            Some("https://nyc3.digitaloceanspaces.com".to_string()),
            Some("nyc3".to_string()),
            Some("backups".to_string()),
        )
    }

    #[test]
    fn test_from_parts_complete() {
        let (ak, sk, bucket, endpoint, region, prefix) = full_parts();
        let config = StoreConfig::from_parts(ak, sk, bucket, endpoint, region, prefix)
            .expect("complete config should validate");
        assert_eq!(config.region, "nyc3");
        assert_eq!(config.path_prefix, "backups/");
    }

    #[test]
    fn test_from_parts_missing_required_field_disables() {
        let (ak, sk, bucket, _, region, prefix) = full_parts();
        assert!(StoreConfig::from_parts(ak, sk, bucket, None, region, prefix).is_none());

        let (_, sk, bucket, endpoint, region, prefix) = full_parts();
        assert!(StoreConfig::from_parts(None, sk, bucket, endpoint, region, prefix).is_none());
    }

    #[test]
    fn test_from_parts_rejects_placeholder_credentials() {
        let (_, sk, bucket, endpoint, region, prefix) = full_parts();
        let result = StoreConfig::from_parts(
            Some("your-access-key-id".to_string()),
            sk,
            bucket,
            endpoint,
            region,
            prefix,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_from_parts_rejects_short_secret() {
        let (ak, _, bucket, endpoint, region, prefix) = full_parts();
        let result =
            StoreConfig::from_parts(ak, Some("short".to_string()), bucket, endpoint, region, prefix);
        assert!(result.is_none());
    }

    #[test]
    fn test_from_parts_rejects_malformed_endpoint() {
        let (ak, sk, bucket, _, region, prefix) = full_parts();
        let result = StoreConfig::from_parts(
            ak,
            sk,
            bucket,
            Some("not a url".to_string()),
            region,
            prefix,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_from_parts_defaults_region_and_prefix() {
        let (ak, sk, bucket, endpoint, _, _) = full_parts();
        let config = StoreConfig::from_parts(ak, sk, bucket, endpoint, None, None).unwrap();
        assert_eq!(config.region, "auto");
        assert_eq!(config.path_prefix, "backups/");
    }

    #[test]
    fn test_normalize_prefix_appends_slash() {
        assert_eq!(normalize_prefix(Some("snapshots".to_string())), "snapshots/");
        assert_eq!(normalize_prefix(Some("snapshots/".to_string())), "snapshots/");
        assert_eq!(normalize_prefix(None), "backups/");
    }
}
