// backuptool/src/catalog/mod.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::store::{ObjectInfo, StoreClient};
use crate::utils::schema::DEFAULT_SCHEMA_VERSION;

/// Snapshot objects carry this extension; anything else under the prefix is
/// ignored by the catalog.
pub const SNAPSHOT_EXTENSION: &str = ".db";

/// Generous cap for a full catalog listing (retention sweeps, admin listing).
pub const MAX_CATALOG_KEYS: i32 = 1000;

pub const META_PROVENANCE: &str = "provenance";
pub const META_CREATED_AT: &str = "created-at";
pub const META_SIZE_BYTES: &str = "size-bytes";
pub const META_SCHEMA_VERSION: &str = "schema-version";

/// Why a snapshot was taken. Stamped into both the object key and the object
/// metadata at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Shutdown,
    Manual,
    Periodic,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Shutdown => "shutdown",
            BackupKind::Manual => "manual",
            BackupKind::Periodic => "periodic",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "shutdown" => Some(BackupKind::Shutdown),
            "manual" => Some(BackupKind::Manual),
            "periodic" => Some(BackupKind::Periodic),
            _ => None,
        }
    }

    /// Heuristic recovery from an object key. Keys we did not write, or
    /// whose marker is unrecognized, default to `Manual` rather than erroring.
    pub fn from_key(key: &str) -> Self {
        if key.contains("-shutdown-") {
            BackupKind::Shutdown
        } else if key.contains("-periodic-") {
            BackupKind::Periodic
        } else {
            BackupKind::Manual
        }
    }
}

/// One snapshot resident in the remote store. The store itself is the only
/// catalog; there is no local index.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub id: String,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub schema_version: String,
    /// Advisory only; set to `latest_restored` on the record returned by a
    /// successful restore, never persisted remotely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Builds a record from a listed object, or `None` for objects that are not
/// snapshots (wrong extension, or a key outside the configured prefix layout).
pub(crate) fn record_from_info(info: &ObjectInfo, prefix: &str) -> Option<BackupRecord> {
    if !info.key.ends_with(SNAPSHOT_EXTENSION) {
        return None;
    }
    let id = info.key.strip_prefix(prefix).unwrap_or(&info.key).to_string();
    if id.is_empty() {
        return None;
    }
    Some(BackupRecord {
        kind: BackupKind::from_key(&id),
        id,
        created_at: info.last_modified,
        size_bytes: info.size_bytes,
        schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
        status: None,
    })
}

pub(crate) fn sort_newest_first(records: &mut [BackupRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Lists the `limit` most recent snapshots, newest first.
///
/// Provenance and schema version are taken from object metadata when the
/// store still has it (authoritative, written at upload time); the key
/// substring heuristic is only the fallback. `created_at` always comes from
/// the remote last-modified timestamp.
pub async fn list_backups(store: &StoreClient, limit: usize) -> Result<Vec<BackupRecord>> {
    let infos = list_snapshot_infos(store).await?;

    let mut records: Vec<BackupRecord> = infos
        .iter()
        .filter_map(|info| record_from_info(info, store.prefix()))
        .collect();
    sort_newest_first(&mut records);
    records.truncate(limit);

    for record in &mut records {
        match store.head_metadata(&store.key_for(&record.id)).await {
            Ok(Some(metadata)) => {
                if let Some(kind) = metadata
                    .get(META_PROVENANCE)
                    .and_then(|label| BackupKind::from_label(label))
                {
                    record.kind = kind;
                }
                if let Some(version) = metadata.get(META_SCHEMA_VERSION) {
                    record.schema_version = version.clone();
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Metadata is an enrichment; the heuristic record stands.
                warn!(id = %record.id, error = %e, "could not read snapshot metadata");
            }
        }
    }

    Ok(records)
}

/// Raw listing of snapshot objects (extension-filtered, unsorted), for
/// callers that only need keys and timestamps, like the retention sweeper.
pub async fn list_snapshot_infos(store: &StoreClient) -> Result<Vec<ObjectInfo>> {
    let infos = store.list(MAX_CATALOG_KEYS).await?;
    Ok(infos
        .into_iter()
        .filter(|info| info.key.ends_with(SNAPSHOT_EXTENSION))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(key: &str, secs: i64) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size_bytes: 1024,
            last_modified: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_kind_from_key_markers() {
        assert_eq!(
            BackupKind::from_key("app-shutdown-2024-01-01T000000Z.db"),
            BackupKind::Shutdown
        );
        assert_eq!(
            BackupKind::from_key("app-periodic-2024-01-01T000000Z.db"),
            BackupKind::Periodic
        );
        assert_eq!(
            BackupKind::from_key("app-manual-2024-01-01T000000Z.db"),
            BackupKind::Manual
        );
    }

    #[test]
    fn test_kind_from_key_defaults_to_manual_on_unexpected_keys() {
        assert_eq!(BackupKind::from_key("legacy-snapshot.db"), BackupKind::Manual);
        assert_eq!(BackupKind::from_key(""), BackupKind::Manual);
        assert_eq!(BackupKind::from_key("app--weird--name.db"), BackupKind::Manual);
    }

    #[test]
    fn test_record_from_info_strips_prefix_and_filters_extension() {
        let record = record_from_info(
            &info("backups/app-periodic-2024-01-01T000000Z.db", 1_704_067_200),
            "backups/",
        )
        .unwrap();
        assert_eq!(record.id, "app-periodic-2024-01-01T000000Z.db");
        assert_eq!(record.kind, BackupKind::Periodic);
        assert_eq!(record.size_bytes, 1024);

        assert!(record_from_info(&info("backups/notes.txt", 0), "backups/").is_none());
        assert!(record_from_info(&info("backups/", 0), "backups/").is_none());
    }

    #[test]
    fn test_sort_newest_first() {
        let mut records: Vec<BackupRecord> = [
            ("backups/a.db", 100),
            ("backups/b.db", 300),
            ("backups/c.db", 200),
        ]
        .iter()
        .map(|(key, secs)| record_from_info(&info(key, *secs), "backups/").unwrap())
        .collect();

        sort_newest_first(&mut records);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b.db", "c.db", "a.db"]);
    }
}
