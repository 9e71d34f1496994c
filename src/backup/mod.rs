// backuptool/src/backup/mod.rs
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::{
    BackupKind, BackupRecord, META_CREATED_AT, META_PROVENANCE, META_SCHEMA_VERSION,
    META_SIZE_BYTES, SNAPSHOT_EXTENSION,
};
use crate::errors::{CoordinatorError, Result};
use crate::store::StoreClient;
use crate::utils::schema;

/// Application tag every snapshot id starts with.
const ID_PREFIX: &str = "app";

/// Snapshot id for a provenance + creation instant. Truncates to whole
/// seconds and strips colons, which are unsafe in object keys. The id is a
/// pure function of its inputs: a second backup within the same wall-clock
/// second reuses the key and the store's put overwrites the first.
pub fn backup_id(kind: BackupKind, created_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}{}",
        ID_PREFIX,
        kind.as_str(),
        created_at.format("%Y-%m-%dT%H%M%SZ"),
        SNAPSHOT_EXTENSION
    )
}

/// Streams the database file to the store as a new snapshot.
///
/// The schema version stamp is best-effort: a failure to read it is logged
/// and replaced with the default sentinel, never failing the backup. Any
/// store or file error aborts the whole operation; a partial upload is
/// orphaned data under a timestamped key and gets picked up by a later
/// retention sweep.
pub async fn create_backup(
    store: &StoreClient,
    database_path: &Path,
    kind: BackupKind,
) -> Result<BackupRecord> {
    if !database_path.exists() {
        return Err(CoordinatorError::DatabaseMissing(database_path.to_path_buf()));
    }

    let created_at = Utc::now();
    let id = backup_id(kind, created_at);
    let size_bytes = tokio::fs::metadata(database_path).await?.len();

    let schema_version = match schema::current_version(database_path).await {
        Ok(version) => version,
        Err(e) => {
            warn!(error = %e, "could not read schema version; stamping default");
            schema::DEFAULT_SCHEMA_VERSION.to_string()
        }
    };

    let metadata = HashMap::from([
        (META_PROVENANCE.to_string(), kind.as_str().to_string()),
        (
            META_CREATED_AT.to_string(),
            created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (META_SIZE_BYTES.to_string(), size_bytes.to_string()),
        (META_SCHEMA_VERSION.to_string(), schema_version.clone()),
    ]);

    store
        .put_file(&store.key_for(&id), database_path, metadata)
        .await
        .map_err(|e| CoordinatorError::Storage(format!("{:#}", e)))?;

    info!(id = %id, kind = kind.as_str(), size_bytes, "snapshot uploaded");

    Ok(BackupRecord {
        id,
        kind,
        created_at,
        size_bytes,
        schema_version,
        status: None,
    })
}
