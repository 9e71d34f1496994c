// backuptool/src/restore/mod.rs
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::{self, BackupRecord};
use crate::errors::{CoordinatorError, Result};
use crate::store::StoreClient;

/// Advisory status tag on the record returned by a successful restore.
pub const STATUS_LATEST_RESTORED: &str = "latest_restored";

/// How many recent snapshots the decision engine considers.
const CANDIDATE_LIMIT: usize = 10;

/// Outcome of comparing local state against the newest snapshot. The three
/// restoring states and `LocalNewer` are mutually exclusive and exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestoreDecision {
    /// No local database file; always restore.
    NoLocal,
    /// Caller forced the restore regardless of timestamps.
    Forced,
    /// Snapshot is at least as new as the local file; restore.
    RemoteNewer,
    /// Local file is strictly newer; leave it alone.
    LocalNewer,
}

impl RestoreDecision {
    pub(crate) fn should_restore(&self) -> bool {
        !matches!(self, RestoreDecision::LocalNewer)
    }
}

/// The correctness-sensitive comparison: never clobber a local database that
/// is strictly newer than the snapshot, but restore automatically onto a
/// fresh instance with no local state.
pub(crate) fn decide(
    local_mtime: Option<DateTime<Utc>>,
    snapshot_created_at: DateTime<Utc>,
    force: bool,
) -> RestoreDecision {
    let Some(local_mtime) = local_mtime else {
        return RestoreDecision::NoLocal;
    };
    if force {
        return RestoreDecision::Forced;
    }
    if local_mtime > snapshot_created_at {
        RestoreDecision::LocalNewer
    } else {
        RestoreDecision::RemoteNewer
    }
}

/// Restores the newest catalogued snapshot over the local database file.
///
/// Returns `Ok(None)` when there is nothing to restore: an empty catalog, an
/// unreachable catalog, or a local file newer than every snapshot. A failed
/// download is a hard error and leaves the local file untouched: the
/// payload lands in a temporary sibling file and is only renamed over the
/// target once fully written.
pub async fn restore_latest(
    store: &StoreClient,
    database_path: &Path,
    force: bool,
) -> Result<Option<BackupRecord>> {
    let candidates = match catalog::list_backups(store, CANDIDATE_LIMIT).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %format!("{:#}", e), "catalog unavailable; treating as nothing to restore");
            return Ok(None);
        }
    };

    let Some(mut candidate) = candidates.into_iter().next() else {
        info!("no snapshots in catalog; nothing to restore");
        return Ok(None);
    };

    let local_mtime = local_mtime(database_path).await;
    let decision = decide(local_mtime, candidate.created_at, force);
    if !decision.should_restore() {
        info!(
            id = %candidate.id,
            ?local_mtime,
            snapshot_created_at = %candidate.created_at,
            "local database is newer than latest snapshot; skipping restore"
        );
        return Ok(None);
    }

    info!(id = %candidate.id, ?decision, "restoring snapshot");
    download_over(store, &candidate.id, database_path).await?;

    candidate.status = Some(STATUS_LATEST_RESTORED.to_string());
    info!(id = %candidate.id, "restore complete");
    Ok(Some(candidate))
}

async fn local_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Downloads the snapshot into a temp file next to the target, then renames
/// it into place so a failed download never leaves a half-written database.
async fn download_over(store: &StoreClient, id: &str, database_path: &Path) -> Result<()> {
    let parent = database_path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp = tempfile::Builder::new()
        .prefix(".restore-")
        .tempfile_in(parent.unwrap_or_else(|| Path::new(".")))?;
    let temp_path = temp.into_temp_path();

    store
        .download_to(&store.key_for(id), &temp_path)
        .await
        .map_err(|e| CoordinatorError::Storage(format!("{:#}", e)))?;

    temp_path
        .persist(database_path)
        .map_err(|e| CoordinatorError::Io(e.error))?;
    Ok(())
}
