// backuptool/src/retention/mod.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::catalog;
use crate::config;
use crate::errors::{CoordinatorError, Result};
use crate::store::{ObjectInfo, StoreClient};

/// Snapshots strictly older than the cutoff instant.
pub(crate) fn select_expired<'a>(
    infos: &'a [ObjectInfo],
    cutoff: DateTime<Utc>,
) -> Vec<&'a ObjectInfo> {
    infos
        .iter()
        .filter(|info| info.last_modified < cutoff)
        .collect()
}

/// Deletes every snapshot older than the configured retention window.
///
/// Per-item failures are logged and skipped; one undeletable object must not
/// block routine maintenance. Only a failure to list the catalog at all
/// fails the sweep.
pub async fn cleanup(store: &StoreClient) -> Result<()> {
    let retention_days = config::retention_days();
    let cutoff = Utc::now() - Duration::days(retention_days);

    let infos = catalog::list_snapshot_infos(store)
        .await
        .map_err(|e| CoordinatorError::Storage(format!("{:#}", e)))?;
    let expired = select_expired(&infos, cutoff);

    if expired.is_empty() {
        info!(retention_days, total = infos.len(), "retention sweep: nothing to delete");
        return Ok(());
    }

    let mut removed = 0usize;
    let mut failed = 0usize;
    for info in expired {
        match store.delete(&info.key).await {
            Ok(()) => {
                info!(key = %info.key, created_at = %info.last_modified, "expired snapshot deleted");
                removed += 1;
            }
            Err(e) => {
                warn!(key = %info.key, error = %format!("{:#}", e), "failed to delete expired snapshot; continuing");
                failed += 1;
            }
        }
    }

    info!(retention_days, removed, failed, "retention sweep finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(key: &str, when: DateTime<Utc>) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size_bytes: 1,
            last_modified: when,
        }
    }

    #[test]
    fn test_only_snapshots_older_than_cutoff_are_selected() {
        // retention 30 days against "now" = 2024-02-01
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let cutoff = now - Duration::days(30);

        let infos = vec![
            info("backups/old.db", Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap()),
            info("backups/recent.db", Utc.with_ymd_and_hms(2024, 1, 25, 0, 0, 0).unwrap()),
        ];

        let expired = select_expired(&infos, cutoff);
        let keys: Vec<&str> = expired.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["backups/old.db"]);
    }

    #[test]
    fn test_snapshot_exactly_at_cutoff_is_kept() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let infos = vec![info("backups/boundary.db", cutoff)];
        assert!(select_expired(&infos, cutoff).is_empty());
    }

    #[test]
    fn test_empty_catalog_selects_nothing() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert!(select_expired(&[], cutoff).is_empty());
    }
}
