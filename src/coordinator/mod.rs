// backuptool/src/coordinator/mod.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;

use crate::backup;
use crate::catalog::{self, BackupKind, BackupRecord};
use crate::config::{self, StoreConfig};
use crate::errors::{CoordinatorError, Result};
use crate::health;
use crate::restore;
use crate::retention;
use crate::store::StoreClient;

const STATUS_LIST_LIMIT: usize = 5;

/// Aggregated operational state, safe to render to an operator. Built
/// best-effort; internal failures degrade fields instead of erroring.
#[derive(Debug, Serialize)]
pub struct CoordinatorStatus {
    pub enabled: bool,
    pub connection_healthy: bool,
    pub backup_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_at: Option<DateTime<Utc>>,
    pub periodic_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periodic_interval_hours: Option<u64>,
}

/// Facade over the backup subsystem: six operations, a disabled gate, and a
/// maintenance lock serializing restore against cleanup so a restore can
/// never race a retention delete of its own candidate.
pub struct BackupCoordinator {
    database_path: PathBuf,
    store: Option<StoreClient>,
    maintenance: Mutex<()>,
}

impl BackupCoordinator {
    /// Builds the coordinator from the environment. Invalid or missing store
    /// credentials yield a permanently disabled instance; picking up
    /// corrected configuration requires a new process.
    pub async fn from_env() -> Self {
        let store = match StoreConfig::from_env() {
            Some(store_config) => Some(StoreClient::connect(&store_config).await),
            None => None,
        };
        Self::new(store, config::database_path())
    }

    pub fn new(store: Option<StoreClient>, database_path: PathBuf) -> Self {
        BackupCoordinator {
            database_path,
            store,
            maintenance: Mutex::new(()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&StoreClient> {
        self.store.as_ref().ok_or(CoordinatorError::Disabled)
    }

    pub async fn create_backup(&self, kind: BackupKind) -> Result<BackupRecord> {
        backup::create_backup(self.store()?, &self.database_path, kind).await
    }

    pub async fn restore_latest(&self, force: bool) -> Result<Option<BackupRecord>> {
        let store = self.store()?;
        let _guard = self.maintenance.lock().await;
        restore::restore_latest(store, &self.database_path, force).await
    }

    pub async fn list_backups(&self, limit: usize) -> Result<Vec<BackupRecord>> {
        catalog::list_backups(self.store()?, limit)
            .await
            .map_err(|e| CoordinatorError::Storage(format!("{:#}", e)))
    }

    pub async fn cleanup(&self) -> Result<()> {
        let store = self.store()?;
        let _guard = self.maintenance.lock().await;
        retention::cleanup(store).await
    }

    /// Never fails; `false` covers both a disabled coordinator and a store
    /// that stayed unreachable through the prober's retries.
    pub async fn test_connection(&self) -> bool {
        match &self.store {
            Some(store) => health::test_connection(store).await,
            None => false,
        }
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let periodic_enabled = config::periodic_enabled();
        let periodic_interval_hours = periodic_enabled.then(config::periodic_interval_hours);

        if !self.is_enabled() {
            return CoordinatorStatus {
                enabled: false,
                connection_healthy: false,
                backup_count: 0,
                last_backup_at: None,
                periodic_enabled,
                periodic_interval_hours,
            };
        }

        let connection_healthy = self.test_connection().await;
        let recent = match self.list_backups(STATUS_LIST_LIMIT).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "status listing failed; reporting zero backups");
                Vec::new()
            }
        };

        CoordinatorStatus {
            enabled: true,
            connection_healthy,
            backup_count: recent.len(),
            last_backup_at: recent.first().map(|record| record.created_at),
            periodic_enabled,
            periodic_interval_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled() -> BackupCoordinator {
        BackupCoordinator::new(None, PathBuf::from("/tmp/app.db"))
    }

    #[tokio::test]
    async fn test_disabled_coordinator_short_circuits_every_operation() {
        let coordinator = disabled();
        assert!(!coordinator.is_enabled());

        assert!(matches!(
            coordinator.create_backup(BackupKind::Manual).await,
            Err(CoordinatorError::Disabled)
        ));
        assert!(matches!(
            coordinator.restore_latest(false).await,
            Err(CoordinatorError::Disabled)
        ));
        assert!(matches!(
            coordinator.list_backups(10).await,
            Err(CoordinatorError::Disabled)
        ));
        assert!(matches!(
            coordinator.cleanup().await,
            Err(CoordinatorError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_disabled_coordinator_reports_unhealthy_without_probing() {
        let coordinator = disabled();
        assert!(!coordinator.test_connection().await);
    }

    #[tokio::test]
    async fn test_disabled_coordinator_status_degrades_instead_of_failing() {
        let status = disabled().status().await;
        assert!(!status.enabled);
        assert!(!status.connection_healthy);
        assert_eq!(status.backup_count, 0);
        assert!(status.last_backup_at.is_none());
    }
}
