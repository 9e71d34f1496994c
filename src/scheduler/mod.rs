// backuptool/src/scheduler/mod.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::catalog::BackupKind;
use crate::config;
use crate::coordinator::BackupCoordinator;

/// Owns the process's single recurring backup timer. The handle is an
/// explicit field, not process-global state, so coordinator instances in
/// tests stay independent.
pub struct BackupScheduler {
    handle: Option<JoinHandle<()>>,
}

impl BackupScheduler {
    pub fn new() -> Self {
        BackupScheduler { handle: None }
    }

    /// Registers the periodic timer. No-op when a timer is already running,
    /// when the coordinator is disabled, or when periodic backups are not
    /// enabled by configuration.
    pub fn start(&mut self, coordinator: Arc<BackupCoordinator>) {
        if self.handle.is_some() {
            warn!("periodic backup timer already running; start ignored");
            return;
        }
        if !coordinator.is_enabled() {
            info!("coordinator disabled; periodic backups not scheduled");
            return;
        }
        if !config::periodic_enabled() {
            info!("periodic backups not enabled by configuration");
            return;
        }

        let interval_hours = config::periodic_interval_hours();
        let period = Duration::from_millis(interval_hours * 60 * 60 * 1000);

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // interval() yields immediately; swallow that tick so the first
            // cycle runs one full period from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                info!("periodic backup cycle starting");
                // A failed cycle must never cancel the timer itself.
                if let Err(e) = coordinator.create_backup(BackupKind::Periodic).await {
                    warn!(error = %e, "periodic backup failed");
                }
                if let Err(e) = coordinator.cleanup().await {
                    warn!(error = %e, "retention sweep failed");
                }
            }
        }));
        info!(interval_hours, "periodic backup timer started");
    }

    /// Cancels the timer if present; idempotent. Does not interrupt a backup
    /// cycle already in flight.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("periodic backup timer stopped");
        }
    }
}

impl Default for BackupScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn disabled_coordinator() -> Arc<BackupCoordinator> {
        Arc::new(BackupCoordinator::new(None, PathBuf::from("/tmp/app.db")))
    }

    #[tokio::test]
    async fn test_start_on_disabled_coordinator_registers_nothing() {
        let mut scheduler = BackupScheduler::new();
        scheduler.start(disabled_coordinator());
        assert!(scheduler.handle.is_none());
    }

    #[tokio::test]
    async fn test_start_twice_keeps_single_timer() {
        let mut scheduler = BackupScheduler::new();
        // Stand-in for a live timer; the guard must fire before any other check.
        scheduler.handle = Some(tokio::spawn(async {}));
        scheduler.start(disabled_coordinator());
        assert!(scheduler.handle.is_some());
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut scheduler = BackupScheduler::new();
        scheduler.stop();
        scheduler.stop();
        assert!(scheduler.handle.is_none());
    }
}
