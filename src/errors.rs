use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the coordinator's public operations.
///
/// `Disabled` and `DatabaseMissing` are terminal for the operation and are
/// never retried. Store failures carry the rendered SDK error; connection
/// diagnosis happens in the health prober, not here.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("backup storage is not configured; coordinator is disabled")]
    Disabled,

    #[error("database file not found at {0}")]
    DatabaseMissing(PathBuf),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
