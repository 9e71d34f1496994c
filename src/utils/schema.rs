// backuptool/src/utils/schema.rs
//
// Best-effort schema-version probe. The migration runner stamps its version
// into the SQLite `user_version` header field (4 bytes big-endian at offset
// 60); reading it straight from the file header avoids opening a database
// connection while a snapshot is in flight.
use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Stamped onto a snapshot when the version cannot be determined.
pub const DEFAULT_SCHEMA_VERSION: &str = "unknown";

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";
const HEADER_LEN: usize = 64;
const USER_VERSION_OFFSET: usize = 60;

/// Reads the migration version stamped into the database file header.
pub async fn current_version(database_path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(database_path)
        .await
        .with_context(|| format!("Failed to open database file {}", database_path.display()))?;

    let mut header = [0u8; HEADER_LEN];
    file.read_exact(&mut header)
        .await
        .with_context(|| format!("Failed to read header of {}", database_path.display()))?;

    if &header[..SQLITE_MAGIC.len()] != SQLITE_MAGIC {
        anyhow::bail!(
            "{} does not look like a SQLite database",
            database_path.display()
        );
    }

    let version = u32::from_be_bytes([
        header[USER_VERSION_OFFSET],
        header[USER_VERSION_OFFSET + 1],
        header[USER_VERSION_OFFSET + 2],
        header[USER_VERSION_OFFSET + 3],
    ]);
    Ok(version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fake_sqlite_file(user_version: u32) -> NamedTempFile {
        let mut header = vec![0u8; 100];
        header[..SQLITE_MAGIC.len()].copy_from_slice(SQLITE_MAGIC);
        header[USER_VERSION_OFFSET..USER_VERSION_OFFSET + 4]
            .copy_from_slice(&user_version.to_be_bytes());

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&header).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_reads_user_version_from_header() {
        let file = fake_sqlite_file(42);
        let version = current_version(file.path()).await.unwrap();
        assert_eq!(version, "42");
    }

    #[tokio::test]
    async fn test_rejects_non_sqlite_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        file.flush().unwrap();
        assert!(current_version(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let result = current_version(Path::new("/nonexistent/app.db")).await;
        assert!(result.is_err());
    }
}
