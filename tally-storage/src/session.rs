//! Open-per-operation SQLite sessions.
//!
//! No component keeps a connection between calls. Every public operation asks
//! its [`SessionFactory`] for a fresh [`Connection`] and drops it on return,
//! which releases any transaction still open on that connection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tally_core::{StorageError, TallyConfig, TallyResult};

use crate::error::sqlite;

/// Opens connections to one store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFactory {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SessionFactory {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    /// Factory for the introspected catalog store.
    pub fn catalog(config: &TallyConfig) -> Self {
        Self::new(&config.catalog_path, config.busy_timeout())
    }

    /// Factory for the ledger store.
    pub fn ledger(config: &TallyConfig) -> Self {
        Self::new(&config.ledger_path, config.busy_timeout())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open an existing store. A missing file is an error, never an empty store.
    pub fn open(&self) -> TallyResult<Connection> {
        self.open_with(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)
    }

    /// Open the store, creating the file if it does not exist yet.
    pub fn open_or_create(&self) -> TallyResult<Connection> {
        self.open_with(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with(&self, flags: OpenFlags) -> TallyResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, flags).map_err(|e| {
            StorageError::Open {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        // Timeouts apply only while acquiring the store's locks.
        conn.busy_timeout(self.busy_timeout).map_err(sqlite)?;
        tracing::trace!(path = %self.path.display(), "session opened");
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::TallyError;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_store_fails() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let sessions = SessionFactory::new(dir.path().join("absent.db"), Duration::from_millis(50));

        let err = sessions.open().unwrap_err();
        assert!(matches!(err, TallyError::Storage(StorageError::Open { .. })));
        assert!(!sessions.path().exists());
    }

    #[test]
    fn test_open_or_create_creates_file() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let sessions = SessionFactory::new(dir.path().join("new.db"), Duration::from_millis(50));

        let conn = sessions.open_or_create().expect("store should be created");
        conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        drop(conn);

        assert!(sessions.path().exists());
        assert!(sessions.open().is_ok());
    }

    #[test]
    fn test_factories_from_config() {
        let config = TallyConfig::default();
        assert_eq!(SessionFactory::catalog(&config).path(), Path::new("library.db"));
        assert_eq!(SessionFactory::ledger(&config).path(), Path::new("finance.db"));
    }
}
