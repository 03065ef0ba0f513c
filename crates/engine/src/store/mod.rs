//! SQLite persistence for readings, spikes and alerts
//!
//! Every call opens its own connection, so the store is cheap to clone and
//! share between tasks. Concurrency is left to SQLite (WAL mode plus a busy
//! timeout); there is no in-process write lock.

mod alerts;
mod readings;
mod spikes;
pub mod timestamp;

pub use alerts::{AlertFilter, AlertSummary};
pub use readings::WindowAggregate;
pub use spikes::SpikeFilter;

use crate::drive_info::DriveInfoLookup;
use crate::models::DriveInfo;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const SCHEMA: &str = include_str!("schema.sql");

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open temperature database {path}: {source}")]
    Open {
        source: rusqlite::Error,
        path: PathBuf,
    },
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
    #[error("unparseable timestamp {0:?}")]
    Timestamp(String),
}

impl StoreError {
    /// True when the requested alert or spike does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle to the temperature database
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    flags: OpenFlags,
}

impl Store {
    /// Open (creating if needed) the database at `path` and apply the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            StoreError::Open {
                source,
                path: self.path.clone(),
            }
        })?;
        configure_connection(&conn).map_err(|source| StoreError::Open {
            source,
            path: self.path.clone(),
        })?;
        Ok(conn)
    }

    /// Record device metadata for a drive
    pub fn upsert_drive_info(&self, hostname: &str, serial: &str, info: &DriveInfo) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO drive_info (hostname, serial, device_name, model)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (hostname, serial)
             DO UPDATE SET device_name = excluded.device_name, model = excluded.model",
            params![hostname, serial, info.device_name, info.model],
        )?;
        Ok(())
    }
}

impl DriveInfoLookup for Store {
    fn drive_info(&self, hostname: &str, serial: &str) -> anyhow::Result<Option<DriveInfo>> {
        let conn = self.conn()?;
        let info = conn
            .query_row(
                "SELECT device_name, model FROM drive_info WHERE hostname = ?1 AND serial = ?2",
                params![hostname, serial],
                |row| {
                    Ok(DriveInfo {
                        device_name: row.get(0)?,
                        model: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Map a "no rows changed" outcome to a typed not-found error
pub(crate) fn expect_changed(changed: usize, kind: &'static str, id: i64) -> Result<()> {
    if changed == 0 {
        Err(StoreError::NotFound { kind, id })
    } else {
        Ok(())
    }
}

/// Helper for tests across the crate: a store in a fresh temp directory
#[cfg(test)]
pub(crate) fn test_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("thermwatch.db")).unwrap();
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_is_idempotent() {
        let (dir, store) = test_store();
        let again = Store::open(store.path()).unwrap();
        assert_eq!(again.path(), dir.path().join("thermwatch.db"));
    }

    #[test]
    fn test_drive_info_lookup() {
        let (_dir, store) = test_store();
        assert!(store.drive_info("nas01", "SN1").unwrap().is_none());

        let info = DriveInfo {
            device_name: Some("sda".to_string()),
            model: Some("WDC WD80EFAX".to_string()),
        };
        store.upsert_drive_info("nas01", "SN1", &info).unwrap();
        assert_eq!(store.drive_info("nas01", "SN1").unwrap(), Some(info));

        let renamed = DriveInfo {
            device_name: Some("sdb".to_string()),
            model: None,
        };
        store.upsert_drive_info("nas01", "SN1", &renamed).unwrap();
        assert_eq!(store.drive_info("nas01", "SN1").unwrap(), Some(renamed));
    }

    #[test]
    fn test_open_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("db.sqlite");
        let err = Store::open(&missing).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }));
        assert!(err.to_string().contains("no-such-dir"));
    }
}
