//! SQLite persistence for linked accounts, the dedup ledger, and the
//! summary cache.
//!
//! A single `rusqlite::Connection` serves the whole process, shared
//! behind `Arc<Mutex<..>>`; poll tasks for different accounts contend
//! only briefly on marker writes and ledger filters. Repositories are
//! free functions over the `Database` handle, and migrations run
//! whenever a database is opened.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod account_repo;
pub mod cache_repo;
pub mod error;
pub mod ledger_repo;
pub mod migrations;

pub use error::DatabaseError;

/// Shared handle to the process-wide SQLite connection. Cloning is
/// cheap; every clone points at the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file, applying pending
    /// migrations. Missing parent directories are created.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        // WAL keeps ledger reads cheap while another task writes markers.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        log::info!("Database opened at {}", path.display());
        Self::from_connection(conn)
    }

    /// Opens a migrated in-memory database for tests.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// Returns the canonical database path: `~/.sparrow/data/sparrow.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".sparrow").join("data").join("sparrow.db"))
}

#[cfg(test)]
mod tests {
    use super::account_repo::{self, AccountRow};
    use super::*;

    fn sample_account() -> AccountRow {
        AccountRow {
            chat_id: 1,
            mailbox: "a@gmail.com".to_string(),
            privacy: false,
            label: None,
            linked_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_open_in_memory_is_migrated() {
        let db = Database::open_in_memory().unwrap();
        // The repositories only work once migrations have created
        // their tables.
        assert!(account_repo::list_all(&db).unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("sparrow.db");

        let db = Database::open(&path).unwrap();
        assert!(account_repo::insert(&db, &sample_account()).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_clones_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        let clone = db.clone();

        account_repo::insert(&db, &sample_account()).unwrap();
        let accounts = account_repo::list_all(&clone).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].mailbox, "a@gmail.com");
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with(".sparrow/data/sparrow.db"));
    }
}
