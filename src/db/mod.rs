//! SQLite-backed contact store.
//!
//! The database lives at `~/.identify/identify.db` unless the config names another
//! path. It holds the `contacts` table and nothing else; every identify request runs
//! its reads and writes inside one `BEGIN IMMEDIATE` transaction (see
//! [`ContactDb::with_transaction`]).

use std::path::{Path, PathBuf};

use rusqlite::Connection;

pub mod types;
pub use types::*;

pub mod contacts;

pub struct ContactDb {
    conn: Connection,
}

impl ContactDb {
    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err or if the closure panics.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock before the first read, so two
    /// writers can never both see the same pre-insert state.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        let guard = RollbackGuard {
            conn: &self.conn,
            armed: true,
        };
        let val = f(self)?;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        guard.disarm();
        Ok(val)
    }

    /// Open (or create) the database at the configured path, falling back to
    /// `~/.identify/identify.db`, and apply the schema.
    pub fn open(path: Option<&Path>) -> Result<Self, DbError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        // WAL lets readers proceed while a request holds the write lock
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        log::info!("Contact store opened at {}", path.display());
        Ok(Self { conn })
    }

    /// Open a private in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.identify/identify.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".identify").join("identify.db"))
    }
}

/// Rolls back the open transaction unless disarmed after a successful commit.
struct RollbackGuard<'a> {
    conn: &'a Connection,
    armed: bool,
}

impl RollbackGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
            log::warn!("Rollback failed: {rollback_err}");
        }
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::ContactDb;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    /// Test temp dirs are cleaned up by the OS.
    pub fn test_db() -> ContactDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        ContactDb::open_at(path).expect("Failed to open test database")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_open_creates_contacts_table() {
        let db = test_db();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))
            .expect("contacts table should exist");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_at_creates_parent_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("deeper").join("identify.db");
        let _db = ContactDb::open_at(path.clone()).expect("open nested path");
        assert!(path.exists());
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = test_db();
        let created = db
            .with_transaction(|tx| tx.insert_contact(&NewContact::primary(Some("a@x.io"), None)))
            .expect("commit");
        assert!(db.get_contact(created.id).unwrap().is_some());
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            tx.insert_contact(&NewContact::primary(Some("a@x.io"), None))?;
            Err(DbError::InvalidRow("forced".to_string()))
        });
        assert!(result.is_err());
        assert!(db.list_contacts().unwrap().is_empty());
    }

    #[test]
    fn test_panic_inside_transaction_rolls_back() {
        let db = test_db();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), DbError> = db.with_transaction(|tx| {
                tx.insert_contact(&NewContact::primary(Some("a@x.io"), None))?;
                panic!("closure failed mid-transaction");
            });
        }));
        assert!(outcome.is_err());
        assert!(db.list_contacts().unwrap().is_empty());

        // Connection is usable for the next transaction
        let created = db
            .with_transaction(|tx| tx.insert_contact(&NewContact::primary(Some("b@x.io"), None)))
            .expect("second transaction");
        let ids: Vec<i64> = db.list_contacts().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![created.id]);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("identify.db");
        {
            let db = ContactDb::open_at(path.clone()).expect("first open");
            db.insert_contact(&NewContact::primary(None, Some("123")))
                .expect("insert");
        }
        let db = ContactDb::open_at(path).expect("second open");
        assert_eq!(db.list_contacts().unwrap().len(), 1);
    }
}
