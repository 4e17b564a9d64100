//! SQLite handle shared by the favorites, tag and daily-image stores

use crate::error::StoreError;
use crate::paths::get_db_path;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cheaply cloneable handle onto one on-device database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database at the default app data location
    pub fn open() -> Result<Self, StoreError> {
        let db_path = get_db_path().map_err(StoreError::Path)?;
        Self::open_at(&db_path)
    }

    /// Opens or creates the database at `db_path`, creating tables if needed
    pub fn open_at(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        log::info!("[db] opened {}", db_path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS favorites (
                id TEXT PRIMARY KEY NOT NULL,
                record TEXT NOT NULL,
                favorited_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS key_value (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// Reads a raw value from the key-value table
    pub fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM key_value WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Writes several keys in one transaction
    pub fn set_values(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO key_value (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn remove_values(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute("DELETE FROM key_value WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(())
    }
}
