/*!
 * SQLite-backed key/value store.
 *
 * This module handles database creation, schema initialization and
 * thread-safe access to a single `kv_store` table.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{entry_size, KeyValueStore};
use crate::errors::StorageError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Default database filename
const DEFAULT_DB_FILENAME: &str = "cache.db";

/// Default database directory name under user's data directory
const DEFAULT_DB_DIRNAME: &str = "lazydub";

/// Key/value store persisted in a SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    /// Path to the database file
    db_path: PathBuf,
    /// Thread-safe connection
    connection: Arc<Mutex<Connection>>,
    /// Optional capacity in bytes
    max_bytes: Option<u64>,
}

impl SqliteStore {
    /// Open the store at the default location
    pub fn new_default() -> Result<Self, StorageError> {
        let db_path = Self::default_database_path()?;
        Self::new(&db_path)
    }

    /// Open (or create) the store at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Backend(format!("Failed to create database directory {:?}: {}", parent, e))
            })?;
        }

        info!("Opening cache database at: {:?}", db_path);

        let conn = Connection::open(&db_path)?;
        initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
            max_bytes: None,
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, StorageError> {
        debug!("Creating in-memory cache database");

        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(conn)),
            max_bytes: None,
        })
    }

    /// Limit the total size of stored keys and values
    pub fn with_capacity(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Get the default database path
    pub fn default_database_path() -> Result<PathBuf, StorageError> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| StorageError::Backend("Could not determine data directory".to_string()))?;

        Ok(base_dir.join(DEFAULT_DB_DIRNAME).join(DEFAULT_DB_FILENAME))
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run an operation with the locked connection
    fn execute<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.connection.lock();
        f(&conn)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.execute(|conn| {
            let value = conn
                .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let max_bytes = self.max_bytes;
        self.execute(|conn| {
            if let Some(max_bytes) = max_bytes {
                let used: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                     FROM kv_store WHERE key != ?1",
                    [key],
                    |row| row.get(0),
                )?;
                let needed = entry_size(key, value);
                let available = max_bytes.saturating_sub(used.max(0) as u64);
                if needed > available {
                    return Err(StorageError::QuotaExceeded { needed, available });
                }
            }

            conn.execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.execute(|conn| {
            let deleted = conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
            Ok(deleted > 0)
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix_len = prefix.chars().count() as i64;
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv_store WHERE substr(key, 1, ?2) = ?1 ORDER BY key")?;
            let keys = stmt
                .query_map(params![prefix, prefix_len], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }
}

/// Initialize the database schema
fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing cache schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
            [SCHEMA_VERSION],
        )?;
    } else {
        debug!("Cache schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32, StorageError> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<(), StorageError> {
    // WAL keeps readers unblocked while the background job writes
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    Ok(())
}
