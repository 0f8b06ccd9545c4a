/*!
 * Persistent key/value storage for cached translations.
 *
 * The translation cache only needs a string-keyed, string-valued store.
 * Two backends are provided:
 * - `SqliteStore`: on-disk SQLite table, used by the application
 * - `MemoryStore`: process-local map, used by tests and when caching is disabled
 *
 * Both backends can enforce an optional capacity in bytes, so callers see the
 * same quota failure a browser-style local storage would raise.
 */

use crate::errors::StorageError;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Synchronous string key/value store
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value stored under `key`
    ///
    /// Fails with `StorageError::QuotaExceeded` when the write would push the
    /// store past its capacity.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`, returning whether it existed
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// List every key starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Size a key/value pair occupies for quota accounting
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
