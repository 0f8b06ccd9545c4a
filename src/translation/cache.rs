/*!
 * Translation caching functionality.
 *
 * Completed translation maps are persisted in a key/value store under a key
 * derived from the normalized subtitle text, so reopening the same content
 * costs no API calls. Entries carry a format version and a timestamp and are
 * purged when either no longer checks out.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;
use crate::storage::KeyValueStore;
use crate::translation::TranslationMap;

/// Prefix shared by every cache key
pub const CACHE_KEY_PREFIX: &str = "translation_";

/// Current cache format version
pub const CACHE_VERSION: &str = "v1";

/// Default lifetime of a cache entry
pub const DEFAULT_EXPIRY_DAYS: u32 = 30;

static BLANK_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Persisted cache record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// Cue index to translated text
    pub translations: TranslationMap,
    /// Write time in epoch milliseconds
    pub timestamp: i64,
    /// Cache format version
    pub version: String,
    /// Number of translations
    pub count: usize,
}

/// Cache lookup counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Translation cache on top of a key/value store
pub struct TranslationCache {
    /// Backing store
    store: Arc<dyn KeyValueStore>,

    /// Maximum age of an entry in milliseconds
    expiry_ms: i64,

    /// Whether caching is enabled
    enabled: bool,

    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TranslationCache {
    /// Create a new translation cache with the default expiry
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            expiry_ms: days_to_ms(DEFAULT_EXPIRY_DAYS),
            enabled: true,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Set the entry lifetime in days
    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expiry_ms = days_to_ms(days);
        self
    }

    /// Enable or disable lookups and writes
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Compute the cache key for raw subtitle text.
    ///
    /// Line endings, trailing whitespace, runs of blank lines and surrounding
    /// whitespace do not affect the key.
    pub fn compute_key(raw_text: &str) -> String {
        let unix = raw_text.replace("\r\n", "\n").replace('\r', "\n");
        let stripped = unix.split('\n').map(str::trim_end).collect::<Vec<_>>().join("\n");
        let collapsed = BLANK_RUN_REGEX.replace_all(&stripped, "\n\n");
        let normalized = collapsed.trim();

        let hash = normalized
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));

        format!("{}{}_{}", CACHE_KEY_PREFIX, CACHE_VERSION, hash.unsigned_abs())
    }

    /// Look up a translation map.
    ///
    /// Malformed, outdated or expired entries are deleted and reported as
    /// absent. Storage failures are logged and reported as absent too.
    pub fn get(&self, key: &str) -> Option<TranslationMap> {
        if !self.enabled {
            return None;
        }

        let found = match self.store.get(key) {
            Ok(found) => found,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        };

        let entry = found.and_then(|raw| match self.check_entry(&raw) {
            Ok(entry) => Some(entry),
            Err(reason) => {
                debug!("Discarding cache entry {}: {}", key, reason);
                self.remove_quietly(key);
                None
            }
        });

        match entry {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                info!("Cache hit for {} ({} translations)", key, entry.count);
                Some(entry.translations)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", key);
                None
            }
        }
    }

    /// Persist a translation map.
    ///
    /// When the store is full, stale entries are cleaned up and the write is
    /// retried once. Returns whether the entry was stored; failures are never
    /// propagated.
    pub fn put(&self, key: &str, translations: &TranslationMap) -> bool {
        if !self.enabled {
            return false;
        }

        let entry = CacheEntry {
            translations: translations.clone(),
            timestamp: Utc::now().timestamp_millis(),
            version: CACHE_VERSION.to_string(),
            count: translations.len(),
        };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode cache entry {}: {}", key, e);
                return false;
            }
        };

        match self.store.set(key, &raw) {
            Ok(()) => {
                debug!("Saved {} translations to cache under {}", entry.count, key);
                true
            }
            Err(StorageError::QuotaExceeded { .. }) => {
                warn!("Cache storage full, cleaning up before retrying {}", key);
                self.cleanup();
                match self.store.set(key, &raw) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Dropping cache write for {}: {}", key, e);
                        false
                    }
                }
            }
            Err(e) => {
                warn!("Dropping cache write for {}: {}", key, e);
                false
            }
        }
    }

    /// Remove expired, outdated and malformed entries; returns how many went
    pub fn cleanup(&self) -> usize {
        let removed = self
            .cache_keys()
            .into_iter()
            .filter(|key| match self.store.get(key) {
                Ok(Some(raw)) => self.check_entry(&raw).is_err(),
                Ok(None) => false,
                Err(_) => false,
            })
            .filter(|key| self.remove_quietly(key))
            .count();

        if removed > 0 {
            info!("Cache cleanup removed {} entries", removed);
        }
        removed
    }

    /// Remove every cache entry; returns how many went
    pub fn clear_all(&self) -> usize {
        let removed = self.cache_keys().into_iter().filter(|key| self.remove_quietly(key)).count();
        info!("Cleared {} cache entries", removed);
        removed
    }

    /// Lookup counters since creation
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn check_entry(&self, raw: &str) -> Result<CacheEntry, String> {
        let entry: CacheEntry = serde_json::from_str(raw).map_err(|e| format!("malformed entry: {}", e))?;

        if entry.version != CACHE_VERSION {
            return Err(format!("version {} does not match {}", entry.version, CACHE_VERSION));
        }

        let age = Utc::now().timestamp_millis() - entry.timestamp;
        if age > self.expiry_ms {
            return Err(format!("expired {} ms ago", age - self.expiry_ms));
        }

        Ok(entry)
    }

    fn cache_keys(&self) -> Vec<String> {
        self.store.keys_with_prefix(CACHE_KEY_PREFIX).unwrap_or_else(|e| {
            warn!("Failed to list cache entries: {}", e);
            Vec::new()
        })
    }

    fn remove_quietly(&self, key: &str) -> bool {
        self.store.remove(key).unwrap_or_else(|e| {
            warn!("Failed to remove cache entry {}: {}", key, e);
            false
        })
    }
}

fn days_to_ms(days: u32) -> i64 {
    i64::from(days) * 24 * 60 * 60 * 1000
}
