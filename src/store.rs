//! Persistent key-value storage with quota enforcement.
//!
//! [`KeyValueStore`] is the raw backend contract. [`StoreAdapter`] wraps a
//! backend with the quota-exceeded recovery path: evict expired cache
//! entries, retry, evict the whole cache namespace, retry, then give up with
//! [`DashboardError::StorageExhausted`].

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DashboardError, Result, StoreError};

/// Prefix shared by every TTL cache entry.
pub const CACHE_PREFIX: &str = "cache:";

/// Assumed storage ceiling, matching a typical browser origin allowance.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

pub mod keys {
    pub const TOKEN: &str = "github_token";
    pub const USER_INFO: &str = "user_info";
    pub const ORGANIZATIONS: &str = "organizations";
    pub const ORGANIZATIONS_UPDATED_AT: &str = "organizations_updated_at";
    pub const TRACKED_REPOS: &str = "tracked_repos";
    pub const DASHBOARD_SETTINGS: &str = "dashboard_settings";
    pub const LAST_REFRESH: &str = "last_refresh";
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError>;
    fn remove(&self, key: &str) -> std::result::Result<(), StoreError>;
    fn keys(&self) -> std::result::Result<Vec<String>, StoreError>;
    fn used_bytes(&self) -> std::result::Result<usize, StoreError>;
    fn quota_bytes(&self) -> usize;
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

fn total_size(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| entry_size(k, v)).sum()
}

/// Checks that replacing `key` with `value` keeps `entries` under `quota`.
fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    quota: usize,
) -> std::result::Result<(), StoreError> {
    let current = total_size(entries);
    let replaced = entries.get(key).map(|old| entry_size(key, old)).unwrap_or(0);
    let needed = current - replaced + entry_size(key, value);
    if needed > quota {
        return Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            needed,
            quota,
        });
    }
    Ok(())
}

/// In-process store. Contents vanish with the process.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        check_quota(&entries, key, value, self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> std::result::Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> std::result::Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.keys().cloned().collect())
    }

    fn used_bytes(&self) -> std::result::Result<usize, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(total_size(&entries))
    }

    fn quota_bytes(&self) -> usize {
        self.quota
    }
}

/// Store persisted as a single JSON document on disk.
///
/// Every mutation rewrites the whole file through a temp file and rename so
/// a crash never leaves a half-written document behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    quota: usize,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>, quota: usize) -> std::result::Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            quota,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> std::result::Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(entries)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        check_quota(&entries, key, value, self.quota)?;
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&entries) {
            // Keep memory consistent with disk.
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> std::result::Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = entries.remove(key) {
            if let Err(e) = self.flush(&entries) {
                entries.insert(key.to_string(), old);
                return Err(e);
            }
        }
        Ok(())
    }

    fn keys(&self) -> std::result::Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.keys().cloned().collect())
    }

    fn used_bytes(&self) -> std::result::Result<usize, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(total_size(&entries))
    }

    fn quota_bytes(&self) -> usize {
        self.quota
    }
}

/// Advisory storage usage figures for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub used_bytes: usize,
    pub quota_bytes: usize,
    pub percent: f64,
}

/// Only the expiry field is needed to decide eviction.
#[derive(Deserialize)]
struct ExpiryProbe {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    expires: DateTime<Utc>,
}

/// Store wrapper shared by every component.
#[derive(Clone)]
pub struct StoreAdapter {
    backend: Arc<dyn KeyValueStore>,
}

impl StoreAdapter {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.backend.get(key)?)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        Ok(self.backend.remove(key)?)
    }

    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, now)
    }

    /// Writes `value`, recovering from quota exhaustion by evicting cache
    /// entries. `now` decides which cache entries count as expired.
    pub fn set(&self, key: &str, value: &str, now: DateTime<Utc>) -> Result<()> {
        match self.backend.set(key, value) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_quota_exceeded() => {
                warn!(key, error = %e, "Storage quota exceeded, evicting expired cache entries");
            }
            Err(e) => return Err(e.into()),
        }

        let evicted = self.evict_expired(now)?;
        info!(key, evicted, "Evicted expired cache entries");
        match self.backend.set(key, value) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_quota_exceeded() => {
                warn!(key, "Still over quota, clearing the entire cache namespace");
            }
            Err(e) => return Err(e.into()),
        }

        let cleared = self.clear_cache_namespace()?;
        info!(key, cleared, "Cleared cache namespace");
        match self.backend.set(key, value) {
            Ok(()) => Ok(()),
            Err(e) if e.is_quota_exceeded() => Err(DashboardError::StorageExhausted {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn cache_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(CACHE_PREFIX))
            .collect())
    }

    /// Removes cache entries whose expiry lies before `now`. Entries that
    /// cannot be parsed are treated as expired.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut evicted = 0;
        for key in self.cache_keys()? {
            let expired = match self.backend.get(&key)? {
                Some(raw) => serde_json::from_str::<ExpiryProbe>(&raw)
                    .map(|probe| now > probe.expires)
                    .unwrap_or(true),
                None => false,
            };
            if expired {
                self.backend.remove(&key)?;
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    pub fn clear_cache_namespace(&self) -> Result<usize> {
        let keys = self.cache_keys()?;
        for key in &keys {
            self.backend.remove(key)?;
        }
        Ok(keys.len())
    }

    pub fn usage(&self) -> Result<StorageUsage> {
        let used_bytes = self.backend.used_bytes()?;
        let quota_bytes = self.backend.quota_bytes();
        let percent = if quota_bytes == 0 {
            100.0
        } else {
            used_bytes as f64 / quota_bytes as f64 * 100.0
        };
        Ok(StorageUsage {
            used_bytes,
            quota_bytes,
            percent,
        })
    }
}
