//! TTL cache layered on the store adapter.
//!
//! Entries live under the `cache:` prefix as `{data, expires, timestamp}`.
//! Expiry is lazy: an expired entry stays stored until it is overwritten,
//! invalidated, or evicted by the quota recovery path, so the stale
//! fallback can still read it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::store::{StoreAdapter, CACHE_PREFIX};

/// Entity classes with a fixed time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    Organizations,
    Repositories,
    RepoActivity,
    RepoDetail,
}

impl CacheClass {
    pub fn ttl(self) -> Duration {
        match self {
            CacheClass::Organizations => Duration::minutes(30),
            CacheClass::Repositories => Duration::minutes(5),
            CacheClass::RepoActivity => Duration::minutes(2),
            CacheClass::RepoDetail => Duration::minutes(10),
        }
    }
}

/// Synthetic cache key names.
pub mod cache_keys {
    pub const USER_PROFILE: &str = "user_profile";
    pub const ORGANIZATIONS: &str = "organizations";
    pub const REPOSITORIES_ALL: &str = "repositories_all";

    pub fn org_repos(org: &str) -> String {
        format!("org_repos_{}", org)
    }

    pub fn commits(owner: &str, repo: &str) -> String {
        format!("commits_{}_{}", owner, repo)
    }

    pub fn issues(owner: &str, repo: &str) -> String {
        format!("issues_{}_{}", owner, repo)
    }

    pub fn pulls(owner: &str, repo: &str) -> String {
        format!("pulls_{}_{}", owner, repo)
    }

    pub fn repo_detail(owner: &str, repo: &str) -> String {
        format!("repo_{}_{}", owner, repo)
    }

    /// Every key that belongs to a single repository.
    pub fn for_repository(owner: &str, repo: &str) -> Vec<String> {
        vec![
            commits(owner, repo),
            issues(owner, repo),
            pulls(owner, repo),
            repo_detail(owner, repo),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    #[serde(rename = "expires", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    /// Expired strictly after `expires_at`; the boundary instant is still fresh.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Clone)]
pub struct TtlCache {
    store: StoreAdapter,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(store: StoreAdapter, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn with_system_clock(store: StoreAdapter) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    /// Current time at the millisecond precision entries are persisted with.
    pub fn now(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
    }

    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    pub fn entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CacheEntry<T>>> {
        self.store.get_json(&Self::storage_key(key))
    }

    /// Returns the payload only while the entry is fresh.
    pub fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let now = self.now();
        match self.entry::<T>(key)? {
            Some(entry) if !entry.is_expired(now) => {
                debug!(key, "Cache hit");
                Ok(Some(entry.data))
            }
            Some(_) => {
                debug!(key, "Cache entry expired");
                Ok(None)
            }
            None => {
                debug!(key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Returns the payload whether or not it has expired.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.entry::<T>(key)?.map(|entry| entry.data))
    }

    /// Stores `value` with `expires = now + ttl`, replacing any prior entry
    /// in a single store write.
    pub fn set_cached<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let now = self.now();
        let entry = CacheEntry::new(value, now, ttl);
        self.store.set_json(&Self::storage_key(key), &entry, now)
    }

    pub fn invalidate(&self, key: &str) -> Result<()> {
        self.store.remove(&Self::storage_key(key))
    }

    pub fn invalidate_all(&self) -> Result<usize> {
        self.store.clear_cache_namespace()
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.store.evict_expired(self.now())
    }

    /// When the entry under `key` was written, if any.
    pub fn cached_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .entry::<serde_json::Value>(key)?
            .map(|entry| entry.created_at))
    }
}
