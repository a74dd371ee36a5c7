//! Cache-first synchronization with stale fallback.
//!
//! Every collection goes through [`Synchronizer::sync`]:
//!
//! 1. no credential: fail with `NoCredential` before touching the network
//! 2. fresh cache entry and no forced refresh: return it
//! 3. otherwise fetch, write through the cache, return fresh data
//! 4. fetch failed: return the expired entry if one exists, else the error
//!
//! A rejected credential is never masked by stale data.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::cache::{CacheClass, TtlCache};
use crate::credentials::Credentials;
use crate::error::{DashboardError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched from GitHub during this call.
    Fresh,
    /// Served from a cache entry that has not expired.
    Cached,
    /// The fetch failed and an expired entry was served instead.
    Stale { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synced<T> {
    pub data: T,
    pub freshness: Freshness,
    /// When `data` was fetched from GitHub, if known.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> Synced<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        Synced {
            data: f(self.data),
            freshness: self.freshness,
            fetched_at: self.fetched_at,
        }
    }
}

#[derive(Clone)]
pub struct Synchronizer {
    cache: TtlCache,
    credentials: Credentials,
}

impl Synchronizer {
    pub fn new(cache: TtlCache, credentials: Credentials) -> Self {
        Self { cache, credentials }
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub async fn sync<T, F, Fut>(
        &self,
        key: &str,
        class: CacheClass,
        force_refresh: bool,
        fetch: F,
    ) -> Result<Synced<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.credentials.has_credential() {
            return Err(DashboardError::NoCredential);
        }

        if !force_refresh {
            match self.cache.get_cached::<T>(key) {
                Ok(Some(data)) => {
                    debug!(key, "Serving cached data");
                    return Ok(Synced {
                        data,
                        freshness: Freshness::Cached,
                        fetched_at: self.cache.cached_at(key).ok().flatten(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key, error = %e, "Unreadable cache entry, refetching");
                }
            }
        }

        match fetch().await {
            // A 401 during the fetch cleared the credential and the cache; do
            // not write data from the rejected account back.
            Ok(_) if !self.credentials.has_credential() => {
                warn!(key, "Credential was revoked during the fetch, discarding result");
                Err(DashboardError::InvalidCredential)
            }
            Ok(data) => {
                if let Err(e) = self.cache.set_cached(key, &data, class.ttl()) {
                    error!(key, error = %e, "Fetched data could not be cached");
                }
                Ok(Synced {
                    data,
                    freshness: Freshness::Fresh,
                    fetched_at: Some(self.cache.now()),
                })
            }
            Err(err) if err.requires_reauthentication() => Err(err),
            Err(err) => match self.cache.get_stale::<T>(key) {
                Ok(Some(data)) => {
                    warn!(key, error = %err, "Fetch failed, serving stale cache");
                    Ok(Synced {
                        data,
                        freshness: Freshness::Stale {
                            reason: err.to_string(),
                        },
                        fetched_at: self.cache.cached_at(key).ok().flatten(),
                    })
                }
                _ => Err(err),
            },
        }
    }
}
