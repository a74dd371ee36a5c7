use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::TtlCache;
use crate::error::{DashboardError, Result};
use crate::models::UserProfile;
use crate::store::keys;

/// Where a credential lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    /// Written to the store and survives restarts.
    Durable,
    /// Held in memory for this process only.
    Ephemeral,
}

/// Token and profile state. Gates every remote fetch.
#[derive(Clone)]
pub struct Credentials {
    cache: TtlCache,
    ephemeral: Arc<Mutex<Option<String>>>,
}

impl Credentials {
    pub fn new(cache: TtlCache) -> Self {
        Self {
            cache,
            ephemeral: Arc::new(Mutex::new(None)),
        }
    }

    /// Replaces the credential of the given class.
    pub fn set_credential(&self, token: &str, persistence: Persistence) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DashboardError::NoCredential);
        }
        match persistence {
            Persistence::Durable => {
                self.cache
                    .store()
                    .set(keys::TOKEN, token, self.cache.now())?;
            }
            Persistence::Ephemeral => {
                *self.ephemeral.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
            }
        }
        Ok(())
    }

    /// The active token. An ephemeral credential takes precedence.
    pub fn token(&self) -> Result<Option<String>> {
        if let Some(token) = self
            .ephemeral
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Ok(Some(token));
        }
        self.cache.store().get(keys::TOKEN)
    }

    pub fn has_credential(&self) -> bool {
        matches!(self.token(), Ok(Some(_)))
    }

    pub fn require_credential(&self) -> Result<String> {
        self.token()?.ok_or(DashboardError::NoCredential)
    }

    /// Wipes the token along with every piece of account-derived data, so
    /// nothing cached can be attributed to the next account that signs in.
    pub fn clear_credential(&self) -> Result<()> {
        *self.ephemeral.lock().unwrap_or_else(|e| e.into_inner()) = None;

        let store = self.cache.store();
        store.remove(keys::TOKEN)?;
        store.remove(keys::USER_INFO)?;
        store.remove(keys::ORGANIZATIONS)?;
        store.remove(keys::ORGANIZATIONS_UPDATED_AT)?;
        let cleared = self.cache.invalidate_all()?;

        info!(cleared, "Cleared credential and account data");
        Ok(())
    }

    pub fn profile(&self) -> Result<Option<UserProfile>> {
        self.cache.store().get_json(keys::USER_INFO)
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.cache
            .store()
            .set_json(keys::USER_INFO, profile, self.cache.now())
    }
}

/// What a token's OAuth scopes allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub repo_access: bool,
    pub org_access: bool,
}

impl ScopeReport {
    /// Parses an `X-OAuth-Scopes` header value.
    ///
    /// The broad `repo` scope is accepted as granting organization reads.
    /// GitHub does not strictly promise that, so a token passing here can
    /// still get `Forbidden` on organization endpoints.
    pub fn from_header(header: &str) -> Self {
        let scopes: Vec<&str> = header
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let has = |scope: &str| scopes.contains(&scope);

        let repo_access = has("repo") || has("public_repo");
        let org_access = has("repo") || has("read:org") || has("write:org") || has("admin:org");

        Self {
            repo_access,
            org_access,
        }
    }

    pub fn is_sufficient(&self) -> bool {
        self.repo_access && self.org_access
    }
}
