use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::aggregate::fetch_all_repositories;
use crate::cache::{cache_keys, CacheClass, TtlCache};
use crate::clock::{Clock, SystemClock};
use crate::config::DashboardConfig;
use crate::credentials::{Credentials, Persistence, ScopeReport};
use crate::error::Result;
use crate::github::GitHubClient;
use crate::models::{
    CommitSummary, DashboardSettings, IssueSummary, Organization, PullRequestSummary,
    RateLimitState, Repository, SettingsPatch, UserProfile,
};
use crate::settings::Settings;
use crate::snapshot::{self, ExportSnapshot, ImportSummary};
use crate::store::{keys, KeyValueStore, StorageUsage, StoreAdapter};
use crate::sync::{Freshness, Synced, Synchronizer};
use crate::tracked::TrackedRepos;

/// Outcome of a full refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub profile: Freshness,
    pub organizations: usize,
    pub repositories: usize,
    pub repositories_freshness: Freshness,
    pub refreshed_at: DateTime<Utc>,
}

/// Entry point for a UI layer: every collection, the user's curated data,
/// and housekeeping, all backed by one store.
pub struct Dashboard {
    cache: TtlCache,
    credentials: Credentials,
    client: GitHubClient,
    sync: Synchronizer,
    tracked: TrackedRepos,
    settings: Settings,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig, backend: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &DashboardConfig,
        backend: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let cache = TtlCache::new(StoreAdapter::new(backend), clock);
        let credentials = Credentials::new(cache.clone());
        let client = GitHubClient::new(config, credentials.clone())?;

        Ok(Self {
            sync: Synchronizer::new(cache.clone(), credentials.clone()),
            tracked: TrackedRepos::new(cache.clone()),
            settings: Settings::new(cache.clone()),
            cache,
            credentials,
            client,
        })
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub fn tracked(&self) -> &TrackedRepos {
        &self.tracked
    }

    /// Stores the token, checks its scopes and loads the profile.
    ///
    /// Scope shortfalls are reported but do not reject the token.
    pub async fn login(
        &self,
        token: &str,
        persistence: Persistence,
    ) -> Result<(UserProfile, ScopeReport)> {
        self.credentials.set_credential(token, persistence)?;

        match self.validate_login().await {
            Ok((profile, scopes)) => {
                info!(login = %profile.login, "Signed in");
                Ok((profile, scopes))
            }
            Err(e) => {
                // The previous token was already replaced, so a failed login
                // leaves no credential behind.
                if let Err(clear_err) = self.credentials.clear_credential() {
                    warn!(error = %clear_err, "Failed to discard unvalidated credential");
                }
                Err(e)
            }
        }
    }

    async fn validate_login(&self) -> Result<(UserProfile, ScopeReport)> {
        let scopes = self.client.token_scopes().await?;
        if !scopes.is_sufficient() {
            warn!(?scopes, "Token scopes may not cover repository and organization reads");
        }

        let profile = self.sync_user_profile(true).await?;
        Ok((profile.data, scopes))
    }

    pub fn logout(&self) -> Result<()> {
        self.credentials.clear_credential()
    }

    pub async fn sync_user_profile(&self, force_refresh: bool) -> Result<Synced<UserProfile>> {
        let synced = self
            .sync
            .sync(
                cache_keys::USER_PROFILE,
                CacheClass::Organizations,
                force_refresh,
                || self.client.current_user(),
            )
            .await?;

        if synced.freshness == Freshness::Fresh {
            if let Err(e) = self.credentials.save_profile(&synced.data) {
                error!(error = %e, "Fetched profile could not be persisted");
            }
        }
        Ok(synced)
    }

    pub async fn sync_organizations(
        &self,
        force_refresh: bool,
    ) -> Result<Synced<Vec<Organization>>> {
        let synced = self
            .sync
            .sync(
                cache_keys::ORGANIZATIONS,
                CacheClass::Organizations,
                force_refresh,
                || self.client.user_organizations(),
            )
            .await?;

        if synced.freshness == Freshness::Fresh {
            if let Err(e) = self.persist_organizations(&synced.data) {
                error!(error = %e, "Fetched organizations could not be persisted");
            }
        }
        Ok(synced)
    }

    fn persist_organizations(&self, organizations: &[Organization]) -> Result<()> {
        let store = self.cache.store();
        let now = self.cache.now();
        store.set_json(keys::ORGANIZATIONS, organizations, now)?;
        store.set_json(keys::ORGANIZATIONS_UPDATED_AT, &now, now)
    }

    /// The unified repository list across the user and every organization.
    pub async fn sync_repositories(&self, force_refresh: bool) -> Result<Synced<Vec<Repository>>> {
        self.sync
            .sync(
                cache_keys::REPOSITORIES_ALL,
                CacheClass::Repositories,
                force_refresh,
                || async {
                    let organizations = self.organizations_for_fan_out(force_refresh).await?;
                    fetch_all_repositories(&self.client, &self.sync, &organizations, force_refresh)
                        .await
                },
            )
            .await
    }

    /// Organizations to fan out over. When the organization list cannot be
    /// fetched, the last stored list is used, or none at all, so the user's
    /// own repositories still come back.
    async fn organizations_for_fan_out(&self, force_refresh: bool) -> Result<Vec<Organization>> {
        match self.sync_organizations(force_refresh).await {
            Ok(synced) => Ok(synced.data),
            Err(e) if e.requires_reauthentication() => Err(e),
            Err(e) => {
                let stored = self
                    .stored_organizations()
                    .ok()
                    .flatten()
                    .map(|(organizations, _)| organizations)
                    .unwrap_or_default();
                warn!(
                    error = %e,
                    stored = stored.len(),
                    "Organization list unavailable, aggregating without a fresh list"
                );
                Ok(stored)
            }
        }
    }

    pub async fn sync_repository(
        &self,
        owner: &str,
        repo: &str,
        force_refresh: bool,
    ) -> Result<Synced<Repository>> {
        self.sync
            .sync(
                &cache_keys::repo_detail(owner, repo),
                CacheClass::RepoDetail,
                force_refresh,
                || self.client.repository(owner, repo),
            )
            .await
    }

    pub async fn sync_commits(
        &self,
        owner: &str,
        repo: &str,
        force_refresh: bool,
    ) -> Result<Synced<Vec<CommitSummary>>> {
        self.sync
            .sync(
                &cache_keys::commits(owner, repo),
                CacheClass::RepoActivity,
                force_refresh,
                || self.client.commits(owner, repo),
            )
            .await
    }

    pub async fn sync_issues(
        &self,
        owner: &str,
        repo: &str,
        force_refresh: bool,
    ) -> Result<Synced<Vec<IssueSummary>>> {
        self.sync
            .sync(
                &cache_keys::issues(owner, repo),
                CacheClass::RepoActivity,
                force_refresh,
                || self.client.issues(owner, repo),
            )
            .await
    }

    pub async fn sync_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        force_refresh: bool,
    ) -> Result<Synced<Vec<PullRequestSummary>>> {
        self.sync
            .sync(
                &cache_keys::pulls(owner, repo),
                CacheClass::RepoActivity,
                force_refresh,
                || self.client.pull_requests(owner, repo),
            )
            .await
    }

    /// Syncs profile, organizations and repositories, then records the
    /// refresh time.
    pub async fn refresh_all(&self, force_refresh: bool) -> Result<RefreshSummary> {
        let profile = self.sync_user_profile(force_refresh).await?;
        let organizations = self.organizations_for_fan_out(force_refresh).await?;
        let repositories = self.sync_repositories(force_refresh).await?;

        let refreshed_at = self.cache.now();
        self.cache
            .store()
            .set_json(keys::LAST_REFRESH, &refreshed_at, refreshed_at)?;

        Ok(RefreshSummary {
            profile: profile.freshness,
            organizations: organizations.len(),
            repositories: repositories.data.len(),
            repositories_freshness: repositories.freshness,
            refreshed_at,
        })
    }

    pub fn last_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        self.cache.store().get_json(keys::LAST_REFRESH)
    }

    /// Organizations as last persisted, with the time they were written.
    pub fn stored_organizations(&self) -> Result<Option<(Vec<Organization>, Option<DateTime<Utc>>)>> {
        let store = self.cache.store();
        let organizations: Option<Vec<Organization>> = store.get_json(keys::ORGANIZATIONS)?;
        match organizations {
            Some(organizations) => Ok(Some((
                organizations,
                store.get_json(keys::ORGANIZATIONS_UPDATED_AT)?,
            ))),
            None => Ok(None),
        }
    }

    /// Starts tracking `owner/repo`, looking it up through the detail cache.
    pub async fn track(&self, owner: &str, repo: &str) -> Result<(Repository, bool)> {
        let repository = self.sync_repository(owner, repo, false).await?.data;
        let added = self.tracked.add(&repository)?;
        Ok((repository, added))
    }

    pub fn settings(&self) -> Result<DashboardSettings> {
        self.settings.get()
    }

    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<DashboardSettings> {
        self.settings.update(patch)
    }

    pub fn reset_settings(&self) -> Result<()> {
        self.settings.reset()
    }

    pub fn export(&self) -> Result<ExportSnapshot> {
        snapshot::export(&self.cache)
    }

    pub fn import(&self, snapshot: &ExportSnapshot) -> Result<ImportSummary> {
        snapshot::import(&self.cache, snapshot)
    }

    pub fn storage_usage(&self) -> Result<StorageUsage> {
        self.cache.store().usage()
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.cache.purge_expired()
    }

    pub fn invalidate_repository(&self, owner: &str, repo: &str) -> Result<()> {
        for key in cache_keys::for_repository(owner, repo) {
            self.cache.invalidate(&key)?;
        }
        Ok(())
    }

    pub fn invalidate_all(&self) -> Result<usize> {
        self.cache.invalidate_all()
    }

    pub async fn rate_limit_status(&self) -> Result<RateLimitState> {
        self.client.rate_limit_status().await
    }
}
