//! Versioned export and import of the user's dashboard state.
//! The credential is never part of a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::TtlCache;
use crate::error::{DashboardError, Result};
use crate::models::{Organization, SettingsPatch, TrackedRepoEntry, UserProfile};
use crate::settings::Settings;
use crate::store::keys;
use crate::tracked::TrackedRepos;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub user_info: Option<UserProfile>,
    #[serde(default)]
    pub organizations: Option<Vec<Organization>>,
    #[serde(default)]
    pub tracked_repos: Option<Vec<TrackedRepoEntry>>,
    #[serde(default)]
    pub dashboard_settings: Option<SettingsPatch>,
    #[serde(default)]
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Which fields an import wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub user_info: bool,
    pub organizations: bool,
    pub tracked_repos: usize,
    pub dashboard_settings: bool,
    pub last_refresh: bool,
}

pub fn export(cache: &TtlCache) -> Result<ExportSnapshot> {
    let store = cache.store();
    let settings = Settings::new(cache.clone()).get()?;
    Ok(ExportSnapshot {
        version: SNAPSHOT_VERSION,
        exported_at: cache.now(),
        user_info: store.get_json(keys::USER_INFO)?,
        organizations: store.get_json(keys::ORGANIZATIONS)?,
        tracked_repos: Some(TrackedRepos::new(cache.clone()).all()?),
        dashboard_settings: Some(SettingsPatch::from(&settings)),
        last_refresh: store.get_json(keys::LAST_REFRESH)?,
    })
}

/// Writes each field present in `snapshot` over the live store. Settings
/// merge over the current settings; other fields replace what is stored.
pub fn import(cache: &TtlCache, snapshot: &ExportSnapshot) -> Result<ImportSummary> {
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(DashboardError::ConfigError(format!(
            "Snapshot version {} is newer than supported version {}",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }

    let store = cache.store();
    let now = cache.now();
    let mut summary = ImportSummary::default();

    if let Some(user_info) = &snapshot.user_info {
        store.set_json(keys::USER_INFO, user_info, now)?;
        summary.user_info = true;
    }
    if let Some(organizations) = &snapshot.organizations {
        store.set_json(keys::ORGANIZATIONS, organizations, now)?;
        // The imported list is as fresh as the export that carried it.
        store.set_json(keys::ORGANIZATIONS_UPDATED_AT, &snapshot.exported_at, now)?;
        summary.organizations = true;
    }
    if let Some(tracked_repos) = &snapshot.tracked_repos {
        TrackedRepos::new(cache.clone()).replace_all(tracked_repos)?;
        summary.tracked_repos = tracked_repos.len();
    }
    if let Some(patch) = &snapshot.dashboard_settings {
        Settings::new(cache.clone()).update(patch)?;
        summary.dashboard_settings = true;
    }
    if let Some(last_refresh) = &snapshot.last_refresh {
        store.set_json(keys::LAST_REFRESH, last_refresh, now)?;
        summary.last_refresh = true;
    }

    info!(?summary, "Imported snapshot");
    Ok(summary)
}
