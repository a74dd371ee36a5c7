use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use url::Url;

use crate::error::{DashboardError, Result};
use crate::store::DEFAULT_QUOTA_BYTES;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Library-side settings shared by the client and the store.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_base: Url,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub store_quota: usize,
    /// Items requested for commit, issue and pull request lists.
    pub activity_page_size: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            user_agent: format!("github-dashboard-cache/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
            store_quota: DEFAULT_QUOTA_BYTES,
            activity_page_size: 30,
        }
    }
}

impl DashboardConfig {
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self> {
        self.api_base = parse_api_base(api_base)?;
        Ok(self)
    }

    /// Base URL without a trailing slash, ready for `format!("{}{}", base, path)`.
    pub fn api_base_str(&self) -> &str {
        self.api_base.as_str().trim_end_matches('/')
    }
}

pub fn parse_api_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| DashboardError::ConfigError(format!("Invalid API base '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DashboardError::ConfigError(format!(
            "Unsupported API base scheme '{}'",
            other
        ))),
    }
}

/// Default location of the persistent store file.
pub fn default_store_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "github-dashboard").map(|dirs| dirs.data_dir().join("store.json"))
}
