use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    GitHubCommit, GitHubIssue, GitHubOrg, GitHubPullRequest, GitHubRepo, GitHubUser,
};

/// Authenticated user's profile snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: String,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub followers: u32,
    pub following: u32,
    pub public_repos: u32,
}

impl From<GitHubUser> for UserProfile {
    fn from(user: GitHubUser) -> Self {
        Self {
            id: user.id,
            login: user.login,
            name: user.name,
            avatar_url: user.avatar_url,
            html_url: user.html_url,
            bio: user.bio,
            email: user.email,
            followers: user.followers,
            following: user.following,
            public_repos: user.public_repos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: u64,
    pub login: String,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    pub url: String,
}

impl From<GitHubOrg> for Organization {
    fn from(org: GitHubOrg) -> Self {
        let url = format!("https://github.com/{}", org.login);
        Self {
            id: org.id,
            login: org.login,
            avatar_url: org.avatar_url,
            description: org.description,
            url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerType {
    User,
    Organization,
}

impl OwnerType {
    /// GitHub reports `"Organization"` for orgs; anything else is a user.
    pub fn from_api(value: Option<&str>) -> Self {
        match value {
            Some("Organization") => OwnerType::Organization,
            _ => OwnerType::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
    pub avatar_url: Option<String>,
    #[serde(rename = "type")]
    pub owner_type: OwnerType,
}

/// Repository as shown on the dashboard. `id` is the identity key; `full_name`
/// changes on rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub full_name: String,
    pub name: String,
    pub owner: RepoOwner,
    pub owner_type: OwnerType,
    pub description: Option<String>,
    pub private: bool,
    pub html_url: String,
    pub stargazers_count: u32,
    pub watchers_count: u32,
    pub forks_count: u32,
    pub open_issues_count: u32,
    pub language: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub archived: bool,
}

impl From<GitHubRepo> for Repository {
    fn from(repo: GitHubRepo) -> Self {
        let owner_type = OwnerType::from_api(repo.owner.owner_type.as_deref());
        Self {
            id: repo.id,
            full_name: repo.full_name,
            name: repo.name,
            owner: RepoOwner {
                login: repo.owner.login,
                avatar_url: repo.owner.avatar_url,
                owner_type,
            },
            owner_type,
            description: repo.description,
            private: repo.private,
            html_url: repo.html_url,
            stargazers_count: repo.stargazers_count,
            watchers_count: repo.watchers_count,
            forks_count: repo.forks_count,
            open_issues_count: repo.open_issues_count,
            language: repo.language,
            updated_at: repo.updated_at,
            created_at: repo.created_at,
            archived: repo.archived,
        }
    }
}

/// A repository the user chose to follow, with their own annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRepoEntry {
    pub id: u64,
    pub full_name: String,
    pub name: String,
    pub owner: String,
    pub owner_type: OwnerType,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub notes: String,
}

impl From<&Repository> for TrackedRepoEntry {
    fn from(repo: &Repository) -> Self {
        Self {
            id: repo.id,
            full_name: repo.full_name.clone(),
            name: repo.name.clone(),
            owner: repo.owner.login.clone(),
            owner_type: repo.owner_type,
            pinned: false,
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub author_name: Option<String>,
    pub author_login: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub html_url: String,
}

impl From<GitHubCommit> for CommitSummary {
    fn from(commit: GitHubCommit) -> Self {
        let (author_name, date) = match commit.commit.author {
            Some(author) => (author.name, author.date),
            None => (None, None),
        };
        Self {
            sha: commit.sha,
            message: commit.commit.message,
            author_name,
            author_login: commit.author.map(|a| a.login),
            date,
            html_url: commit.html_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author_login: Option<String>,
    pub comments: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
}

impl From<GitHubIssue> for IssueSummary {
    fn from(issue: GitHubIssue) -> Self {
        Self {
            id: issue.id,
            number: issue.number,
            title: issue.title,
            state: issue.state,
            author_login: issue.user.map(|u| u.login),
            comments: issue.comments,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            html_url: issue.html_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub state: String,
    pub author_login: Option<String>,
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
}

impl From<GitHubPullRequest> for PullRequestSummary {
    fn from(pr: GitHubPullRequest) -> Self {
        Self {
            id: pr.id,
            number: pr.number,
            title: pr.title,
            state: pr.state,
            author_login: pr.user.map(|u| u.login),
            draft: pr.draft,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
            html_url: pr.html_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    #[default]
    Comfortable,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Updated,
    Name,
    Stars,
    Issues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSettings {
    pub view_mode: ViewMode,
    pub theme: Theme,
    pub auto_refresh: bool,
    /// Seconds between automatic refreshes.
    pub refresh_interval: u64,
    pub density: Density,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Grid,
            theme: Theme::Auto,
            auto_refresh: true,
            refresh_interval: 300,
            density: Density::Comfortable,
            sort_by: SortField::Updated,
            sort_direction: SortDirection::Desc,
        }
    }
}

/// Partial settings update. Absent fields leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<ViewMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<Density>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
}

impl DashboardSettings {
    /// Shallow merge of `patch` over `self`.
    pub fn merged(mut self, patch: &SettingsPatch) -> Self {
        if let Some(view_mode) = patch.view_mode {
            self.view_mode = view_mode;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(auto_refresh) = patch.auto_refresh {
            self.auto_refresh = auto_refresh;
        }
        if let Some(refresh_interval) = patch.refresh_interval {
            self.refresh_interval = refresh_interval;
        }
        if let Some(density) = patch.density {
            self.density = density;
        }
        if let Some(sort_by) = patch.sort_by {
            self.sort_by = sort_by;
        }
        if let Some(sort_direction) = patch.sort_direction {
            self.sort_direction = sort_direction;
        }
        self
    }
}

impl From<&DashboardSettings> for SettingsPatch {
    fn from(settings: &DashboardSettings) -> Self {
        Self {
            view_mode: Some(settings.view_mode),
            theme: Some(settings.theme),
            auto_refresh: Some(settings.auto_refresh),
            refresh_interval: Some(settings.refresh_interval),
            density: Some(settings.density),
            sort_by: Some(settings.sort_by),
            sort_direction: Some(settings.sort_direction),
        }
    }
}

/// Rate limit state reported by the last response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitState {
    pub remaining: u32,
    pub limit: u32,
    pub reset_time: DateTime<Utc>,
    pub is_limited: bool,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            remaining: 5000,
            limit: 5000,
            reset_time: Utc::now() + chrono::Duration::hours(1),
            is_limited: false,
        }
    }
}
