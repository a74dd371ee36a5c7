use std::sync::Mutex;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::DashboardConfig;
use crate::credentials::{Credentials, ScopeReport};
use crate::error::{DashboardError, Result};
use crate::models::{
    CommitSummary, IssueSummary, Organization, PullRequestSummary, RateLimitState, Repository,
    UserProfile,
};
use crate::types::{
    GitHubCommit, GitHubIssue, GitHubOrg, GitHubPullRequest, GitHubRateLimitResponse, GitHubRepo,
    GitHubUser,
};

pub const PER_PAGE: u32 = 100;
const ACCEPT_VERSION: &str = "application/vnd.github.v3+json";

/// Authenticated client for the GitHub REST API.
///
/// Every call reads the token from [`Credentials`] at send time, so a
/// logout or a 401 takes effect on the very next request.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    activity_page_size: u32,
    rate_limit: Mutex<Option<RateLimitState>>,
}

impl GitHubClient {
    pub fn new(config: &DashboardConfig, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;

        Ok(GitHubClient {
            client,
            base_url: config.api_base_str().to_string(),
            credentials,
            activity_page_size: config.activity_page_size,
            rate_limit: Mutex::new(None),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Rate limit state from the most recent response, if any.
    pub fn rate_limit(&self) -> Option<RateLimitState> {
        self.rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn send(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let token = self.credentials.require_credential()?;
        let url = format!("{}{}", self.base_url, path);

        debug!(%url, "GitHub request");
        let response = self
            .client
            .get(&url)
            .query(query)
            .header(ACCEPT, ACCEPT_VERSION)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        let rate_limit = rate_limit_from_headers(response.headers());
        if let Some(state) = &rate_limit {
            *self.rate_limit.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        }

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => {
                warn!(%url, "GitHub rejected the credential, clearing it");
                if let Err(e) = self.credentials.clear_credential() {
                    warn!(error = %e, "Failed to clear rejected credential");
                }
                Err(DashboardError::InvalidCredential)
            }
            StatusCode::FORBIDDEN => match rate_limit {
                Some(state) if state.remaining == 0 => {
                    warn!(reset_time = %state.reset_time, "GitHub rate limit exhausted");
                    Err(DashboardError::QuotaExceeded {
                        reset_at: state.reset_time.to_rfc3339(),
                    })
                }
                _ => {
                    let error_text = response.text().await.unwrap_or_default();
                    Err(DashboardError::Forbidden(error_text))
                }
            },
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(DashboardError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// GET `path` and decode the JSON body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(path, query).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Follows `page=1,2,...` with `per_page=100` until a page comes back
    /// with fewer than 100 items. A full page always triggers one more request.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut params = query.to_vec();
            params.push(("per_page", PER_PAGE.to_string()));
            params.push(("page", page.to_string()));

            let items: Vec<T> = self.request(path, &params).await?;
            let count = items.len();
            all_items.extend(items);

            debug!(path, page, count, total = all_items.len(), "Fetched page");

            if count < PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(all_items)
    }

    pub async fn current_user(&self) -> Result<UserProfile> {
        let user: GitHubUser = self.request("/user", &[]).await?;
        Ok(user.into())
    }

    /// Scopes granted to the current token, read from `X-OAuth-Scopes`.
    pub async fn token_scopes(&self) -> Result<ScopeReport> {
        let response = self.send("/user", &[]).await?;
        let header = response
            .headers()
            .get("X-OAuth-Scopes")
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default();
        Ok(ScopeReport::from_header(header))
    }

    pub async fn user_organizations(&self) -> Result<Vec<Organization>> {
        let orgs: Vec<GitHubOrg> = self.get_all_pages("/user/orgs", &[]).await?;
        Ok(orgs.into_iter().map(Organization::from).collect())
    }

    pub async fn user_repositories(&self) -> Result<Vec<Repository>> {
        let params = [
            ("affiliation", "owner,collaborator,organization_member".to_string()),
            ("sort", "updated".to_string()),
        ];
        let repos: Vec<GitHubRepo> = self.get_all_pages("/user/repos", &params).await?;
        Ok(repos.into_iter().map(Repository::from).collect())
    }

    pub async fn organization_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        let path = format!("/orgs/{}/repos", org);
        let params = [("type", "all".to_string()), ("sort", "updated".to_string())];
        let repos: Vec<GitHubRepo> = self.get_all_pages(&path, &params).await?;
        Ok(repos.into_iter().map(Repository::from).collect())
    }

    pub async fn repository(&self, owner: &str, repo: &str) -> Result<Repository> {
        let path = format!("/repos/{}/{}", owner, repo);
        let repo: GitHubRepo = self.request(&path, &[]).await?;
        Ok(repo.into())
    }

    pub async fn commits(&self, owner: &str, repo: &str) -> Result<Vec<CommitSummary>> {
        let path = format!("/repos/{}/{}/commits", owner, repo);
        let params = [("per_page", self.activity_page_size.to_string())];
        let commits: Vec<GitHubCommit> = self.request(&path, &params).await?;
        Ok(commits.into_iter().map(CommitSummary::from).collect())
    }

    /// Open issues, excluding pull requests the issues endpoint also returns.
    pub async fn issues(&self, owner: &str, repo: &str) -> Result<Vec<IssueSummary>> {
        let path = format!("/repos/{}/{}/issues", owner, repo);
        let params = [
            ("state", "open".to_string()),
            ("per_page", self.activity_page_size.to_string()),
        ];
        let issues: Vec<GitHubIssue> = self.request(&path, &params).await?;
        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(IssueSummary::from)
            .collect())
    }

    pub async fn pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequestSummary>> {
        let path = format!("/repos/{}/{}/pulls", owner, repo);
        let params = [
            ("state", "open".to_string()),
            ("per_page", self.activity_page_size.to_string()),
        ];
        let pulls: Vec<GitHubPullRequest> = self.request(&path, &params).await?;
        Ok(pulls.into_iter().map(PullRequestSummary::from).collect())
    }

    /// Live quota status. Never cached.
    pub async fn rate_limit_status(&self) -> Result<RateLimitState> {
        let response: GitHubRateLimitResponse = self.request("/rate_limit", &[]).await?;
        let core = response.resources.core;
        Ok(RateLimitState {
            remaining: core.remaining,
            limit: core.limit,
            reset_time: DateTime::from_timestamp(core.reset, 0).unwrap_or_else(Utc::now),
            is_limited: core.remaining == 0,
        })
    }
}

/// Reads the `X-RateLimit-*` headers. `None` when the response carries no
/// remaining count.
pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitState> {
    let remaining = headers
        .get("X-RateLimit-Remaining")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u32>().ok())?;

    let limit = headers
        .get("X-RateLimit-Limit")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(5000);

    let reset_time = headers
        .get("X-RateLimit-Reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
        .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));

    Some(RateLimitState {
        remaining,
        limit,
        reset_time,
        is_limited: remaining == 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        headers.insert("X-RateLimit-Limit", HeaderValue::from_static("5000"));
        headers.insert("X-RateLimit-Reset", HeaderValue::from_static("1700000000"));

        let state = rate_limit_from_headers(&headers).unwrap();
        assert_eq!(state.remaining, 0);
        assert_eq!(state.limit, 5000);
        assert!(state.is_limited);
        assert_eq!(state.reset_time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_remaining_header_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Limit", HeaderValue::from_static("5000"));
        assert!(rate_limit_from_headers(&headers).is_none());
    }
}
