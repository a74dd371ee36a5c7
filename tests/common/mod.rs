#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use github_dashboard_cache::clock::ManualClock;
use github_dashboard_cache::config::DashboardConfig;
use github_dashboard_cache::credentials::Persistence;
use github_dashboard_cache::store::{KeyValueStore, MemoryStore};
use github_dashboard_cache::Dashboard;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "ghp_test_token";

pub struct TestContext {
    pub server: MockServer,
    pub clock: Arc<ManualClock>,
    pub dashboard: Dashboard,
}

impl TestContext {
    /// A dashboard pointed at a fresh mock server, signed in with a durable
    /// token, on an in-memory store and a manual clock.
    pub async fn new() -> Self {
        Self::with_backend(Arc::new(MemoryStore::new())).await
    }

    pub async fn with_backend(backend: Arc<dyn KeyValueStore>) -> Self {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let dashboard =
            Dashboard::with_clock(&config_for(&server.uri()), backend, clock.clone()).unwrap();
        dashboard
            .credentials()
            .set_credential(TEST_TOKEN, Persistence::Durable)
            .unwrap();

        TestContext {
            server,
            clock,
            dashboard,
        }
    }
}

pub fn config_for(api_base: &str) -> DashboardConfig {
    DashboardConfig::default().with_api_base(api_base).unwrap()
}

pub fn user_json(login: &str) -> Value {
    json!({
        "login": login,
        "id": 1,
        "avatar_url": format!("https://avatars.example.com/{}", login),
        "html_url": format!("https://github.com/{}", login),
        "name": "Octo Cat",
        "bio": null,
        "email": null,
        "followers": 10,
        "following": 2,
        "public_repos": 8
    })
}

pub fn org_json(id: u64, login: &str) -> Value {
    json!({
        "login": login,
        "id": id,
        "avatar_url": null,
        "description": format!("{} org", login)
    })
}

pub fn repo_json(id: u64, full_name: &str, stars: u32) -> Value {
    let (owner, name) = full_name.split_once('/').unwrap();
    json!({
        "id": id,
        "name": name,
        "full_name": full_name,
        "owner": { "login": owner, "avatar_url": null, "type": "Organization" },
        "description": null,
        "private": false,
        "html_url": format!("https://github.com/{}", full_name),
        "stargazers_count": stars,
        "watchers_count": stars,
        "forks_count": 0,
        "open_issues_count": 0,
        "language": "Rust",
        "updated_at": "2024-01-01T00:00:00Z",
        "created_at": "2023-01-01T00:00:00Z",
        "archived": false
    })
}

/// `count` repositories with ids starting at `first_id`.
pub fn repo_page(first_id: u64, count: u64) -> Value {
    Value::Array(
        (first_id..first_id + count)
            .map(|id| repo_json(id, &format!("octocat/repo-{}", id), 0))
            .collect(),
    )
}
