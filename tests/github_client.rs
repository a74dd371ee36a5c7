mod common;

use common::{config_for, org_json, repo_page, user_json, TestContext, TEST_TOKEN};
use github_dashboard_cache::cache::TtlCache;
use github_dashboard_cache::credentials::{Credentials, Persistence};
use github_dashboard_cache::github::GitHubClient;
use github_dashboard_cache::store::StoreAdapter;
use github_dashboard_cache::DashboardError;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn get_test_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN").ok()
}

fn signed_in_client(api_base: &str) -> GitHubClient {
    let credentials = Credentials::new(TtlCache::with_system_clock(StoreAdapter::in_memory()));
    credentials
        .set_credential(TEST_TOKEN, Persistence::Durable)
        .unwrap();
    GitHubClient::new(&config_for(api_base), credentials).unwrap()
}

#[tokio::test]
async fn test_sends_bearer_token_and_accept_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer ghp_test_token"))
        .and(header("Accept", "application/vnd.github.v3+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("octocat")))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server.uri());
    let user = client.current_user().await.unwrap();

    assert_eq!(user.login, "octocat");
    assert_eq!(user.followers, 10);
}

#[tokio::test]
async fn test_pagination_stops_on_short_page() {
    let server = MockServer::start().await;
    for (page, first_id, count) in [("1", 1, 100), ("2", 101, 100), ("3", 201, 37)] {
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("per_page", "100"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_page(first_id, count)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = signed_in_client(&server.uri());
    let repos = client.user_repositories().await.unwrap();

    assert_eq!(repos.len(), 237);
    assert_eq!(repos[0].id, 1);
    assert_eq!(repos[236].id, 237);
}

#[tokio::test]
async fn test_full_last_page_costs_one_empty_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/orgs"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            (1..=100)
                .map(|id| org_json(id, &format!("org-{}", id)))
                .collect::<Vec<_>>(),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/orgs"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server.uri());
    let orgs = client.user_organizations().await.unwrap();

    assert_eq!(orgs.len(), 100);
    assert_eq!(orgs[0].url, "https://github.com/org-1");
}

#[tokio::test]
async fn test_unauthorized_clears_credential() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&ctx.server)
        .await;

    let result = ctx.dashboard.client().current_user().await;

    assert!(matches!(result, Err(DashboardError::InvalidCredential)));
    assert!(!ctx.dashboard.credentials().has_credential());
}

#[tokio::test]
async fn test_forbidden_with_exhausted_quota() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "0")
                .insert_header("X-RateLimit-Limit", "5000")
                .insert_header("X-RateLimit-Reset", "1700000000"),
        )
        .mount(&ctx.server)
        .await;

    let result = ctx.dashboard.client().current_user().await;

    match result {
        Err(DashboardError::QuotaExceeded { reset_at }) => {
            assert!(reset_at.starts_with("2023-11-14T22:13:20"));
        }
        other => panic!("Expected QuotaExceeded, got: {:?}", other),
    }
    assert!(ctx.dashboard.client().rate_limit().unwrap().is_limited);
    // A quota error does not mean the token is bad.
    assert!(ctx.dashboard.credentials().has_credential());
}

#[tokio::test]
async fn test_forbidden_without_quota_signal() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/orgs/secret/repos"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("X-RateLimit-Remaining", "4999")
                .set_body_string("Resource not accessible by integration"),
        )
        .mount(&ctx.server)
        .await;

    let result = ctx
        .dashboard
        .client()
        .organization_repositories("secret")
        .await;

    match result {
        Err(DashboardError::Forbidden(message)) => {
            assert!(message.contains("not accessible"));
        }
        other => panic!("Expected Forbidden, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&ctx.server)
        .await;

    let client = ctx.dashboard.client();
    match client.repository("octocat", "missing").await {
        Err(DashboardError::ApiError { status, .. }) => assert_eq!(status, 404),
        other => panic!("Expected ApiError, got: {:?}", other),
    }
    match client.current_user().await {
        Err(err @ DashboardError::ApiError { status: 500, .. }) => assert!(err.is_retryable()),
        other => panic!("Expected ApiError, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let client = signed_in_client("http://127.0.0.1:1");
    let result = client.current_user().await;

    match result {
        Err(err @ DashboardError::NetworkError(_)) => assert!(err.is_retryable()),
        other => panic!("Expected NetworkError, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_no_credential_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let credentials = Credentials::new(TtlCache::with_system_clock(StoreAdapter::in_memory()));
    let client = GitHubClient::new(&config_for(&server.uri()), credentials).unwrap();

    assert!(matches!(
        client.user_repositories().await,
        Err(DashboardError::NoCredential)
    ));
}

#[tokio::test]
async fn test_issues_exclude_pull_requests() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/repos/octocat/hello/issues"))
        .and(query_param("state", "open"))
        .and(query_param("per_page", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 1, "number": 10, "title": "Crash on start", "state": "open",
                "user": { "login": "alice" }, "comments": 3,
                "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z",
                "html_url": "https://github.com/octocat/hello/issues/10"
            },
            {
                "id": 2, "number": 11, "title": "Fix crash", "state": "open",
                "user": { "login": "bob" }, "comments": 0,
                "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z",
                "html_url": "https://github.com/octocat/hello/pull/11",
                "pull_request": { "url": "https://api.github.com/repos/octocat/hello/pulls/11" }
            }
        ])))
        .mount(&ctx.server)
        .await;

    let issues = ctx.dashboard.client().issues("octocat", "hello").await.unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].number, 10);
    assert_eq!(issues[0].author_login.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_rate_limit_status() {
    let ctx = TestContext::new().await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": {
                "core": { "limit": 5000, "remaining": 4321, "reset": 1700000000, "used": 679 }
            }
        })))
        .mount(&ctx.server)
        .await;

    let state = ctx.dashboard.rate_limit_status().await.unwrap();

    assert_eq!(state.remaining, 4321);
    assert_eq!(state.limit, 5000);
    assert!(!state.is_limited);
    assert_eq!(state.reset_time.timestamp(), 1_700_000_000);
}

#[tokio::test]
#[ignore = "Requires valid GitHub token"]
async fn test_live_current_user() {
    let token = get_test_token().expect("GITHUB_TOKEN not set");
    let credentials = Credentials::new(TtlCache::with_system_clock(StoreAdapter::in_memory()));
    credentials.set_credential(&token, Persistence::Ephemeral).unwrap();
    let client = GitHubClient::new(&Default::default(), credentials).expect("Failed to create client");

    let user = client.current_user().await.expect("Failed to get user");
    assert!(!user.login.is_empty());

    let rate_limit = client.rate_limit().expect("No rate limit headers");
    println!("Rate limit state:");
    println!("  Remaining: {}/{}", rate_limit.remaining, rate_limit.limit);
    println!("  Reset time: {}", rate_limit.reset_time);
}

#[tokio::test]
#[ignore = "Requires valid GitHub token"]
async fn test_live_repository() {
    let token = get_test_token().expect("GITHUB_TOKEN not set");
    let credentials = Credentials::new(TtlCache::with_system_clock(StoreAdapter::in_memory()));
    credentials.set_credential(&token, Persistence::Ephemeral).unwrap();
    let client = GitHubClient::new(&Default::default(), credentials).expect("Failed to create client");

    let repo = client
        .repository("rust-lang", "rust")
        .await
        .expect("Failed to get repository info");

    assert_eq!(repo.name, "rust");
    assert_eq!(repo.full_name, "rust-lang/rust");
    assert!(repo.stargazers_count > 0);
    assert!(!repo.html_url.is_empty());
}
