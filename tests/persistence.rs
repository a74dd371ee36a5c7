mod common;

use std::path::Path;
use std::sync::Arc;

use common::{config_for, org_json, TestContext, TEST_TOKEN};
use github_dashboard_cache::credentials::Persistence;
use github_dashboard_cache::models::{SettingsPatch, Theme, ViewMode};
use github_dashboard_cache::store::{FileStore, DEFAULT_QUOTA_BYTES};
use github_dashboard_cache::sync::Freshness;
use github_dashboard_cache::Dashboard;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn open_store(path: &Path) -> Arc<FileStore> {
    Arc::new(FileStore::open(path, DEFAULT_QUOTA_BYTES).unwrap())
}

#[tokio::test]
async fn test_state_survives_reopening_the_store() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("store.json");

    {
        let ctx = TestContext::with_backend(open_store(&store_path)).await;
        Mock::given(method("GET"))
            .and(path("/user/orgs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([org_json(10, "acme")])))
            .expect(1)
            .mount(&ctx.server)
            .await;

        ctx.dashboard.sync_organizations(false).await.unwrap();
        ctx.dashboard
            .update_settings(&SettingsPatch {
                theme: Some(Theme::Dark),
                ..Default::default()
            })
            .unwrap();
    }

    let ctx = TestContext::with_backend(open_store(&store_path)).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.server)
        .await;

    let organizations = ctx.dashboard.sync_organizations(false).await.unwrap();
    assert_eq!(organizations.freshness, Freshness::Cached);
    assert_eq!(organizations.data[0].login, "acme");
    assert_eq!(ctx.dashboard.settings().unwrap().theme, Theme::Dark);
}

#[test]
fn test_durable_token_persists_and_ephemeral_does_not() {
    let dir = TempDir::new().unwrap();
    let durable_path = dir.path().join("durable.json");
    let ephemeral_path = dir.path().join("ephemeral.json");
    let config = config_for("http://127.0.0.1:1");

    {
        let durable = Dashboard::new(&config, open_store(&durable_path)).unwrap();
        durable
            .credentials()
            .set_credential(TEST_TOKEN, Persistence::Durable)
            .unwrap();
        let ephemeral = Dashboard::new(&config, open_store(&ephemeral_path)).unwrap();
        ephemeral
            .credentials()
            .set_credential(TEST_TOKEN, Persistence::Ephemeral)
            .unwrap();
        assert!(ephemeral.credentials().has_credential());
    }

    let durable = Dashboard::new(&config, open_store(&durable_path)).unwrap();
    let ephemeral = Dashboard::new(&config, open_store(&ephemeral_path)).unwrap();

    assert_eq!(
        durable.credentials().token().unwrap().as_deref(),
        Some(TEST_TOKEN)
    );
    assert!(!ephemeral.credentials().has_credential());
}

#[test]
fn test_export_import_between_stores() {
    let dir = TempDir::new().unwrap();
    let config = config_for("http://127.0.0.1:1");

    let source = Dashboard::new(&config, open_store(&dir.path().join("a.json"))).unwrap();
    source
        .update_settings(&SettingsPatch {
            view_mode: Some(ViewMode::Compact),
            ..Default::default()
        })
        .unwrap();
    let snapshot = source.export().unwrap();
    let encoded = serde_json::to_string(&snapshot).unwrap();

    let target = Dashboard::new(&config, open_store(&dir.path().join("b.json"))).unwrap();
    let summary = target.import(&serde_json::from_str(&encoded).unwrap()).unwrap();

    assert!(summary.dashboard_settings);
    assert_eq!(target.settings().unwrap().view_mode, ViewMode::Compact);
    assert!(!target.credentials().has_credential());
}

#[test]
fn test_usage_grows_with_writes() {
    let dir = TempDir::new().unwrap();
    let dashboard = Dashboard::new(
        &config_for("http://127.0.0.1:1"),
        open_store(&dir.path().join("store.json")),
    )
    .unwrap();

    let before = dashboard.storage_usage().unwrap();
    dashboard
        .update_settings(&SettingsPatch {
            theme: Some(Theme::Light),
            ..Default::default()
        })
        .unwrap();
    let after = dashboard.storage_usage().unwrap();

    assert_eq!(before.used_bytes, 0);
    assert!(after.used_bytes > 0);
    assert_eq!(after.quota_bytes, DEFAULT_QUOTA_BYTES);
    assert!(after.percent > 0.0 && after.percent < 1.0);
}
