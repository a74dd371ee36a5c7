//! Fan-out over the user's own repositories and every organization's
//! repositories, merged into one list keyed by repository id.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::{cache_keys, CacheClass};
use crate::error::Result;
use crate::github::GitHubClient;
use crate::models::{Organization, Repository};
use crate::sync::Synchronizer;

/// Merges repository lists in order, deduplicating by `id`.
///
/// A repository keeps the position where its id first appeared, but the
/// copy from the latest list wins. With `[user, org1, org2, ...]` ordering,
/// organization data shadows user data for the same id.
pub fn merge_repositories<I>(lists: I) -> Vec<Repository>
where
    I: IntoIterator<Item = Vec<Repository>>,
{
    let mut merged: Vec<Repository> = Vec::new();
    let mut positions: HashMap<u64, usize> = HashMap::new();

    for repo in lists.into_iter().flatten() {
        match positions.get(&repo.id) {
            Some(&index) => merged[index] = repo,
            None => {
                positions.insert(repo.id, merged.len());
                merged.push(repo);
            }
        }
    }

    merged
}

/// Fetches one organization's repositories through its own cache entry.
/// Failures are logged and yield an empty list, except a rejected or missing
/// credential, which fails the whole aggregate.
async fn organization_branch(
    client: &GitHubClient,
    sync: &Synchronizer,
    org: &Organization,
    force_refresh: bool,
) -> Result<Vec<Repository>> {
    let key = cache_keys::org_repos(&org.login);
    let result = sync
        .sync(&key, CacheClass::Repositories, force_refresh, || {
            client.organization_repositories(&org.login)
        })
        .await;

    match result {
        Ok(synced) => Ok(synced.data),
        Err(e) if e.requires_reauthentication() => Err(e),
        Err(e) => {
            warn!(org = %org.login, error = %e, "Organization repositories unavailable, continuing without them");
            Ok(Vec::new())
        }
    }
}

/// Builds the unified repository list.
///
/// The user's own repository fetch must succeed; each organization fetch
/// runs concurrently and may fail on its own without failing the whole.
pub async fn fetch_all_repositories(
    client: &GitHubClient,
    sync: &Synchronizer,
    organizations: &[Organization],
    force_refresh: bool,
) -> Result<Vec<Repository>> {
    let user_repos_fut = client.user_repositories();
    let org_futs = join_all(
        organizations
            .iter()
            .map(|org| organization_branch(client, sync, org, force_refresh)),
    );

    let (user_repos, org_results) = futures::join!(user_repos_fut, org_futs);
    let org_repos = org_results.into_iter().collect::<Result<Vec<_>>>()?;
    let user_repos = user_repos?;

    let org_total: usize = org_repos.iter().map(Vec::len).sum();
    let merged = merge_repositories(std::iter::once(user_repos).chain(org_repos));

    info!(
        organizations = organizations.len(),
        org_total,
        total = merged.len(),
        "Merged repository list"
    );

    Ok(merged)
}
