use tracing::info;

use crate::cache::TtlCache;
use crate::error::{DashboardError, Result};
use crate::models::{Repository, TrackedRepoEntry};
use crate::store::keys;

/// The user's curated repository list. Refreshes never touch it.
#[derive(Clone)]
pub struct TrackedRepos {
    cache: TtlCache,
}

impl TrackedRepos {
    pub fn new(cache: TtlCache) -> Self {
        Self { cache }
    }

    fn load(&self) -> Result<Vec<TrackedRepoEntry>> {
        Ok(self
            .cache
            .store()
            .get_json(keys::TRACKED_REPOS)?
            .unwrap_or_default())
    }

    fn save(&self, entries: &[TrackedRepoEntry]) -> Result<()> {
        self.cache
            .store()
            .set_json(keys::TRACKED_REPOS, entries, self.cache.now())
    }

    /// Pinned entries first, then alphabetical by full name.
    pub fn list(&self) -> Result<Vec<TrackedRepoEntry>> {
        let mut entries = self.load()?;
        entries.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| a.full_name.to_lowercase().cmp(&b.full_name.to_lowercase()))
        });
        Ok(entries)
    }

    pub fn get(&self, id: u64) -> Result<Option<TrackedRepoEntry>> {
        Ok(self.load()?.into_iter().find(|entry| entry.id == id))
    }

    pub fn find_by_name(&self, full_name: &str) -> Result<Option<TrackedRepoEntry>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|entry| entry.full_name.eq_ignore_ascii_case(full_name)))
    }

    /// Starts tracking `repo`. Returns `false` if it was already tracked.
    pub fn add(&self, repo: &Repository) -> Result<bool> {
        let mut entries = self.load()?;
        if entries.iter().any(|entry| entry.id == repo.id) {
            return Ok(false);
        }
        entries.push(TrackedRepoEntry::from(repo));
        self.save(&entries)?;
        info!(repo = %repo.full_name, "Tracking repository");
        Ok(true)
    }

    /// Stops tracking `id`. Returns `false` if it was not tracked.
    pub fn remove(&self, id: u64) -> Result<bool> {
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    fn update(
        &self,
        id: u64,
        apply: impl FnOnce(&mut TrackedRepoEntry),
    ) -> Result<TrackedRepoEntry> {
        let mut entries = self.load()?;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| DashboardError::NotFound(format!("tracked repository {}", id)))?;
        apply(entry);
        let updated = entry.clone();
        self.save(&entries)?;
        Ok(updated)
    }

    pub fn set_pinned(&self, id: u64, pinned: bool) -> Result<TrackedRepoEntry> {
        self.update(id, |entry| entry.pinned = pinned)
    }

    pub fn set_notes(&self, id: u64, notes: &str) -> Result<TrackedRepoEntry> {
        self.update(id, |entry| entry.notes = notes.to_string())
    }

    /// Replaces the whole list. Used by snapshot import.
    pub fn replace_all(&self, entries: &[TrackedRepoEntry]) -> Result<()> {
        self.save(entries)
    }

    /// Raw stored list, in insertion order.
    pub fn all(&self) -> Result<Vec<TrackedRepoEntry>> {
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OwnerType, RepoOwner};
    use crate::store::StoreAdapter;

    fn repo(id: u64, full_name: &str) -> Repository {
        let (owner, name) = full_name.split_once('/').unwrap();
        Repository {
            id,
            full_name: full_name.to_string(),
            name: name.to_string(),
            owner: RepoOwner {
                login: owner.to_string(),
                avatar_url: None,
                owner_type: OwnerType::Organization,
            },
            owner_type: OwnerType::Organization,
            description: None,
            private: false,
            html_url: String::new(),
            stargazers_count: 0,
            watchers_count: 0,
            forks_count: 0,
            open_issues_count: 0,
            language: None,
            updated_at: None,
            created_at: None,
            archived: false,
        }
    }

    fn tracked() -> TrackedRepos {
        TrackedRepos::new(TtlCache::with_system_clock(StoreAdapter::in_memory()))
    }

    #[test]
    fn test_add_uses_defaults_and_rejects_duplicates() {
        let tracked = tracked();
        assert!(tracked.add(&repo(1, "acme/api")).unwrap());
        assert!(!tracked.add(&repo(1, "acme/api")).unwrap());

        let entry = tracked.get(1).unwrap().unwrap();
        assert!(!entry.pinned);
        assert_eq!(entry.notes, "");
        assert_eq!(entry.owner, "acme");
        assert_eq!(entry.owner_type, OwnerType::Organization);
    }

    #[test]
    fn test_pin_and_notes_then_remove() {
        let tracked = tracked();
        tracked.add(&repo(1, "acme/zeta")).unwrap();
        tracked.add(&repo(2, "acme/alpha")).unwrap();

        tracked.set_pinned(1, true).unwrap();
        tracked.set_notes(2, "deploys on fridays").unwrap();

        let list = tracked.list().unwrap();
        assert_eq!(list[0].id, 1);
        assert_eq!(list[1].notes, "deploys on fridays");

        assert!(tracked.remove(1).unwrap());
        assert!(!tracked.remove(1).unwrap());
        assert_eq!(tracked.list().unwrap().len(), 1);
    }

    #[test]
    fn test_updating_unknown_entry_is_not_found() {
        let tracked = tracked();
        assert!(matches!(
            tracked.set_pinned(42, true),
            Err(DashboardError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let tracked = tracked();
        tracked.add(&repo(9, "Acme/Widget")).unwrap();
        assert_eq!(tracked.find_by_name("acme/widget").unwrap().unwrap().id, 9);
    }
}
