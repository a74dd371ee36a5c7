use crate::cache::TtlCache;
use crate::error::Result;
use crate::models::{DashboardSettings, SettingsPatch};
use crate::store::keys;

#[derive(Clone)]
pub struct Settings {
    cache: TtlCache,
}

impl Settings {
    pub fn new(cache: TtlCache) -> Self {
        Self { cache }
    }

    /// Current settings. Stored fields are layered over the defaults, so a
    /// record written by an older version with fewer fields still loads.
    pub fn get(&self) -> Result<DashboardSettings> {
        let stored: Option<SettingsPatch> = self.cache.store().get_json(keys::DASHBOARD_SETTINGS)?;
        Ok(match stored {
            Some(patch) => DashboardSettings::default().merged(&patch),
            None => DashboardSettings::default(),
        })
    }

    /// Shallow-merges `patch` over the current settings and persists the result.
    pub fn update(&self, patch: &SettingsPatch) -> Result<DashboardSettings> {
        let settings = self.get()?.merged(patch);
        self.cache
            .store()
            .set_json(keys::DASHBOARD_SETTINGS, &settings, self.cache.now())?;
        Ok(settings)
    }

    pub fn reset(&self) -> Result<()> {
        self.cache.store().remove(keys::DASHBOARD_SETTINGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Theme, ViewMode};
    use crate::store::StoreAdapter;

    fn settings() -> Settings {
        Settings::new(TtlCache::with_system_clock(StoreAdapter::in_memory()))
    }

    #[test]
    fn test_defaults_when_nothing_stored() {
        assert_eq!(settings().get().unwrap(), DashboardSettings::default());
    }

    #[test]
    fn test_theme_update_keeps_other_fields() {
        let settings = settings();
        settings
            .update(&SettingsPatch {
                view_mode: Some(ViewMode::Compact),
                refresh_interval: Some(120),
                auto_refresh: Some(false),
                ..Default::default()
            })
            .unwrap();
        let before = settings.get().unwrap();

        settings
            .update(&SettingsPatch {
                theme: Some(Theme::Dark),
                ..Default::default()
            })
            .unwrap();
        let after = settings.get().unwrap();

        assert_eq!(after.theme, Theme::Dark);
        assert_eq!(
            after,
            DashboardSettings {
                theme: Theme::Dark,
                ..before
            }
        );
    }

    #[test]
    fn test_reset_restores_defaults() {
        let settings = settings();
        settings
            .update(&SettingsPatch {
                theme: Some(Theme::Light),
                ..Default::default()
            })
            .unwrap();
        settings.reset().unwrap();
        assert_eq!(settings.get().unwrap().theme, Theme::Auto);
    }
}
