use serde::Serialize;

use crate::app::games::find_profile;
use crate::app::models::{GameProfile, PackageSource};
use crate::app::settings::SettingsView;

/// Everything the panel shows, owned by the caller and handed to each entry point.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PanelState {
    pub packages: Vec<String>,
    pub package_source: Option<PackageSource>,
    pub active_games: Vec<GameProfile>,
    pub settings: Option<SettingsView>,
    pub search_query: String,
    /// Filled by the first successful governor read; the node list does not change until reboot.
    pub governors: Option<Vec<String>>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_search_query(&mut self, query: &str) {
        self.search_query = query.trim().to_lowercase();
    }

    pub fn profile_for(&self, package: &str) -> Option<&GameProfile> {
        find_profile(&self.active_games, package)
    }

    /// Packages matching the search query, managed ones first, each group ascending.
    pub fn filtered_packages(&self) -> Vec<&str> {
        let query = self.search_query.to_lowercase();
        let mut result = self
            .packages
            .iter()
            .map(String::as_str)
            .filter(|pkg| pkg.to_lowercase().contains(&query))
            .collect::<Vec<_>>();
        result.sort_by(|a, b| {
            let a_managed = self.profile_for(a).is_some();
            let b_managed = self.profile_for(b).is_some();
            b_managed.cmp(&a_managed).then_with(|| a.cmp(b))
        });
        result
    }
}
