//! Application state management
//!
//! Owns the tree map service and the UI-only settings around it.

use crate::app::settings::Settings;
use std::sync::Arc;
use tree_map_lib::{HttpTreeApi, MapFilters, Popup, TreeMapService};

/// Main application state
pub struct AppState {
    /// Cache, fetch orchestration and detail lookup
    pub service: TreeMapService,

    /// Current UI settings
    pub ui_settings: UiSettings,

    /// Cluster popup pinned by a click
    pub pinned_popup: Option<Popup>,
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone, Debug, PartialEq)]
pub struct UiSettings {
    /// Whether sidebar is open
    pub sidebar_open: bool,

    /// Show the marker color legend
    pub show_legend: bool,

    /// Show cache counters in the status section
    pub show_cache_stats: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            show_legend: true,
            show_cache_stats: false,
        }
    }
}

impl AppState {
    pub fn new(settings: &Settings) -> tree_map_lib::Result<Self> {
        let api = HttpTreeApi::new(settings.api_config())?;
        tracing::info!("Using tree inventory API at {}", api.base_url());

        let service = TreeMapService::new(Arc::new(api), settings.cache_policy())?;

        Ok(Self {
            service,
            ui_settings: UiSettings::default(),
            pinned_popup: None,
        })
    }

    /// Change one filter; the map refetches if the result is not cached
    pub fn update_filters(&mut self, filters: MapFilters) {
        self.pinned_popup = None;
        self.service.set_filters(filters);
    }

    /// Drop all cached data and reload what is on screen
    pub fn reload(&mut self) {
        self.pinned_popup = None;
        self.service.invalidate();
    }
}
