//! Application module
//!
//! Full-screen map with a toggleable sidebar:
//! - Tree and cluster markers served from the viewport-bounds cache
//! - Status and health filters, persisted between runs
//! - Fetch/cache status and a marker legend
//! - Detail panel for the selected tree

mod plugin;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::plugin::{MapFeedback, MarkerHit, TreeMarkersPlugin};
use crate::app::settings::Settings;
use crate::app::state::{AppState, UiSettings};
use eframe::egui;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tree_map_lib::{DetailState, MapFilters};
use walkers::{HttpTiles, Map, MapMemory, sources::OpenStreetMap};

/// How often to redraw while waiting on the network
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Persisted settings (filters, layout and last camera position)
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct PersistedSettings {
    filters: MapFilters,
    sidebar_open: bool,
    show_legend: bool,
    show_cache_stats: bool,
    center_lat: f64,
    center_lng: f64,
    zoom: f64,
}

/// Main application structure
pub struct TreeMapApp {
    /// Application state; `Err` holds a startup error shown instead of the map
    state: Result<AppState, String>,

    /// Map tiles provider (OpenStreetMap)
    tiles: HttpTiles,

    /// Map state (camera position, zoom, etc.)
    map_memory: MapMemory,

    /// Initial center, used until the user moves the map
    home: walkers::Position,

    /// Shared plugin output (updated by the plugin each frame)
    feedback: Arc<Mutex<MapFeedback>>,
}

impl TreeMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let cli_args = Settings::from_cli();

        let persisted = if cli_args.ignore_persisted {
            tracing::info!("Ignoring persisted state (--ignore-persisted flag)");
            None
        } else {
            cc.storage.and_then(Self::load_persisted_settings)
        };

        let (center_lat, center_lng, zoom) = match &persisted {
            Some(p) => (p.center_lat, p.center_lng, p.zoom),
            None => (cli_args.center_lat, cli_args.center_lng, cli_args.zoom),
        };
        let home = walkers::lat_lon(center_lat, center_lng);

        let mut map_memory = MapMemory::default();
        map_memory.center_at(home);
        let _ = map_memory.set_zoom(zoom);

        let state = AppState::new(&cli_args)
            .map(|mut state| {
                if let Some(p) = &persisted {
                    state.ui_settings = UiSettings {
                        sidebar_open: p.sidebar_open,
                        show_legend: p.show_legend,
                        show_cache_stats: p.show_cache_stats,
                    };
                    state.service.set_filters(p.filters);
                }
                state
            })
            .map_err(|e| {
                tracing::error!("Failed to start tree map: {e}");
                e.to_string()
            });

        tracing::info!(
            "Initialized at ({:.4}, {:.4}), zoom {:.1}",
            center_lat,
            center_lng,
            zoom
        );

        Self {
            state,
            tiles: HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone()),
            map_memory,
            home,
            feedback: Arc::new(Mutex::new(MapFeedback::default())),
        }
    }

    /// Load persisted settings from storage
    fn load_persisted_settings(storage: &dyn eframe::Storage) -> Option<PersistedSettings> {
        let json = storage.get_string("persisted_settings")?;
        match serde_json::from_str::<PersistedSettings>(&json) {
            Ok(settings) => {
                tracing::info!("Restored persisted settings");
                Some(settings)
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable persisted settings: {e}");
                None
            }
        }
    }

    /// Hand the plugin's frame and click over to the service
    fn apply_feedback(&mut self, state: &mut AppState) {
        let (frame, clicked) = match self.feedback.lock() {
            Ok(mut feedback) => (feedback.frame.take(), feedback.clicked.take()),
            Err(_) => return,
        };

        if let Some(frame) = frame {
            state.service.observe(frame);
        }

        match clicked {
            Some(MarkerHit::Tree(id)) => {
                tracing::debug!(%id, "Tree selected");
                state.pinned_popup = None;
                state.service.select_tree(&id);
                state.ui_settings.sidebar_open = true;
            }
            Some(MarkerHit::Cluster(popup)) => state.pinned_popup = Some(popup),
            Some(MarkerHit::Background) => state.pinned_popup = None,
            None => {}
        }
    }
}

#[profiling::all_functions]
impl eframe::App for TreeMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Temporarily take the state out so the map can borrow the rest of `self`
        let mut state = match std::mem::replace(&mut self.state, Err(String::new())) {
            Ok(state) => state,
            Err(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Tree Map Viewer");
                    ui.colored_label(egui::Color32::RED, &message);
                });
                self.state = Err(message);
                return;
            }
        };

        // Apply finished fetches before drawing
        state.service.poll();

        let view = state.service.view();

        ui_panels::render_sidebar(ctx, &mut state, &view);
        ui_panels::pinned_popup_window(ctx, &mut state);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let plugin = TreeMarkersPlugin::new(view.markers.clone(), self.feedback.clone());
                let map = Map::new(Some(&mut self.tiles), &mut self.map_memory, self.home)
                    .with_plugin(plugin);
                ui.add(map);

                ui_panels::map_header_overlay(ui, &view);
                ui_panels::sidebar_toggle_button(ui, &mut state);

                let screen_rect = ui.max_rect();
                ui.painter().text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    "© OpenStreetMap contributors",
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });

        self.apply_feedback(&mut state);

        // Keep frames coming while the view settles or a response is due
        if state.service.is_settling() {
            ctx.request_repaint();
        } else if state.service.is_fetching()
            || matches!(state.service.detail_state(), DetailState::Loading(_))
        {
            ctx.request_repaint_after(POLL_INTERVAL);
        }

        self.state = Ok(state);
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let Ok(state) = &self.state else {
            return;
        };

        let (center_lat, center_lng, zoom) = match state.service.viewport() {
            Some(viewport) => {
                let (lat, lng) = viewport.bounds.center();
                (lat, lng, viewport.zoom)
            }
            None => (self.home.y(), self.home.x(), self.map_memory.zoom()),
        };

        let settings = PersistedSettings {
            filters: state.service.filters(),
            sidebar_open: state.ui_settings.sidebar_open,
            show_legend: state.ui_settings.show_legend,
            show_cache_stats: state.ui_settings.show_cache_stats,
            center_lat,
            center_lng,
            zoom,
        };

        if let Ok(json) = serde_json::to_string(&settings) {
            storage.set_string("persisted_settings", json);
            tracing::debug!("Saved settings on exit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_map_lib::{TreeHealth, TreeStatus};

    #[test]
    fn test_persisted_settings_json() {
        let settings = PersistedSettings {
            filters: MapFilters {
                status: Some(TreeStatus::Alive),
                health: Some(TreeHealth::Diseased),
            },
            sidebar_open: false,
            show_legend: true,
            show_cache_stats: true,
            center_lat: 15.0287,
            center_lng: 120.688,
            zoom: 14.0,
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"status\":\"alive\""));
        assert!(json.contains("\"health\":\"diseased\""));
        let back: PersistedSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
