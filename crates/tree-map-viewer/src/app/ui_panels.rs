//! UI panels for the application
//!
//! Sidebar with filters, legend, fetch status and the tree detail view, plus the
//! small overlays drawn on top of the map.

use crate::app::plugin::to_color32;
use crate::app::state::AppState;
use egui::{Color32, RichText, Ui};
use tree_map_lib::{
    DetailState, MapFilters, MapView, Popup, TreeDetail, TreeHealth, TreeStatus, marker_color,
};

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open {
        "✕"
    } else {
        "☰"
    };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Title bar overlay: tree count and fetch status
pub fn map_header_overlay(ui: &mut Ui, view: &MapView) {
    let rect = ui.max_rect();
    let pos = rect.left_top() + egui::vec2(10.0, 10.0);

    let mut text = format!("Tree Map ({} trees)", view.display_count);
    if view.is_fetching {
        text.push_str("  ⟳");
    }
    let galley = ui.painter().layout_no_wrap(
        text,
        egui::FontId::proportional(15.0),
        Color32::from_gray(20),
    );
    let bg = egui::Rect::from_min_size(pos, galley.size() + egui::vec2(16.0, 10.0));
    ui.painter()
        .rect_filled(bg, 6.0, Color32::from_white_alpha(230));
    ui.painter()
        .galley(bg.min + egui::vec2(8.0, 5.0), galley, Color32::from_gray(20));

    if view.is_loading {
        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            "Loading trees...",
            egui::FontId::proportional(18.0),
            Color32::from_black_alpha(200),
        );
    }
}

/// Cluster popup pinned by a click
pub fn pinned_popup_window(ctx: &egui::Context, state: &mut AppState) {
    let Some(popup @ Popup::Cluster { .. }) = state.pinned_popup.clone() else {
        return;
    };

    let mut open = true;
    egui::Window::new("Tree cluster")
        .collapsible(false)
        .resizable(false)
        .open(&mut open)
        .anchor(egui::Align2::LEFT_BOTTOM, [10.0, -30.0])
        .show(ctx, |ui| {
            for (i, line) in popup.text().lines().enumerate() {
                if i == 0 {
                    ui.label(RichText::new(line).strong());
                } else {
                    ui.label(RichText::new(line).small().weak());
                }
            }
        });
    if !open {
        state.pinned_popup = None;
    }
}

/// Render the main sidebar
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState, view: &MapView) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    egui::SidePanel::right("main_sidebar")
        .default_width(320.0)
        .min_width(260.0)
        .max_width(450.0)
        .resizable(true)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    render_filters_section(ui, state);
                    ui.add_space(8.0);
                    ui.separator();
                    render_status_section(ui, state, view);
                    ui.add_space(8.0);
                    ui.separator();
                    if state.ui_settings.show_legend {
                        render_legend_section(ui);
                        ui.add_space(8.0);
                        ui.separator();
                    }
                    render_detail_section(ui, state);
                });
        });
}

fn render_filters_section(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("🔎 Filters").strong());
    ui.add_space(6.0);

    let mut filters: MapFilters = state.service.filters();

    egui::Grid::new("filters_grid")
        .num_columns(2)
        .spacing([12.0, 8.0])
        .show(ui, |ui| {
            ui.label("Status:");
            egui::ComboBox::from_id_salt("status_filter")
                .selected_text(filters.status.map_or("All", |s| s.label()))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut filters.status, None, "All");
                    for status in TreeStatus::all() {
                        ui.selectable_value(&mut filters.status, Some(*status), status.label());
                    }
                });
            ui.end_row();

            ui.label("Health:");
            egui::ComboBox::from_id_salt("health_filter")
                .selected_text(filters.health.map_or("All", |h| h.label()))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut filters.health, None, "All");
                    for health in TreeHealth::all() {
                        ui.selectable_value(&mut filters.health, Some(*health), health.label());
                    }
                });
            ui.end_row();
        });

    if filters != state.service.filters() {
        state.update_filters(filters);
    }

    ui.add_space(4.0);
    ui.horizontal(|ui| {
        if ui
            .add_enabled(!filters.is_empty(), egui::Button::new("Clear filters"))
            .clicked()
        {
            state.update_filters(MapFilters::default());
        }
        if ui.button("⟳ Reload").clicked() {
            state.reload();
        }
    });
}

fn render_status_section(ui: &mut Ui, state: &mut AppState, view: &MapView) {
    ui.label(RichText::new("📊 Map").strong());
    ui.add_space(4.0);

    egui::Grid::new("status_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Zoom:");
            ui.label(RichText::new(format!("{:.1}", view.zoom)).strong());
            ui.end_row();

            ui.label("Mode:");
            let mode = if view.use_clusters {
                "Clusters"
            } else {
                "Individual trees"
            };
            ui.label(RichText::new(mode).strong());
            ui.end_row();

            ui.label("Trees:");
            ui.label(RichText::new(view.display_count.to_string()).strong());
            ui.end_row();

            ui.label("Data:");
            let color = if view.is_fetching {
                ui.visuals().warn_fg_color
            } else if view.from_cache {
                Color32::GREEN
            } else {
                ui.visuals().text_color()
            };
            ui.label(RichText::new(view.status_text()).color(color));
            ui.end_row();

            if state.ui_settings.show_cache_stats {
                let stats = state.service.stats();
                ui.label("Fetches:");
                ui.label(stats.fetches_issued.to_string());
                ui.end_row();

                ui.label("Cache hits:");
                ui.label(stats.cache_hits.to_string());
                ui.end_row();

                ui.label("Discarded:");
                ui.label(stats.stale_discarded.to_string());
                ui.end_row();
            }
        });

    if view.use_clusters {
        ui.add_space(4.0);
        ui.label(
            RichText::new(format!(
                "Zoom to {:.0}+ to see individual trees",
                state.service.policy().cluster_zoom_threshold
            ))
            .small()
            .weak(),
        );
    }

    if let Some(error) = &view.error {
        ui.add_space(4.0);
        ui.label(
            RichText::new(format!("⚠ {error}"))
                .small()
                .color(Color32::RED),
        );
    }

    ui.add_space(4.0);
    ui.horizontal(|ui| {
        ui.checkbox(&mut state.ui_settings.show_legend, "Legend");
        ui.checkbox(&mut state.ui_settings.show_cache_stats, "Cache stats");
    });
}

fn legend_row(ui: &mut Ui, color: Color32, label: &str) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
        ui.painter().circle(
            rect.center(),
            6.0,
            color,
            egui::Stroke::new(1.0, Color32::WHITE),
        );
        ui.label(RichText::new(label).small());
    });
}

fn render_legend_section(ui: &mut Ui) {
    ui.label(RichText::new("🎨 Legend").strong());
    ui.add_space(4.0);

    ui.label(RichText::new("Alive trees by health").small().weak());
    for health in TreeHealth::all() {
        let color = to_color32(marker_color(TreeStatus::Alive, *health), 1.0);
        legend_row(ui, color, health.label());
    }

    ui.add_space(4.0);
    ui.label(RichText::new("Other trees by status").small().weak());
    for status in TreeStatus::all()
        .iter()
        .filter(|s| **s != TreeStatus::Alive)
    {
        let color = to_color32(marker_color(*status, TreeHealth::Unknown), 1.0);
        legend_row(ui, color, status.label());
    }
}

fn render_detail_section(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("🌳 Tree details").strong());
    ui.add_space(4.0);

    let mut close = false;
    match state.service.detail_state() {
        DetailState::Idle => {
            ui.label(
                RichText::new("Click a tree on the map to see its details")
                    .small()
                    .weak(),
            );
        }
        DetailState::Loading(_) => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Loading tree details...");
            });
        }
        DetailState::Loaded(detail) => {
            render_detail(ui, detail);
            close = ui.button("Close").clicked();
        }
        other @ (DetailState::NotFound(_) | DetailState::Failed(..)) => {
            ui.label(
                RichText::new(other.message().unwrap_or_default())
                    .color(ui.visuals().warn_fg_color),
            );
            close = ui.button("Close").clicked();
        }
    }

    if close {
        state.service.clear_selection();
    }
}

fn render_detail(ui: &mut Ui, detail: &TreeDetail) {
    ui.label(RichText::new(&detail.tree_code).strong().monospace());
    ui.label(RichText::new(detail.title()).italics());
    ui.add_space(4.0);

    let color = to_color32(marker_color(detail.status, detail.health), 1.0);
    ui.horizontal(|ui| {
        ui.label(RichText::new(detail.status.label()).color(color).strong());
        ui.label(RichText::new(detail.health.label()).color(color));
    });
    ui.add_space(4.0);

    egui::Grid::new("detail_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            let mut row = |label: &str, value: Option<String>| {
                if let Some(value) = value {
                    ui.label(label);
                    ui.label(value);
                    ui.end_row();
                }
            };
            row("Common name:", Some(detail.common_name.clone()).filter(|s| !s.is_empty()));
            row("Address:", detail.address.clone());
            row("Barangay:", detail.barangay.clone());
            row(
                "Location:",
                detail
                    .latitude
                    .zip(detail.longitude)
                    .map(|(lat, lng)| format!("{lat:.5}, {lng:.5}")),
            );
            row("Height:", detail.height_meters.map(|h| format!("{h:.1} m")));
            row("Diameter:", detail.diameter_cm.map(|d| format!("{d:.0} cm")));
            row("Age:", detail.age_years.map(|a| format!("{a} years")));
            row("Planted:", detail.planted_date.clone());
            row("Cut:", detail.cutting_date.clone());
            row("Cut reason:", detail.cutting_reason.clone());
            row("Managed by:", detail.managed_by.clone());
            row("Contact:", detail.contact_person.clone());
            row("Phone:", detail.contact_number.clone());
        });

    if let Some(notes) = &detail.notes {
        ui.add_space(4.0);
        ui.label(RichText::new(notes).small());
    }

    if !detail.photos.is_empty() {
        ui.add_space(4.0);
        ui.label(RichText::new(format!("📷 Photos ({})", detail.photos.len())).small());
        for photo in &detail.photos {
            ui.hyperlink_to(RichText::new(&photo.filename).small(), &photo.url);
        }
    }
}
