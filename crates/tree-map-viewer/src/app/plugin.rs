//! Walkers plugin for drawing tree markers on the map view
//!
//! The plugin is rebuilt every frame from the current marker snapshot. It draws
//! the markers, and reports the frame's viewport and any marker click back to the
//! app through shared [`MapFeedback`].

use egui::{Color32, Pos2, Stroke};
use std::sync::{Arc, Mutex};
use tree_map_lib::{MapFrame, Marker, MarkerColor, Popup, ViewportBounds};
use walkers::{Plugin, Projector};

/// What a click on the map hit
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerHit {
    Tree(String),
    Cluster(Popup),
    Background,
}

/// Written by the plugin each frame, consumed by the app
#[derive(Debug, Default)]
pub struct MapFeedback {
    pub frame: Option<MapFrame>,
    pub clicked: Option<MarkerHit>,
}

/// Plugin for rendering tree and cluster markers
pub struct TreeMarkersPlugin {
    markers: Vec<Arc<Marker>>,
    feedback: Arc<Mutex<MapFeedback>>,
}

impl TreeMarkersPlugin {
    pub fn new(markers: Vec<Arc<Marker>>, feedback: Arc<Mutex<MapFeedback>>) -> Self {
        Self { markers, feedback }
    }

    fn viewport(response: &egui::Response, projector: &Projector) -> Option<ViewportBounds> {
        let rect = response.rect;
        let top_left = projector.unproject(egui::Vec2::new(rect.min.x, rect.min.y));
        let bottom_right = projector.unproject(egui::Vec2::new(rect.max.x, rect.max.y));
        ViewportBounds::from_corners(
            top_left.y(),
            top_left.x(),
            bottom_right.y(),
            bottom_right.x(),
        )
        .ok()
    }

    fn draw_marker(painter: &egui::Painter, marker: &Marker, center: Pos2) {
        let fill = to_color32(marker.style.fill, marker.style.fill_opacity);
        let stroke = Stroke::new(
            marker.style.stroke_width,
            to_color32(marker.style.stroke, 1.0),
        );
        painter.circle(center, marker.radius, fill, stroke);

        if let Popup::Cluster { tree_count, .. } = &marker.popup {
            painter.text(
                center,
                egui::Align2::CENTER_CENTER,
                tree_count.to_string(),
                egui::FontId::proportional((marker.radius * 0.6).clamp(11.0, 18.0)),
                Color32::WHITE,
            );
        }
    }

    fn draw_popup(painter: &egui::Painter, anchor: Pos2, popup: &Popup) {
        let galley = painter.layout_no_wrap(
            popup.text(),
            egui::FontId::proportional(13.0),
            Color32::from_gray(20),
        );
        let rect = egui::Rect::from_min_size(
            anchor + egui::vec2(12.0, 12.0),
            galley.size() + egui::vec2(12.0, 8.0),
        );
        painter.rect_filled(rect, 4.0, Color32::from_white_alpha(235));
        painter.galley(rect.min + egui::vec2(6.0, 4.0), galley, Color32::from_gray(20));
    }
}

impl Plugin for TreeMarkersPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("TreeMarkersPlugin::run");

        let painter = ui.painter();

        let screen: Vec<(Pos2, f32)> = self
            .markers
            .iter()
            .map(|marker| {
                let v = projector.project(walkers::lat_lon(marker.lat, marker.lng));
                (Pos2::new(v.x, v.y), marker.radius)
            })
            .collect();

        {
            profiling::scope!("draw_markers");
            for (marker, (center, _)) in self.markers.iter().zip(&screen) {
                Self::draw_marker(painter, marker, *center);
            }
        }

        if let Some(pointer) = response.hover_pos()
            && let Some(idx) = hit_test(&screen, pointer)
        {
            Self::draw_popup(painter, pointer, &self.markers[idx].popup);
        }

        let clicked = if response.clicked() {
            response.interact_pointer_pos().map(|pointer| {
                match hit_test(&screen, pointer).map(|idx| &self.markers[idx]) {
                    Some(marker) => match marker.tree_id() {
                        Some(id) => MarkerHit::Tree(id.to_string()),
                        None => MarkerHit::Cluster(marker.popup.clone()),
                    },
                    None => MarkerHit::Background,
                }
            })
        } else {
            None
        };

        let interacting = response.dragged()
            || response.is_pointer_button_down_on()
            || ui.input(|i| i.smooth_scroll_delta != egui::Vec2::ZERO || i.zoom_delta() != 1.0);
        let frame = Self::viewport(response, projector).map(|bounds| MapFrame {
            bounds,
            zoom: map_memory.zoom(),
            interacting,
        });

        if let Ok(mut feedback) = self.feedback.lock() {
            feedback.frame = frame;
            if clicked.is_some() {
                feedback.clicked = clicked;
            }
        }
    }
}

/// Index of the top-most marker under `pointer`
///
/// Markers are drawn in order, so later ones are on top.
pub fn hit_test(screen: &[(Pos2, f32)], pointer: Pos2) -> Option<usize> {
    screen
        .iter()
        .enumerate()
        .rev()
        .find(|(_, (center, radius))| center.distance(pointer) <= *radius)
        .map(|(idx, _)| idx)
}

pub fn to_color32(color: MarkerColor, opacity: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(
        color.r,
        color.g,
        color.b,
        (opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_test_prefers_top_marker() {
        let screen = vec![
            (Pos2::new(100.0, 100.0), 20.0),
            (Pos2::new(110.0, 100.0), 8.0),
        ];
        assert_eq!(hit_test(&screen, Pos2::new(112.0, 101.0)), Some(1));
        assert_eq!(hit_test(&screen, Pos2::new(90.0, 100.0)), Some(0));
        assert_eq!(hit_test(&screen, Pos2::new(200.0, 200.0)), None);
    }

    #[test]
    fn test_marker_color_conversion() {
        let c = to_color32(MarkerColor::GREEN, 1.0);
        assert_eq!(c, Color32::from_rgb(0x22, 0xc5, 0x5e));
        assert_eq!(to_color32(MarkerColor::BLUE, 0.8).a(), 204);
    }
}
