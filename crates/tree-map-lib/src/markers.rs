//! Marker construction and memoization
//!
//! [`render_markers`] is a pure function from map data to drawable markers.
//! [`MarkerMemo`] wraps it with an identity cache so that unrelated redraws hand
//! back the very same `Arc<Marker>` objects instead of rebuilding them. The memo
//! runs over the whole cached entry; [`in_viewport`] then picks the visible
//! markers, so panning never changes a marker's identity.

use crate::cache::MapData;
use crate::{TreeCluster, TreeHealth, TreeMapItem, TreeStatus, ViewportBounds};
use std::collections::HashMap;
use std::sync::Arc;

/// Radius of an individual tree marker
pub const TREE_MARKER_RADIUS: f32 = 8.0;
/// Smallest cluster marker radius
pub const MIN_CLUSTER_RADIUS: f32 = 20.0;
/// Largest cluster marker radius
pub const MAX_CLUSTER_RADIUS: f32 = 50.0;

/// An sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl MarkerColor {
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Self = Self::from_rgb(0xff, 0xff, 0xff);
    pub const GREEN: Self = Self::from_rgb(0x22, 0xc5, 0x5e);
    pub const YELLOW: Self = Self::from_rgb(0xea, 0xb3, 0x08);
    pub const ORANGE: Self = Self::from_rgb(0xf9, 0x73, 0x16);
    pub const RED: Self = Self::from_rgb(0xef, 0x44, 0x44);
    pub const GRAY: Self = Self::from_rgb(0x6b, 0x72, 0x80);
    pub const BLUE: Self = Self::from_rgb(0x3b, 0x82, 0xf6);

    /// `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Fill color of a tree marker
///
/// Living trees are colored by health, everything else by status.
pub fn marker_color(status: TreeStatus, health: TreeHealth) -> MarkerColor {
    match status {
        TreeStatus::Alive => match health {
            TreeHealth::Healthy | TreeHealth::Unknown => MarkerColor::GREEN,
            TreeHealth::NeedsAttention => MarkerColor::YELLOW,
            TreeHealth::Diseased => MarkerColor::ORANGE,
            TreeHealth::Dead => MarkerColor::GRAY,
        },
        TreeStatus::Cut => MarkerColor::RED,
        TreeStatus::Replaced => MarkerColor::BLUE,
        TreeStatus::Dead | TreeStatus::Unknown => MarkerColor::GRAY,
    }
}

/// Cluster marker radius: `clamp(10 + 8 * log2(count), 20, 50)`
///
/// Grows sub-linearly so large clusters stay distinguishable without covering
/// the map. Counts of 0 and 1 both yield the minimum.
pub fn cluster_radius(tree_count: u64) -> f32 {
    if tree_count <= 1 {
        return MIN_CLUSTER_RADIUS;
    }
    let raw = 10.0 + 8.0 * (tree_count as f64).log2();
    raw.clamp(MIN_CLUSTER_RADIUS as f64, MAX_CLUSTER_RADIUS as f64) as f32
}

/// Identity of a marker across redraws
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkerId {
    Tree(String),
    Cluster(usize),
}

/// Fill and outline of a circle marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub fill: MarkerColor,
    pub fill_opacity: f32,
    pub stroke: MarkerColor,
    pub stroke_width: f32,
}

/// Content shown when a marker is inspected
#[derive(Debug, Clone, PartialEq)]
pub enum Popup {
    Tree {
        tree_id: String,
        tree_code: String,
        title: String,
        address: Option<String>,
        status: TreeStatus,
        health: TreeHealth,
    },
    Cluster {
        tree_count: u64,
        sample_species: Option<String>,
    },
}

impl Popup {
    /// Multi-line plain text rendering
    pub fn text(&self) -> String {
        match self {
            Self::Tree {
                tree_code,
                title,
                address,
                status,
                health,
                ..
            } => {
                let mut lines = vec![tree_code.clone(), title.clone()];
                if let Some(address) = address {
                    lines.push(address.clone());
                }
                lines.push(format!("{} · {}", status.label(), health.label()));
                lines.join("\n")
            }
            Self::Cluster {
                tree_count,
                sample_species,
            } => {
                let mut lines = vec![format!("{tree_count} trees in this area")];
                if let Some(species) = sample_species {
                    lines.push(format!("Including: {species}"));
                }
                lines.push("Zoom in to see individual trees".to_string());
                lines.join("\n")
            }
        }
    }
}

/// A renderable circle marker
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: MarkerId,
    pub lat: f64,
    pub lng: f64,
    pub radius: f32,
    pub style: MarkerStyle,
    pub popup: Popup,
}

impl Marker {
    pub fn for_tree(tree: &TreeMapItem) -> Self {
        Self {
            id: MarkerId::Tree(tree.id.clone()),
            lat: tree.latitude,
            lng: tree.longitude,
            radius: TREE_MARKER_RADIUS,
            style: MarkerStyle {
                fill: marker_color(tree.status, tree.health),
                fill_opacity: 0.9,
                stroke: MarkerColor::WHITE,
                stroke_width: 2.0,
            },
            popup: Popup::Tree {
                tree_id: tree.id.clone(),
                tree_code: tree.tree_code.clone(),
                title: tree.title().to_string(),
                address: tree.address.clone(),
                status: tree.status,
                health: tree.health,
            },
        }
    }

    pub fn for_cluster(index: usize, cluster: &TreeCluster) -> Self {
        Self {
            id: MarkerId::Cluster(index),
            lat: cluster.cluster_lat,
            lng: cluster.cluster_lng,
            radius: cluster_radius(cluster.tree_count),
            style: MarkerStyle {
                fill: MarkerColor::BLUE,
                fill_opacity: 0.8,
                stroke: MarkerColor::WHITE,
                stroke_width: 2.0,
            },
            popup: Popup::Cluster {
                tree_count: cluster.tree_count,
                sample_species: cluster.sample_species.clone(),
            },
        }
    }

    /// Trees this marker stands for
    pub fn trees_represented(&self) -> u64 {
        match &self.popup {
            Popup::Cluster { tree_count, .. } => *tree_count,
            Popup::Tree { .. } => 1,
        }
    }

    /// Tree id for click-through to the detail lookup
    pub fn tree_id(&self) -> Option<&str> {
        match &self.id {
            MarkerId::Tree(id) => Some(id),
            MarkerId::Cluster(_) => None,
        }
    }
}

/// Build markers for whichever list the zoom level calls for
pub fn render_markers(
    use_clusters: bool,
    clusters: &[TreeCluster],
    items: &[TreeMapItem],
) -> Vec<Marker> {
    if use_clusters {
        clusters
            .iter()
            .enumerate()
            .map(|(i, c)| Marker::for_cluster(i, c))
            .collect()
    } else {
        items.iter().map(Marker::for_tree).collect()
    }
}

/// Restrict cached data to what lies inside the actual viewport
///
/// The cache holds an expanded rectangle; only the visible part is drawn.
pub fn visible(data: &MapData, viewport: &ViewportBounds) -> MapData {
    match data {
        MapData::Clusters(clusters) => MapData::Clusters(Arc::new(
            clusters
                .iter()
                .filter(|c| viewport.contains_point(c.cluster_lat, c.cluster_lng))
                .cloned()
                .collect(),
        )),
        MapData::Trees(items) => MapData::Trees(Arc::new(
            items
                .iter()
                .filter(|t| viewport.contains_point(t.latitude, t.longitude))
                .cloned()
                .collect(),
        )),
    }
}

/// Memoized markers whose position lies inside the viewport
pub fn in_viewport(markers: &[Arc<Marker>], viewport: &ViewportBounds) -> Vec<Arc<Marker>> {
    markers
        .iter()
        .filter(|m| viewport.contains_point(m.lat, m.lng))
        .cloned()
        .collect()
}

/// Number shown next to the map title: trees represented, not markers drawn
pub fn display_count(data: &MapData) -> u64 {
    match data {
        MapData::Clusters(clusters) => clusters.iter().map(|c| c.tree_count).sum(),
        MapData::Trees(items) => items.len() as u64,
    }
}

/// Source record a memoized marker was built from
#[derive(Debug, Clone, PartialEq)]
enum MarkerSource {
    Tree(TreeMapItem),
    Cluster(TreeCluster),
}

/// Identity-keyed marker cache
///
/// A marker is rebuilt only when the record behind its identity changed.
/// Identities absent from the latest input are evicted. Handing in the same
/// shared list again returns the previous markers without looking at records.
#[derive(Debug, Default)]
pub struct MarkerMemo {
    entries: HashMap<MarkerId, (MarkerSource, Arc<Marker>)>,
    last: Option<(MapData, Vec<Arc<Marker>>)>,
    built: u64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MarkerMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers for `data`, reusing unchanged ones
    pub fn markers(&mut self, data: &MapData) -> Vec<Arc<Marker>> {
        if let Some((source, markers)) = &self.last
            && source.shares_list(data)
        {
            return markers.clone();
        }

        let mut next = HashMap::with_capacity(data.len());
        let mut out = Vec::with_capacity(data.len());

        match data {
            MapData::Clusters(clusters) => {
                for (i, cluster) in clusters.iter().enumerate() {
                    let id = MarkerId::Cluster(i);
                    let source = MarkerSource::Cluster(cluster.clone());
                    let marker = self.reuse_or_build(&id, &source, || Marker::for_cluster(i, cluster));
                    out.push(marker.clone());
                    next.insert(id, (source, marker));
                }
            }
            MapData::Trees(items) => {
                for tree in items.iter() {
                    let id = MarkerId::Tree(tree.id.clone());
                    let source = MarkerSource::Tree(tree.clone());
                    let marker = self.reuse_or_build(&id, &source, || Marker::for_tree(tree));
                    out.push(marker.clone());
                    next.insert(id, (source, marker));
                }
            }
        }

        self.entries = next;
        self.last = Some((data.clone(), out.clone()));
        out
    }

    fn reuse_or_build(
        &mut self,
        id: &MarkerId,
        source: &MarkerSource,
        build: impl FnOnce() -> Marker,
    ) -> Arc<Marker> {
        match self.entries.get(id) {
            Some((cached, marker)) if cached == source => marker.clone(),
            _ => {
                self.built += 1;
                Arc::new(build())
            }
        }
    }

    /// Drop every memoized marker
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of markers constructed so far
    pub fn built_count(&self) -> u64 {
        self.built
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(id: &str, status: TreeStatus, health: TreeHealth) -> TreeMapItem {
        TreeMapItem {
            id: id.to_string(),
            tree_code: format!("TR-{id}"),
            species: "Pterocarpus indicus".to_string(),
            common_name: Some("Narra".to_string()),
            latitude: 15.03,
            longitude: 120.69,
            address: Some("Dolores, San Fernando".to_string()),
            barangay: None,
            status,
            health,
        }
    }

    fn cluster(lat: f64, lng: f64, count: u64) -> TreeCluster {
        TreeCluster {
            cluster_lat: lat,
            cluster_lng: lng,
            tree_count: count,
            sample_id: None,
            sample_code: None,
            sample_species: Some("Acacia".to_string()),
        }
    }

    #[test]
    fn test_cluster_radius_bounds_and_monotonicity() {
        assert_eq!(cluster_radius(0), 20.0);
        assert_eq!(cluster_radius(1), 20.0);
        assert_eq!(cluster_radius(4), 26.0);
        assert_eq!(cluster_radius(8), 34.0);
        assert_eq!(cluster_radius(1_000_000), 50.0);

        let mut previous = cluster_radius(0);
        for count in 1..5000u64 {
            let r = cluster_radius(count);
            assert!((20.0..=50.0).contains(&r), "radius {r} out of range for {count}");
            assert!(r >= previous, "radius decreased at {count}");
            previous = r;
        }
    }

    #[test]
    fn test_marker_colors() {
        assert_eq!(marker_color(TreeStatus::Alive, TreeHealth::Healthy).to_hex(), "#22c55e");
        assert_eq!(
            marker_color(TreeStatus::Alive, TreeHealth::NeedsAttention).to_hex(),
            "#eab308"
        );
        assert_eq!(marker_color(TreeStatus::Alive, TreeHealth::Diseased).to_hex(), "#f97316");
        assert_eq!(marker_color(TreeStatus::Cut, TreeHealth::Healthy).to_hex(), "#ef4444");
        assert_eq!(marker_color(TreeStatus::Replaced, TreeHealth::Healthy).to_hex(), "#3b82f6");
        assert_eq!(marker_color(TreeStatus::Dead, TreeHealth::Dead).to_hex(), "#6b7280");
    }

    #[test]
    fn test_render_markers_picks_list_by_mode() {
        let clusters = vec![cluster(15.0, 120.7, 10), cluster(15.1, 120.8, 3)];
        let items = vec![tree("a", TreeStatus::Alive, TreeHealth::Healthy)];

        let markers = render_markers(true, &clusters, &items);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[1].id, MarkerId::Cluster(1));
        assert!(markers[0].tree_id().is_none());

        let markers = render_markers(false, &clusters, &items);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].tree_id(), Some("a"));
        assert_eq!(markers[0].radius, TREE_MARKER_RADIUS);
    }

    #[test]
    fn test_popup_text() {
        let marker = Marker::for_tree(&tree("a", TreeStatus::Alive, TreeHealth::NeedsAttention));
        let text = marker.popup.text();
        assert!(text.starts_with("TR-a\nPterocarpus indicus\nDolores, San Fernando"));
        assert!(text.ends_with("ALIVE · NEEDS ATTENTION"));

        let marker = Marker::for_cluster(0, &cluster(15.0, 120.7, 42));
        let text = marker.popup.text();
        assert!(text.contains("42 trees in this area"));
        assert!(text.contains("Including: Acacia"));
    }

    #[test]
    fn test_memo_reuses_unchanged_markers() {
        let mut memo = MarkerMemo::new();
        let data = MapData::Trees(Arc::new(vec![
            tree("a", TreeStatus::Alive, TreeHealth::Healthy),
            tree("b", TreeStatus::Cut, TreeHealth::Dead),
        ]));

        let first = memo.markers(&data);
        let second = memo.markers(&data);
        assert_eq!(memo.built_count(), 2);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert!(Arc::ptr_eq(&first[1], &second[1]));
    }

    #[test]
    fn test_memo_rebuilds_changed_and_evicts_missing() {
        let mut memo = MarkerMemo::new();
        let before = MapData::Trees(Arc::new(vec![
            tree("a", TreeStatus::Alive, TreeHealth::Healthy),
            tree("b", TreeStatus::Alive, TreeHealth::Healthy),
        ]));
        let first = memo.markers(&before);

        let after = MapData::Trees(Arc::new(vec![
            tree("a", TreeStatus::Alive, TreeHealth::Healthy),
            tree("c", TreeStatus::Alive, TreeHealth::Diseased),
            tree("b", TreeStatus::Cut, TreeHealth::Healthy),
        ]));
        let second = memo.markers(&after);

        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert!(!Arc::ptr_eq(&first[1], &second[2]));
        assert_eq!(second[2].style.fill, MarkerColor::RED);
        assert_eq!(memo.built_count(), 4);

        let only_a = MapData::Trees(Arc::new(vec![tree("a", TreeStatus::Alive, TreeHealth::Healthy)]));
        memo.markers(&only_a);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_memo_clusters_by_index() {
        let mut memo = MarkerMemo::new();
        let data = MapData::Clusters(Arc::new(vec![cluster(15.0, 120.7, 10), cluster(15.1, 120.8, 3)]));
        let first = memo.markers(&data);
        let second = memo.markers(&data);
        assert!(Arc::ptr_eq(&first[1], &second[1]));

        memo.clear();
        assert!(memo.is_empty());
        let third = memo.markers(&data);
        assert!(!Arc::ptr_eq(&first[0], &third[0]));
    }

    #[test]
    fn test_equal_or_shared_list_reuses_markers() {
        let mut memo = MarkerMemo::new();
        let data = MapData::Clusters(Arc::new(vec![cluster(15.0, 120.7, 10)]));
        let first = memo.markers(&data);
        assert!(Arc::ptr_eq(&first[0], &memo.markers(&data.clone())[0]));

        // An equal but separately allocated list goes through the identity map
        let copy = MapData::Clusters(Arc::new(vec![cluster(15.0, 120.7, 10)]));
        let second = memo.markers(&copy);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(memo.built_count(), 1);
    }

    #[test]
    fn test_panning_keeps_cluster_identity() {
        let mut memo = MarkerMemo::new();
        let data = MapData::Clusters(Arc::new(vec![
            cluster(14.96, 120.7, 4),
            cluster(15.0, 120.7, 10),
            cluster(15.02, 120.7, 7),
        ]));

        let before = ViewportBounds::new(14.95, 120.65, 15.05, 120.75).unwrap();
        let after = ViewportBounds::new(14.97, 120.65, 15.07, 120.75).unwrap();
        let a = in_viewport(&memo.markers(&data), &before);
        let b = in_viewport(&memo.markers(&data), &after);

        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 2);
        assert!(Arc::ptr_eq(&a[1], &b[0]));
        assert!(Arc::ptr_eq(&a[2], &b[1]));
        assert_eq!(b[0].id, MarkerId::Cluster(1));
        assert_eq!(memo.built_count(), 3);
        assert_eq!(b.iter().map(|m| m.trees_represented()).sum::<u64>(), 17);
    }

    #[test]
    fn test_visible_filters_to_viewport() {
        let viewport = ViewportBounds::new(14.95, 120.65, 15.05, 120.75).unwrap();
        let data = MapData::Clusters(Arc::new(vec![cluster(15.0, 120.7, 10), cluster(15.12, 120.8, 3)]));
        let shown = visible(&data, &viewport);
        assert_eq!(shown.len(), 1);
        assert_eq!(display_count(&shown), 10);
        assert_eq!(display_count(&data), 13);
    }
}
