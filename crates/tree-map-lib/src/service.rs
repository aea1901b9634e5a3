//! Map data service
//!
//! [`TreeMapService`] is the one object a map screen talks to. It owns the bounds
//! tracker, the expanded-bounds cache, the marker memo and the detail lookup, and
//! runs network calls on tokio. Results come back over a channel and are applied
//! on the caller's thread by [`TreeMapService::poll`], typically once per frame.

use crate::api::{ApiError, TreeApi};
use crate::cache::{CacheStats, ExpandedBoundsCache, FetchRequest, MapData, Plan};
use crate::detail::{DetailLookup, DetailRequest, DetailState};
use crate::markers::{Marker, MarkerMemo, in_viewport};
use crate::tracker::{BoundsTracker, MapFrame, ViewportChange};
use crate::{CachePolicy, MapFilters, Result, TreeDetail, TreeMapError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

/// Result of a background task
#[derive(Debug)]
enum Outcome {
    Map {
        seq: u64,
        result: std::result::Result<MapData, ApiError>,
    },
    Detail {
        id: String,
        result: std::result::Result<Option<TreeDetail>, ApiError>,
    },
}

/// Snapshot of everything the map screen draws
#[derive(Debug, Clone)]
pub struct MapView {
    /// Current zoom is below the cluster threshold
    pub use_clusters: bool,
    /// Markers inside the viewport, taken from the displayed cache entry
    pub markers: Vec<Arc<Marker>>,
    pub from_cache: bool,
    pub is_fetching: bool,
    /// Fetching with nothing to show yet
    pub is_loading: bool,
    pub error: Option<String>,
    /// Trees represented by the markers
    pub display_count: u64,
    pub zoom: f64,
}

impl MapView {
    pub fn status_text(&self) -> &'static str {
        if self.is_fetching {
            "Fetching..."
        } else if self.from_cache {
            "Using cache"
        } else {
            "Ready"
        }
    }
}

pub struct TreeMapService {
    api: Arc<dyn TreeApi>,
    runtime: Handle,
    tracker: BoundsTracker,
    cache: ExpandedBoundsCache,
    memo: MarkerMemo,
    details: DetailLookup,
    filters: MapFilters,
    viewport: Option<ViewportChange>,
    in_flight: Option<(u64, JoinHandle<()>)>,
    tx: UnboundedSender<Outcome>,
    rx: UnboundedReceiver<Outcome>,
}

impl std::fmt::Debug for TreeMapService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeMapService")
            .field("cache", &self.cache)
            .field("filters", &self.filters)
            .field("viewport", &self.viewport)
            .field("in_flight", &self.in_flight.as_ref().map(|(seq, _)| seq))
            .finish_non_exhaustive()
    }
}

impl TreeMapService {
    /// Create a service bound to the current tokio runtime
    pub fn new(api: Arc<dyn TreeApi>, policy: CachePolicy) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| TreeMapError::Runtime(e.to_string()))?;
        Self::with_runtime(api, policy, runtime)
    }

    pub fn with_runtime(
        api: Arc<dyn TreeApi>,
        policy: CachePolicy,
        runtime: Handle,
    ) -> Result<Self> {
        policy.validate()?;
        let (tx, rx) = unbounded_channel();
        Ok(Self {
            api,
            runtime,
            tracker: BoundsTracker::new(),
            cache: ExpandedBoundsCache::new(policy),
            memo: MarkerMemo::new(),
            details: DetailLookup::default(),
            filters: MapFilters::default(),
            viewport: None,
            in_flight: None,
            tx,
            rx,
        })
    }

    /// Feed a raw map frame; settled frames become viewport changes
    pub fn observe(&mut self, frame: MapFrame) {
        if let Some(change) = self.tracker.observe(frame) {
            self.on_viewport_change(change);
        }
    }

    /// Whether the map view is still moving toward a settled viewport
    pub fn is_settling(&self) -> bool {
        self.tracker.is_settling()
    }

    /// Subscribers notified of each settled viewport
    pub fn tracker_mut(&mut self) -> &mut BoundsTracker {
        &mut self.tracker
    }

    pub fn on_viewport_change(&mut self, change: ViewportChange) {
        self.viewport = Some(change);
        self.refresh();
    }

    pub fn set_filters(&mut self, filters: MapFilters) {
        if filters == self.filters {
            return;
        }
        tracing::info!(status = ?filters.status, health = ?filters.health, "Filters changed");
        self.filters = filters;
        self.refresh();
    }

    pub fn filters(&self) -> MapFilters {
        self.filters
    }

    /// Discard cached map data and details after the inventory changed
    ///
    /// What is on screen stays until the refetch lands.
    pub fn invalidate(&mut self) {
        tracing::info!("Invalidating tree map cache");
        self.abort_in_flight();
        self.cache.invalidate();
        self.details.invalidate();
        self.refresh();
    }

    fn refresh(&mut self) {
        profiling::scope!("TreeMapService::refresh");
        let Some(change) = self.viewport else {
            return;
        };
        match self.cache.plan(&change.bounds, change.zoom, self.filters) {
            Plan::Cached => self.abort_in_flight(),
            Plan::InFlight { .. } => {}
            Plan::Fetch(request) => self.spawn_fetch(request),
        }
    }

    fn spawn_fetch(&mut self, request: FetchRequest) {
        self.abort_in_flight();

        let api = self.api.clone();
        let tx = self.tx.clone();
        let seq = request.seq;
        let handle = self.runtime.spawn(async move {
            let query = request.query();
            let result = if request.key.bucket.is_clustered() {
                api.tree_clusters(&query, request.zoom_level)
                    .await
                    .map(|clusters| MapData::Clusters(Arc::new(clusters)))
            } else {
                api.trees_in_bounds(&query)
                    .await
                    .map(|items| MapData::Trees(Arc::new(items)))
            };
            // Receiver gone means the service was dropped
            let _ = tx.send(Outcome::Map { seq, result });
        });
        self.in_flight = Some((seq, handle));
    }

    fn abort_in_flight(&mut self) {
        if let Some((seq, handle)) = self.in_flight.take() {
            tracing::trace!(seq, "Aborting superseded fetch");
            handle.abort();
        }
    }

    /// Apply every outcome that is already available; returns how many
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.rx.try_recv() {
            self.apply(outcome);
            applied += 1;
        }
        applied
    }

    /// Wait for the next outcome and apply it
    pub async fn next_outcome(&mut self) {
        if let Some(outcome) = self.rx.recv().await {
            self.apply(outcome);
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Map { seq, result } => {
                if self.in_flight.as_ref().is_some_and(|(s, _)| *s == seq) {
                    self.in_flight = None;
                }
                match result {
                    Ok(data) => self.cache.complete(seq, data),
                    Err(error) => self.cache.fail(seq, error),
                };
            }
            Outcome::Detail { id, result } => self.details.resolve(&id, result),
        }
    }

    /// Select a tree and load its full record if needed
    pub fn select_tree(&mut self, id: &str) {
        if let Some(DetailRequest { id }) = self.details.select(id) {
            let api = self.api.clone();
            let tx = self.tx.clone();
            self.runtime.spawn(async move {
                let result = api.tree_by_id(&id).await;
                let _ = tx.send(Outcome::Detail { id, result });
            });
        }
    }

    pub fn clear_selection(&mut self) {
        self.details.clear_selection();
    }

    pub fn detail_state(&self) -> &DetailState {
        self.details.state()
    }

    pub fn is_fetching(&self) -> bool {
        self.cache.is_fetching()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn policy(&self) -> &CachePolicy {
        self.cache.policy()
    }

    pub fn viewport(&self) -> Option<&ViewportChange> {
        self.viewport.as_ref()
    }

    /// Build the current view
    ///
    /// The displayed entry is used even while a newer fetch is pending, so the map
    /// never goes blank between requests.
    pub fn view(&mut self) -> MapView {
        profiling::scope!("TreeMapService::view");
        let zoom = self.viewport.map(|v| v.zoom).unwrap_or_default();
        let use_clusters = self.cache.policy().bucket_for(zoom).is_clustered();
        let is_fetching = self.cache.is_fetching();

        let shown = self.cache.displayed().map(|entry| {
            let all = self.memo.markers(&entry.data);
            match &self.viewport {
                Some(viewport) => in_viewport(&all, &viewport.bounds),
                None => all,
            }
        });
        let is_loading = is_fetching && shown.is_none();
        let markers = shown.unwrap_or_default();
        let display_count = markers.iter().map(|m| m.trees_represented()).sum();

        MapView {
            use_clusters,
            markers,
            from_cache: self.cache.from_cache(),
            is_fetching,
            is_loading,
            error: self.cache.last_error().map(|e| e.to_string()),
            display_count,
            zoom,
        }
    }
}
