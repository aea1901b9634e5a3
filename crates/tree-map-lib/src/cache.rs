//! Expanded-bounds cache policy
//!
//! The cache holds at most one entry: the last successful fetch, made for a
//! rectangle larger than the viewport that triggered it. Any later viewport that
//! still fits inside that rectangle, with the same filters and the same zoom
//! bucket, is served from memory.
//!
//! The entry is replaced wholesale when a newer fetch lands. Until then it keeps
//! being displayed, even if it no longer matches the current filters or zoom
//! bucket, so the map never flashes to empty while a request is in flight.

use crate::api::{ApiError, BoundsQuery};
use crate::{MapFilters, Result, TreeCluster, TreeMapError, TreeMapItem, ViewportBounds};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Coarse zoom classification deciding between clusters and individual markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoomBucket {
    Clustered,
    Individual,
}

impl ZoomBucket {
    /// Clustered strictly below the threshold, individual at or above it
    #[inline]
    pub fn for_zoom(zoom: f64, threshold: f64) -> Self {
        if zoom < threshold {
            Self::Clustered
        } else {
            Self::Individual
        }
    }

    #[inline]
    pub fn is_clustered(&self) -> bool {
        matches!(self, Self::Clustered)
    }
}

/// Tunables for the cache policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Zoom at which the map switches from clusters to individual trees
    pub cluster_zoom_threshold: f64,
    /// Factor applied to the viewport around its center before fetching
    pub expansion_factor: f64,
    /// Decimal places a cluster query rectangle is snapped outward to
    pub cluster_snap_decimals: u32,
    /// Decimal places an individual-tree query rectangle is snapped outward to
    pub tree_snap_decimals: u32,
    /// Treat every integer zoom change as a new cluster grid.
    /// Off by default: only a zoom bucket change invalidates the entry.
    pub refetch_clusters_on_zoom_change: bool,
    /// Maximum number of individual trees requested per fetch
    pub tree_limit: Option<u32>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            cluster_zoom_threshold: 16.0,
            expansion_factor: 1.5,
            cluster_snap_decimals: 3,
            tree_snap_decimals: 4,
            refetch_clusters_on_zoom_change: false,
            tree_limit: Some(1000),
        }
    }
}

impl CachePolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.cluster_zoom_threshold.is_finite() || self.cluster_zoom_threshold <= 0.0 {
            return Err(TreeMapError::InvalidPolicy(format!(
                "cluster_zoom_threshold must be positive, got {}",
                self.cluster_zoom_threshold
            )));
        }
        if !self.expansion_factor.is_finite() || self.expansion_factor < 1.0 {
            return Err(TreeMapError::InvalidPolicy(format!(
                "expansion_factor must be at least 1.0, got {}",
                self.expansion_factor
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn bucket_for(&self, zoom: f64) -> ZoomBucket {
        ZoomBucket::for_zoom(zoom, self.cluster_zoom_threshold)
    }

    /// Cluster grids are coarser, so their queries round to fewer decimals
    #[inline]
    pub fn snap_decimals_for(&self, bucket: ZoomBucket) -> u32 {
        match bucket {
            ZoomBucket::Clustered => self.cluster_snap_decimals,
            ZoomBucket::Individual => self.tree_snap_decimals,
        }
    }
}

/// Everything besides the rectangle that must match for an entry to be reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub bucket: ZoomBucket,
    pub filters: MapFilters,
    /// Integer zoom of the cluster grid, only set when the policy refetches per zoom level
    pub grid_zoom: Option<u8>,
}

/// Payload of a cache entry
#[derive(Debug, Clone, PartialEq)]
pub enum MapData {
    Clusters(Arc<Vec<TreeCluster>>),
    Trees(Arc<Vec<TreeMapItem>>),
}

impl MapData {
    pub fn is_clusters(&self) -> bool {
        matches!(self, Self::Clusters(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Clusters(c) => c.len(),
            Self::Trees(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Both point at the same shared list
    pub fn shares_list(&self, other: &MapData) -> bool {
        match (self, other) {
            (Self::Clusters(a), Self::Clusters(b)) => Arc::ptr_eq(a, b),
            (Self::Trees(a), Self::Trees(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The single cached fetch result
#[derive(Debug, Clone)]
pub struct ExpandedCacheEntry {
    /// Expanded rectangle the data covers, exactly `expansion_factor` times the viewport
    pub bounds: ViewportBounds,
    pub key: CacheKey,
    /// Zoom level that triggered the fetch
    pub zoom: f64,
    pub data: MapData,
    pub fetched_at: Instant,
    /// Sequence number of the request that produced this entry
    pub seq: u64,
    invalidated: bool,
}

impl ExpandedCacheEntry {
    /// Whether this entry may be served for the given viewport and key
    #[inline]
    pub fn serves(&self, viewport: &ViewportBounds, key: &CacheKey) -> bool {
        !self.invalidated && self.key == *key && self.bounds.contains(viewport)
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }
}

/// A fetch the caller must perform
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Monotonically increasing request number
    pub seq: u64,
    /// Expanded rectangle, used for containment checks
    pub expanded: ViewportBounds,
    /// `expanded` snapped outward; what is actually sent to the backend
    pub bounds: ViewportBounds,
    pub key: CacheKey,
    /// Zoom that triggered the request
    pub zoom: f64,
    /// Integer zoom sent to the cluster endpoint
    pub zoom_level: u8,
    pub limit: Option<u32>,
}

impl FetchRequest {
    /// Query parameters for the backend
    pub fn query(&self) -> BoundsQuery {
        BoundsQuery {
            bounds: self.bounds,
            filters: self.key.filters,
            limit: match self.key.bucket {
                ZoomBucket::Individual => self.limit,
                ZoomBucket::Clustered => None,
            },
        }
    }
}

/// Outcome of planning a viewport change
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// The current entry covers the viewport; nothing to fetch
    Cached,
    /// A matching request is already in flight
    InFlight { seq: u64 },
    /// A new request must be issued
    Fetch(FetchRequest),
}

/// Outcome of applying a fetch result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The result became the cache entry (or its error was recorded)
    Applied,
    /// A newer request superseded this one; the result was dropped
    Stale,
}

/// Counters exposed for status displays and benchmarks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub fetches_issued: u64,
    pub cache_hits: u64,
    pub stale_discarded: u64,
}

/// Expanded-bounds cache with last-request-wins semantics
#[derive(Debug)]
pub struct ExpandedBoundsCache {
    policy: CachePolicy,
    entry: Option<ExpandedCacheEntry>,
    pending: Option<FetchRequest>,
    next_seq: u64,
    from_cache: bool,
    last_error: Option<ApiError>,
    stats: CacheStats,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ExpandedBoundsCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entry: None,
            pending: None,
            next_seq: 1,
            from_cache: false,
            last_error: None,
            stats: CacheStats::default(),
        }
    }

    #[inline]
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Cache key for the given zoom and filters under the current policy
    pub fn key_for(&self, zoom: f64, filters: MapFilters) -> CacheKey {
        let bucket = self.policy.bucket_for(zoom);
        let grid_zoom = (bucket.is_clustered() && self.policy.refetch_clusters_on_zoom_change)
            .then(|| zoom_level(zoom));
        CacheKey {
            bucket,
            filters,
            grid_zoom,
        }
    }

    /// Decide how to satisfy a viewport
    ///
    /// Returns [`Plan::Fetch`] only when neither the cached entry nor the request
    /// already in flight covers the viewport. Issuing a fetch supersedes any
    /// earlier pending request; serving from cache drops it.
    pub fn plan(&mut self, viewport: &ViewportBounds, zoom: f64, filters: MapFilters) -> Plan {
        let key = self.key_for(zoom, filters);

        if let Some(entry) = &self.entry
            && entry.serves(viewport, &key)
        {
            if let Some(dropped) = self.pending.take() {
                tracing::trace!(seq = dropped.seq, "Dropping pending fetch, cache covers viewport");
            }
            self.from_cache = true;
            self.stats.cache_hits += 1;
            tracing::debug!(%viewport, bucket = ?key.bucket, "Serving viewport from cache");
            return Plan::Cached;
        }

        if let Some(pending) = &self.pending
            && pending.key == key
            && pending.expanded.contains(viewport)
        {
            tracing::debug!(seq = pending.seq, "Viewport covered by in-flight fetch");
            return Plan::InFlight { seq: pending.seq };
        }

        let expanded = viewport.expand(self.policy.expansion_factor);
        let bounds = expanded.snap_outward(self.policy.snap_decimals_for(key.bucket));
        let request = FetchRequest {
            seq: self.next_seq,
            expanded,
            bounds,
            key,
            zoom,
            zoom_level: zoom_level(zoom),
            limit: self.policy.tree_limit,
        };
        self.next_seq += 1;

        if let Some(superseded) = self.pending.replace(request.clone()) {
            tracing::debug!(
                superseded = superseded.seq,
                seq = request.seq,
                "Superseding in-flight fetch"
            );
        }
        self.from_cache = false;
        self.stats.fetches_issued += 1;
        tracing::debug!(seq = request.seq, %bounds, bucket = ?key.bucket, "Issuing fetch");

        Plan::Fetch(request)
    }

    /// Apply a successful fetch result
    pub fn complete(&mut self, seq: u64, data: MapData) -> Completion {
        let Some(pending) = self.take_pending(seq) else {
            return Completion::Stale;
        };

        tracing::info!(
            seq,
            count = data.len(),
            clusters = data.is_clusters(),
            "Fetch completed, replacing cache entry"
        );
        self.entry = Some(ExpandedCacheEntry {
            bounds: pending.expanded,
            key: pending.key,
            zoom: pending.zoom,
            data,
            fetched_at: Instant::now(),
            seq,
            invalidated: false,
        });
        self.last_error = None;
        self.from_cache = false;
        Completion::Applied
    }

    /// Record a failed fetch; the displayed entry is left untouched
    pub fn fail(&mut self, seq: u64, error: ApiError) -> Completion {
        if self.take_pending(seq).is_none() {
            return Completion::Stale;
        }
        tracing::warn!(seq, %error, "Fetch failed, keeping last good data");
        self.last_error = Some(error);
        Completion::Applied
    }

    fn take_pending(&mut self, seq: u64) -> Option<FetchRequest> {
        if self.pending.as_ref().map(|p| p.seq) == Some(seq) {
            self.pending.take()
        } else {
            tracing::trace!(seq, "Discarding stale fetch result");
            self.stats.stale_discarded += 1;
            None
        }
    }

    /// Forbid reuse of the current entry (e.g. after the inventory was edited)
    ///
    /// The entry stays displayed until fresh data replaces it.
    pub fn invalidate(&mut self) {
        if let Some(entry) = &mut self.entry {
            entry.invalidated = true;
        }
        self.pending = None;
        self.from_cache = false;
    }

    /// Entry currently shown to the user, possibly outdated
    #[inline]
    pub fn displayed(&self) -> Option<&ExpandedCacheEntry> {
        self.entry.as_ref()
    }

    /// Request currently in flight, if any
    #[inline]
    pub fn pending(&self) -> Option<&FetchRequest> {
        self.pending.as_ref()
    }

    #[inline]
    pub fn is_fetching(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the last plan was served from cache
    #[inline]
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    #[inline]
    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Integer zoom level sent to the backend
#[inline]
fn zoom_level(zoom: f64) -> u8 {
    if zoom.is_finite() {
        zoom.floor().clamp(0.0, u8::MAX as f64) as u8
    } else {
        0
    }
}
