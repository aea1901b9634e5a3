//! Tree Map Library - Viewport-driven caching for tree inventory maps
//!
//! This library keeps a map view of a tree inventory responsive while the user pans
//! and zooms. Instead of fetching exactly what is on screen, it fetches a rectangle
//! 1.5x larger than the viewport and serves every later viewport that still fits
//! inside it from memory. Below a zoom threshold the backend returns server-side
//! clusters instead of individual trees.
//!
//! # Architecture
//!
//! - **[`ViewportBounds`]**: Geographic rectangle with expansion and containment math
//! - **[`BoundsTracker`]**: Turns raw map frames into settled viewport changes
//! - **[`ExpandedBoundsCache`]**: Cache policy deciding between cached data and a new fetch
//! - **[`MarkerMemo`]**: Marker construction with identity-based memoization
//! - **[`DetailLookup`]**: Lazy, on-demand loading of full tree records
//! - **[`TreeApi`]**: Seam to the REST backend, with [`HttpTreeApi`] as the real client
//! - **[`TreeMapService`]**: Context object wiring all of the above to an async runtime
//!
//! # Concurrency
//!
//! Everything except the network calls runs on the caller's thread. Fetches are
//! spawned onto tokio and report back through a channel; the cache applies them in
//! request order and drops anything superseded (last request wins).

mod api;
mod bounds;
mod cache;
mod detail;
mod markers;
mod model;
mod service;
mod tracker;

// Public API exports
pub use api::{ApiError, BoundsQuery, HttpTreeApi, HttpTreeApiConfig, TreeApi};
pub use bounds::ViewportBounds;
pub use cache::{
    CacheKey, CachePolicy, CacheStats, Completion, ExpandedBoundsCache, ExpandedCacheEntry, FetchRequest,
    MapData, Plan, ZoomBucket,
};
pub use detail::{DetailLookup, DetailRequest, DetailState};
pub use markers::{
    Marker, MarkerColor, MarkerId, MarkerMemo, MarkerStyle, Popup, cluster_radius, display_count,
    in_viewport, marker_color, render_markers, visible,
};
pub use model::{
    MapFilters, TreeCluster, TreeDetail, TreeHealth, TreeMapItem, TreePhoto, TreeStatus,
};
pub use service::{MapView, TreeMapService};
pub use tracker::{BoundsTracker, MapFrame, SubscriptionId, ViewportChange};

/// Error types for the tree map library
#[derive(Debug, thiserror::Error)]
pub enum TreeMapError {
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Invalid cache policy: {0}")]
    InvalidPolicy(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, TreeMapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that the main entry points are reachable from the crate root
        let _: fn(CachePolicy) -> ExpandedBoundsCache = ExpandedBoundsCache::new;
        let _: fn() -> CachePolicy = CachePolicy::default;
        let _: fn() -> BoundsTracker = BoundsTracker::new;
    }

    #[test]
    fn test_error_display() {
        let err = TreeMapError::InvalidBounds("min_lat > max_lat".to_string());
        assert_eq!(err.to_string(), "Invalid bounds: min_lat > max_lat");

        let err: TreeMapError = ApiError::Timeout.into();
        assert_eq!(err.to_string(), "API error: request timed out");
    }
}
