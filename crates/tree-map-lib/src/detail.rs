//! On-demand tree detail lookup
//!
//! Map markers carry only a projection of each tree. Selecting one loads the
//! full record, which is kept in a small LRU so flipping between recently
//! inspected trees is instant.

use crate::{ApiError, TreeDetail};
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Number of full records kept in memory
pub const DEFAULT_DETAIL_CAPACITY: usize = 64;

/// What the detail panel should show
#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Idle,
    Loading(String),
    Loaded(Arc<TreeDetail>),
    /// The backend has no tree with this id
    NotFound(String),
    Failed(String, String),
}

impl DetailState {
    /// Inline message for states without a record
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Idle | Self::Loaded(_) => None,
            Self::Loading(_) => Some("Loading tree details...".to_string()),
            Self::NotFound(_) => Some("Tree not found".to_string()),
            Self::Failed(_, message) => Some(format!("Failed to load tree: {message}")),
        }
    }
}

/// A record the caller must fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
enum Cached {
    Found(Arc<TreeDetail>),
    Missing,
}

#[derive(Debug)]
pub struct DetailLookup {
    cache: LruCache<String, Cached>,
    /// Ids with a request out, selected or not
    in_flight: HashSet<String>,
    selected: Option<String>,
    state: DetailState,
}

impl Default for DetailLookup {
    fn default() -> Self {
        Self::new(DEFAULT_DETAIL_CAPACITY)
    }
}

impl DetailLookup {
    /// Capacity of zero is bumped to one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            in_flight: HashSet::new(),
            selected: None,
            state: DetailState::Idle,
        }
    }

    /// Select a tree; returns a request unless the record is already known
    pub fn select(&mut self, id: &str) -> Option<DetailRequest> {
        self.selected = Some(id.to_string());

        if let Some(cached) = self.cache.get(id) {
            tracing::debug!(id, "Tree detail served from cache");
            self.state = match cached {
                Cached::Found(detail) => DetailState::Loaded(detail.clone()),
                Cached::Missing => DetailState::NotFound(id.to_string()),
            };
            return None;
        }

        self.state = DetailState::Loading(id.to_string());
        if !self.in_flight.insert(id.to_string()) {
            tracing::trace!(id, "Tree detail already requested");
            return None;
        }
        Some(DetailRequest { id: id.to_string() })
    }

    /// Apply a fetch result
    ///
    /// Successful lookups are cached whether or not the tree is still selected;
    /// only the selected tree changes the visible state.
    pub fn resolve(&mut self, id: &str, result: Result<Option<TreeDetail>, ApiError>) {
        self.in_flight.remove(id);
        let state = match result {
            Ok(Some(detail)) => {
                let detail = Arc::new(detail);
                self.cache.put(id.to_string(), Cached::Found(detail.clone()));
                DetailState::Loaded(detail)
            }
            Ok(None) => {
                self.cache.put(id.to_string(), Cached::Missing);
                DetailState::NotFound(id.to_string())
            }
            Err(error) => {
                tracing::warn!(id, %error, "Failed to load tree detail");
                DetailState::Failed(id.to_string(), error.to_string())
            }
        };

        if self.selected.as_deref() == Some(id) {
            self.state = state;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.state = DetailState::Idle;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    /// Drop cached records, e.g. after the inventory was edited
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TreeHealth, TreeStatus};

    fn detail(id: &str) -> TreeDetail {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "tree_code": format!("TR-{id}"),
            "common_name": "Narra",
            "status": "alive",
            "health": "healthy"
        }))
        .unwrap()
    }

    #[test]
    fn test_select_then_resolve() {
        let mut lookup = DetailLookup::default();
        assert_eq!(lookup.state(), &DetailState::Idle);

        let request = lookup.select("t-1").unwrap();
        assert_eq!(request.id, "t-1");
        assert_eq!(lookup.state(), &DetailState::Loading("t-1".to_string()));
        assert!(lookup.select("t-1").is_none());

        lookup.resolve("t-1", Ok(Some(detail("t-1"))));
        match lookup.state() {
            DetailState::Loaded(d) => {
                assert_eq!(d.tree_code, "TR-t-1");
                assert_eq!(d.status, TreeStatus::Alive);
                assert_eq!(d.health, TreeHealth::Healthy);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_cached_detail_needs_no_request() {
        let mut lookup = DetailLookup::default();
        lookup.select("t-1");
        lookup.resolve("t-1", Ok(Some(detail("t-1"))));
        lookup.clear_selection();
        assert_eq!(lookup.state(), &DetailState::Idle);

        assert!(lookup.select("t-1").is_none());
        assert!(matches!(lookup.state(), DetailState::Loaded(_)));
    }

    #[test]
    fn test_missing_tree_shows_not_found() {
        let mut lookup = DetailLookup::default();
        lookup.select("gone");
        lookup.resolve("gone", Ok(None));
        assert_eq!(lookup.state(), &DetailState::NotFound("gone".to_string()));
        assert_eq!(lookup.state().message().as_deref(), Some("Tree not found"));

        // Remembered, no second request
        lookup.clear_selection();
        assert!(lookup.select("gone").is_none());
    }

    #[test]
    fn test_failure_is_not_cached() {
        let mut lookup = DetailLookup::default();
        lookup.select("t-1");
        lookup.resolve("t-1", Err(ApiError::Timeout));
        assert!(matches!(lookup.state(), DetailState::Failed(id, _) if id == "t-1"));
        assert!(lookup.select("t-1").is_some());
    }

    #[test]
    fn test_late_result_for_other_tree_is_cached_silently() {
        let mut lookup = DetailLookup::default();
        lookup.select("t-1");
        lookup.select("t-2");
        lookup.resolve("t-1", Ok(Some(detail("t-1"))));
        assert_eq!(lookup.state(), &DetailState::Loading("t-2".to_string()));
        assert_eq!(lookup.cached_len(), 1);
    }

    #[test]
    fn test_reselecting_pending_tree_sends_no_second_request() {
        let mut lookup = DetailLookup::default();
        assert!(lookup.select("t-1").is_some());
        assert!(lookup.select("t-2").is_some());
        assert!(lookup.select("t-1").is_none());
        assert_eq!(lookup.state(), &DetailState::Loading("t-1".to_string()));

        lookup.resolve("t-1", Ok(Some(detail("t-1"))));
        assert!(matches!(lookup.state(), DetailState::Loaded(d) if d.id == "t-1"));

        // Once answered, a failed id may be asked for again
        lookup.resolve("t-2", Err(ApiError::Timeout));
        assert!(lookup.select("t-2").is_some());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut lookup = DetailLookup::new(2);
        for id in ["a", "b", "c"] {
            lookup.select(id);
            lookup.resolve(id, Ok(Some(detail(id))));
        }
        assert_eq!(lookup.cached_len(), 2);
        assert!(lookup.select("a").is_some());
        assert!(lookup.select("c").is_none());
    }
}
