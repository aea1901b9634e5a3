//! REST client for the tree inventory backend
//!
//! [`TreeApi`] is the seam the rest of the crate talks to. [`HttpTreeApi`] is the
//! production implementation; tests substitute in-memory fakes.

use crate::{MapFilters, TreeCluster, TreeDetail, TreeMapItem, ViewportBounds};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Rectangle and filters shared by the bounds and cluster endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsQuery {
    pub bounds: ViewportBounds,
    pub filters: MapFilters,
    pub limit: Option<u32>,
}

impl BoundsQuery {
    /// Query string pairs in the order the backend documents them
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("min_lat", self.bounds.min_lat().to_string()),
            ("min_lng", self.bounds.min_lng().to_string()),
            ("max_lat", self.bounds.max_lat().to_string()),
            ("max_lng", self.bounds.max_lng().to_string()),
        ];
        if let Some(status) = self.filters.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(health) = self.filters.health {
            pairs.push(("health", health.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Read-only access to the tree inventory
#[async_trait]
pub trait TreeApi: Send + Sync {
    /// Individual trees inside a rectangle
    async fn trees_in_bounds(&self, query: &BoundsQuery) -> Result<Vec<TreeMapItem>, ApiError>;

    /// Server-side clusters inside a rectangle for a zoom level
    async fn tree_clusters(
        &self,
        query: &BoundsQuery,
        zoom: u8,
    ) -> Result<Vec<TreeCluster>, ApiError>;

    /// Full record for one tree; `Ok(None)` when the id does not exist
    async fn tree_by_id(&self, id: &str) -> Result<Option<TreeDetail>, ApiError>;
}

/// Settings for [`HttpTreeApi`]
#[derive(Debug, Clone)]
pub struct HttpTreeApiConfig {
    /// API root, e.g. `https://example.org/api/v1/`
    pub base_url: String,
    pub timeout: Duration,
    /// Retries after the first attempt for transient failures
    pub max_retries: usize,
    pub min_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for HttpTreeApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            min_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// `reqwest` implementation of [`TreeApi`]
#[derive(Debug, Clone)]
pub struct HttpTreeApi {
    http: Client,
    base_url: Url,
    config: HttpTreeApiConfig,
}

impl HttpTreeApi {
    pub fn new(config: HttpTreeApiConfig) -> Result<Self, ApiError> {
        // A base without a trailing slash would make `join` drop its last segment
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("tree-map/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the individual-trees endpoint for a query
    pub fn bounds_url(&self, query: &BoundsQuery) -> Result<Url, ApiError> {
        let mut url = self.endpoint("tree-inventory/trees/bounds")?;
        url.query_pairs_mut().extend_pairs(query.to_pairs());
        Ok(url)
    }

    /// URL of the clusters endpoint for a query and zoom level
    pub fn clusters_url(&self, query: &BoundsQuery, zoom: u8) -> Result<Url, ApiError> {
        let mut url = self.endpoint("tree-inventory/trees/clusters")?;
        let mut pairs = query.to_pairs();
        pairs.retain(|(k, _)| *k != "limit");
        pairs.insert(4, ("zoom", zoom.to_string()));
        url.query_pairs_mut().extend_pairs(pairs);
        Ok(url)
    }

    /// URL of a single tree record
    pub fn tree_url(&self, id: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint("tree-inventory/trees")?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .push(id);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    /// GET with retries; `Ok(None)` on 404
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ApiError> {
        (|| async { self.send_get::<T>(url.clone()).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.config.min_retry_delay)
                    .with_max_delay(self.config.max_retry_delay)
                    .with_max_times(self.config.max_retries)
                    .with_jitter(),
            )
            .when(|e: &ApiError| e.should_retry())
            .notify(|e, dur| {
                tracing::warn!(
                    "Tree API call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_get<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ApiError> {
        tracing::debug!(%url, "GET");
        let res = self.http.get(url).send().await.map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => res
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| ApiError::Decode(e.to_string())),
            StatusCode::NOT_FOUND => Ok(None),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ApiError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl TreeApi for HttpTreeApi {
    async fn trees_in_bounds(&self, query: &BoundsQuery) -> Result<Vec<TreeMapItem>, ApiError> {
        let url = self.bounds_url(query)?;
        let items = self.get_json::<Vec<TreeMapItem>>(url).await?;
        items.ok_or_else(|| ApiError::Http {
            status: 404,
            body: "bounds endpoint not found".to_string(),
        })
    }

    async fn tree_clusters(
        &self,
        query: &BoundsQuery,
        zoom: u8,
    ) -> Result<Vec<TreeCluster>, ApiError> {
        let url = self.clusters_url(query, zoom)?;
        let clusters = self.get_json::<Vec<TreeCluster>>(url).await?;
        clusters.ok_or_else(|| ApiError::Http {
            status: 404,
            body: "clusters endpoint not found".to_string(),
        })
    }

    async fn tree_by_id(&self, id: &str) -> Result<Option<TreeDetail>, ApiError> {
        let url = self.tree_url(id)?;
        self.get_json::<TreeDetail>(url).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TreeHealth, TreeStatus};

    fn api() -> HttpTreeApi {
        HttpTreeApi::new(HttpTreeApiConfig {
            base_url: "https://city.example.org/api/v1".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn query(filters: MapFilters, limit: Option<u32>) -> BoundsQuery {
        BoundsQuery {
            bounds: ViewportBounds::new(14.85, 120.55, 15.15, 120.85).unwrap(),
            filters,
            limit,
        }
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        assert_eq!(api().base_url().as_str(), "https://city.example.org/api/v1/");
    }

    #[test]
    fn test_bounds_url() {
        let url = api()
            .bounds_url(&query(MapFilters::default(), Some(1000)))
            .unwrap();
        assert_eq!(url.path(), "/api/v1/tree-inventory/trees/bounds");
        assert_eq!(
            url.query(),
            Some("min_lat=14.85&min_lng=120.55&max_lat=15.15&max_lng=120.85&limit=1000")
        );
    }

    #[test]
    fn test_bounds_url_with_filters() {
        let filters = MapFilters {
            status: Some(TreeStatus::Alive),
            health: Some(TreeHealth::NeedsAttention),
        };
        let url = api().bounds_url(&query(filters, None)).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("status".to_string(), "alive".to_string())));
        assert!(pairs.contains(&("health".to_string(), "needs_attention".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "limit"));
    }

    #[test]
    fn test_clusters_url_carries_zoom_not_limit() {
        let url = api()
            .clusters_url(&query(MapFilters::default(), Some(1000)), 14)
            .unwrap();
        assert_eq!(url.path(), "/api/v1/tree-inventory/trees/clusters");
        assert_eq!(
            url.query(),
            Some("min_lat=14.85&min_lng=120.55&max_lat=15.15&max_lng=120.85&zoom=14")
        );
    }

    #[test]
    fn test_tree_url_escapes_id() {
        let url = api().tree_url("abc/123").unwrap();
        assert_eq!(url.path(), "/api/v1/tree-inventory/trees/abc%2F123");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpTreeApi::new(HttpTreeApiConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_should_retry() {
        assert!(ApiError::Timeout.should_retry());
        assert!(ApiError::Transport("reset".to_string()).should_retry());
        assert!(
            ApiError::Http {
                status: 503,
                body: String::new()
            }
            .should_retry()
        );
        assert!(
            !ApiError::Http {
                status: 400,
                body: String::new()
            }
            .should_retry()
        );
        assert!(!ApiError::Decode("eof".to_string()).should_retry());
    }
}
