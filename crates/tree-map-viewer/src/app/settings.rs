use clap::Parser;
use std::time::Duration;
use tree_map_lib::{CachePolicy, HttpTreeApiConfig};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Tree Map Viewer - Browse a city tree inventory on a slippy map
pub struct Settings {
    /// Base URL of the tree inventory REST API
    #[clap(long, default_value = "http://localhost:8000/api/v1/")]
    pub api_url: String,

    /// Zoom level at which clusters give way to individual trees
    #[clap(long, default_value = "16")]
    pub cluster_zoom_threshold: f64,

    /// Factor the viewport is scaled by before fetching (>= 1.0)
    #[clap(long, default_value = "1.5")]
    pub expansion_factor: f64,

    /// Maximum individual trees per request (0 = no limit)
    #[clap(long, default_value = "1000")]
    pub tree_limit: u32,

    /// Refetch clusters on every integer zoom change, not only when switching modes
    #[clap(long, default_value = "false")]
    pub refetch_clusters_on_zoom_change: bool,

    /// Initial map center latitude
    #[clap(long, default_value = "15.0287", allow_hyphen_values = true)]
    pub center_lat: f64,

    /// Initial map center longitude
    #[clap(long, default_value = "120.6880", allow_hyphen_values = true)]
    pub center_lng: f64,

    /// Initial zoom level
    #[clap(long, default_value = "14")]
    pub zoom: f64,

    /// Per-request timeout in seconds
    #[clap(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// Retries for transient API failures
    #[clap(long, default_value = "3")]
    pub max_retries: usize,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

impl Settings {
    /// Parse the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            cluster_zoom_threshold: self.cluster_zoom_threshold,
            expansion_factor: self.expansion_factor,
            refetch_clusters_on_zoom_change: self.refetch_clusters_on_zoom_change,
            tree_limit: (self.tree_limit > 0).then_some(self.tree_limit),
            ..Default::default()
        }
    }

    pub fn api_config(&self) -> HttpTreeApiConfig {
        HttpTreeApiConfig {
            base_url: self.api_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_from(["tree-map-viewer"]);
        assert_eq!(settings.center_lat, 15.0287);
        assert_eq!(settings.zoom, 14.0);
        assert_eq!(settings.cache_policy(), CachePolicy::default());
        assert_eq!(settings.api_config().max_retries, 3);
    }

    #[test]
    fn test_zero_limit_means_unlimited() {
        let settings = Settings::parse_from(["tree-map-viewer", "--tree-limit", "0"]);
        assert_eq!(settings.cache_policy().tree_limit, None);
    }

    #[test]
    fn test_negative_coordinates() {
        let settings = Settings::parse_from(["tree-map-viewer", "--center-lng", "-73.97"]);
        assert_eq!(settings.center_lng, -73.97);
    }
}
