//! Logging initialization
//!
//! Installs a `tracing` subscriber with an `EnvFilter`-driven fmt layer. When
//! `RUST_LOG` is unset a default suited to the build profile is used.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

const DEFAULT_DEBUG_FILTER: &str =
    "debug,tree_map_lib=trace,eframe=warn,egui::context=warn,walkers=info,hyper_util=info,reqwest::connect=info";
const DEFAULT_RELEASE_FILTER: &str = "info,eframe=warn,walkers=info";

/// Must run before anything logs
pub fn setup_logging() {
    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var(
                "RUST_LOG",
                if cfg!(debug_assertions) {
                    DEFAULT_DEBUG_FILTER
                } else {
                    DEFAULT_RELEASE_FILTER
                },
            );
        }
    }

    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();

    if defaulted {
        tracing::info!(
            "RUST_LOG set to default: {}",
            std::env::var("RUST_LOG").unwrap_or_default()
        );
    }
}

/// Log the crate version once at startup
pub fn log_version_info() {
    tracing::info!(
        "{} v{} (tree-map-lib)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
}
