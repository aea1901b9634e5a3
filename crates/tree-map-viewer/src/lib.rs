//! Tree Map Viewer - Application Library
//!
//! Desktop front end for the tree inventory map. Wires the map widget to the
//! viewport-bounds cache in `tree-map-lib`.

mod app;
pub mod logging;

pub use app::TreeMapApp;
