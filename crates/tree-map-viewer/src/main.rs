#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

// The binary uses the library, not duplicate modules
use tree_map_viewer::{TreeMapApp, logging};

const APP_NAME: &str = "Tree Map Viewer";

fn main() {
    logging::setup_logging();
    logging::log_version_info();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // The app spawns its fetches on this runtime, so it must be entered first
    rt.block_on(async {
        let native_options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1280.0, 720.0])
                .with_title(APP_NAME),
            ..Default::default()
        };

        if let Err(e) = eframe::run_native(
            APP_NAME,
            native_options,
            Box::new(|cc| Ok(Box::new(TreeMapApp::new(cc)))),
        ) {
            tracing::error!("{APP_NAME} exited with an error: {e}");
        }
    });
}
