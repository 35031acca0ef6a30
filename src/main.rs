#![warn(clippy::all)]

//! Map Picker Playground - a desktop harness for the map picker field.
//!
//! Hosts one field over the headless map engine and an in-memory form, so the
//! controller can be driven by hand: pan, click, draw, edit and delete shapes,
//! bulk-load GeoJSON and fire every form event.
//!
//! Usage: `map-picker [config.json]`

#[cfg(not(target_arch = "wasm32"))]
mod app;
#[cfg(not(target_arch = "wasm32"))]
mod file_ops;
#[cfg(not(target_arch = "wasm32"))]
mod state;
#[cfg(not(target_arch = "wasm32"))]
mod ui;

// Native entry point
#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    env_logger::init();

    let config_path = std::env::args_os().nth(1).map(std::path::PathBuf::from);
    let config = app::load_config(config_path.as_deref());

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("Map Picker Playground"),
        ..Default::default()
    };

    eframe::run_native(
        "Map Picker Playground",
        native_options,
        Box::new(|cc| Ok(Box::new(app::PlaygroundApp::new(cc, config)))),
    )
}

// The browser build is driven by `map_picker::web`; main is not called on wasm32
#[cfg(target_arch = "wasm32")]
fn main() {}
