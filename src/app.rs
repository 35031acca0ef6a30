//! Playground application: one map field over the headless engine.

use crate::file_ops::{FilePickerChannel, PickOutcome};
use crate::state::{DrawTool, PlaygroundState};
use crate::ui;
use eframe::egui;
use map_picker::config::MapConfig;
use map_picker::engine::HeadlessFactory;
use map_picker::host::{HostEvent, MemoryHost};
use map_picker::runtime::MapField;
use map_picker::services::LocationChannel;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use web_time::Instant;

/// Configuration used when none is given on the command line.
static DEFAULT_CONFIG: &str = include_str!("../demos/playground.json");

/// Token the in-memory form hands to snapshot uploads.
const CSRF_TOKEN: &str = "playground-csrf-token";

/// Interval at which the field is pumped while idle.
const PUMP_INTERVAL: Duration = Duration::from_millis(100);

pub struct PlaygroundApp {
    state: PlaygroundState,
    field: MapField<MemoryHost>,
    factory: HeadlessFactory,
    file_picker: FilePickerChannel,
}

/// Reads the field configuration, falling back to the bundled demo.
pub fn load_config(path: Option<&Path>) -> MapConfig {
    if let Some(path) = path {
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| MapConfig::from_json(&text).map_err(|e| e.to_string()));
        match loaded {
            Ok(config) => {
                log::info!("Loaded configuration from {}", path.display());
                return config;
            }
            Err(e) => log::error!("Failed to load {}: {}", path.display(), e),
        }
    }
    MapConfig::from_json(DEFAULT_CONFIG).unwrap_or_else(|e| {
        log::error!("Bundled configuration is invalid: {}", e);
        MapConfig::default()
    })
}

impl PlaygroundApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: MapConfig) -> Self {
        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        let state = PlaygroundState::default();
        let factory = HeadlessFactory::default();
        let host = MemoryHost::new()
            .with_hidden_field("")
            .with_csrf_token(CSRF_TOKEN);
        let mut location = LocationChannel::new();
        location.set_simulated(state.simulated_position());

        let mut field =
            MapField::new(config, Box::new(factory.clone()), host).with_location(location);
        field.attach(state.container_visible, Instant::now());
        log::info!("Playground started");

        Self {
            state,
            field,
            factory,
            file_picker: FilePickerChannel::new(),
        }
    }

    fn poll_file_picker(&mut self) {
        let Some(outcome) = self.file_picker.try_recv() else {
            return;
        };
        self.state.picking_file = false;
        match outcome {
            PickOutcome::Picked(file) => {
                log::info!(
                    "Loading {} ({} bytes, {} shapes)",
                    file.file_name,
                    file.file_size,
                    file.shape_count
                );
                let payload = json!({ "geojson": file.text });
                match self.field.dispatch(HostEvent::LOAD_GEOJSON, &payload) {
                    Ok(()) => {
                        self.state.status_message =
                            format!("Loaded {} shapes from {}", file.shape_count, file.file_name);
                        self.state.loaded_file = Some((file.file_name, file.file_size));
                    }
                    Err(e) => self.state.status_message = e.to_string(),
                }
            }
            PickOutcome::Invalid { file_name, error } => {
                log::warn!("Rejected {}: {}", file_name, error);
                self.state.status_message =
                    format!("{} is not valid GeoJSON: {}", file_name, error);
            }
            PickOutcome::Cancelled => {
                self.state.status_message = "File selection cancelled".to_string();
            }
        }
    }
}

impl eframe::App for PlaygroundApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_file_picker();

        let surface = self.factory.current();
        let toolbar = surface
            .as_ref()
            .filter(|s| !s.borrow().destroyed)
            .and_then(|s| s.borrow().toolbar.clone());
        let tool_available = match &toolbar {
            Some(toolbar) => self.state.tool.enabled(toolbar),
            None => self.state.tool == DrawTool::Pointer,
        };
        if !tool_available {
            self.state.select_tool(DrawTool::Pointer);
        }
        if let Some(id) = self.state.selected {
            if !self.field.controller().shapes().contains(id) {
                self.state.selected = None;
            }
        }

        ui::render_top_bar(ctx, &self.state, self.field.controller());
        ui::render_bottom_panel(ctx, &self.field.host().notices);
        ui::render_left_panel(ctx, &mut self.state, &mut self.field, &self.file_picker);
        let mut messages =
            ui::render_right_panel(ctx, &mut self.state, &self.field, toolbar.as_ref());
        messages.extend(ui::render_canvas(ctx, &mut self.state, surface));
        ui::render_alert(ctx, &mut self.state, &self.field.host().notices);

        for message in messages {
            self.field.send(message);
        }
        self.field.pump(Instant::now());

        ctx.request_repaint_after(PUMP_INTERVAL);
    }
}
