//! Left panel UI: the hosting form and the events it can fire.

use super::colors;
use crate::file_ops::FilePickerChannel;
use crate::state::PlaygroundState;
use eframe::egui::{self, RichText, ScrollArea};
use map_picker::controller::MapMessage;
use map_picker::host::{FormHost, HostEvent, MemoryHost};
use map_picker::runtime::MapField;
use serde_json::{json, Value};

/// Longest JSON preview shown for a state path.
const PREVIEW_CHARS: usize = 160;

pub fn render_left_panel(
    ctx: &egui::Context,
    state: &mut PlaygroundState,
    field: &mut MapField<MemoryHost>,
    file_picker: &FilePickerChannel,
) {
    egui::SidePanel::left("left_panel")
        .resizable(true)
        .default_width(280.0)
        .min_width(220.0)
        .max_width(420.0)
        .show(ctx, |ui| {
            ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Form");
                ui.separator();

                render_container_section(ui, state, field);
                ui.add_space(5.0);

                render_state_section(ui, state, field);
                ui.add_space(5.0);

                render_marker_section(ui, state, field);
                ui.add_space(5.0);

                render_geojson_section(ui, ctx, state, field, file_picker);
                ui.add_space(5.0);

                render_location_section(ui, state, field);
            });
        });
}

/// Fires a named form event and reports decoding errors in the status bar.
fn dispatch(
    field: &mut MapField<MemoryHost>,
    state: &mut PlaygroundState,
    name: &str,
    payload: Value,
) {
    match field.dispatch(name, &payload) {
        Ok(()) => state.status_message = format!("Dispatched {}", name),
        Err(e) => {
            log::warn!("{}", e);
            state.status_message = e.to_string();
        }
    }
}

fn render_container_section(
    ui: &mut egui::Ui,
    state: &mut PlaygroundState,
    field: &mut MapField<MemoryHost>,
) {
    egui::CollapsingHeader::new(RichText::new("Container").strong())
        .default_open(true)
        .show(ui, |ui| {
            if ui
                .checkbox(&mut state.container_visible, "Scrolled into view")
                .changed()
            {
                field.send(MapMessage::VisibilityChanged {
                    visible: state.container_visible,
                });
            }
            ui.horizontal(|ui| {
                if ui.button("Refresh map").clicked() {
                    dispatch(field, state, HostEvent::REFRESH_MAP, Value::Null);
                }
                if ui.button("Capture image").clicked() {
                    dispatch(field, state, HostEvent::CAPTURE_MAP_IMAGE, Value::Null);
                }
            });
            if ui
                .button("Remove from page")
                .on_hover_text("Detaches the field; it never shows a map again")
                .clicked()
            {
                field.send(MapMessage::Detach);
                state.status_message = "Field detached".to_string();
            }
        });
}

fn render_state_section(
    ui: &mut egui::Ui,
    state: &mut PlaygroundState,
    field: &mut MapField<MemoryHost>,
) {
    egui::CollapsingHeader::new(RichText::new("State").strong())
        .default_open(true)
        .show(ui, |ui| {
            let config = field.controller().config().clone();
            let host = field.host();

            if host.state().is_empty() {
                ui.label(RichText::new("No state written yet").small().color(colors::ui::LABEL));
            }
            for (path, value) in host.state() {
                ui.label(RichText::new(path).small().color(colors::ui::LABEL));
                ui.label(RichText::new(preview(&value.to_string())).monospace().small());
            }

            ui.add_space(4.0);
            ui.label(RichText::new("Hidden GeoJSON input").small().color(colors::ui::LABEL));
            let hidden = host
                .hidden_field()
                .map(|text| if text.is_empty() { "(empty)".to_string() } else { preview(&text) })
                .unwrap_or_else(|| "(missing)".to_string());
            ui.label(RichText::new(hidden).monospace().small());
            ui.label(
                RichText::new(format!("Refresh requests: {}", host.refreshes))
                    .small()
                    .color(colors::ui::VALUE),
            );

            if let Some(range_path) = config.range_select_field.as_deref() {
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    ui.label(format!("{} (m)", range_path));
                    if ui.text_edit_singleline(&mut state.range_text).changed() {
                        let text = state.range_text.trim();
                        let value = if text.is_empty() { Value::Null } else { json!(text) };
                        field.host_mut().put(range_path, value);
                    }
                });
            }
        });
}

fn render_marker_section(
    ui: &mut egui::Ui,
    state: &mut PlaygroundState,
    field: &mut MapField<MemoryHost>,
) {
    egui::CollapsingHeader::new(RichText::new("Marker").strong())
        .default_open(true)
        .show(ui, |ui| {
            egui::Grid::new("marker_position_grid")
                .num_columns(2)
                .show(ui, |ui| {
                    ui.label("Lat");
                    ui.text_edit_singleline(&mut state.marker_lat);
                    ui.end_row();
                    ui.label("Lng");
                    ui.text_edit_singleline(&mut state.marker_lng);
                    ui.end_row();
                });
            ui.checkbox(&mut state.marker_fix, "Fix marker");

            let lat = state.marker_lat.trim().parse::<f64>();
            let lng = state.marker_lng.trim().parse::<f64>();
            let valid = lat.is_ok() && lng.is_ok();
            if ui
                .add_enabled(valid, egui::Button::new("Update position"))
                .clicked()
            {
                if let (Ok(lat), Ok(lng)) = (lat, lng) {
                    let payload = json!([{ "lat": lat, "lng": lng, "fix": state.marker_fix }]);
                    dispatch(field, state, HostEvent::UPDATE_MARKER_POSITION, payload);
                }
            }

            ui.add_space(4.0);
            egui::Grid::new("marker_icon_grid")
                .num_columns(2)
                .show(ui, |ui| {
                    ui.label("Icon URL");
                    ui.text_edit_singleline(&mut state.icon_url);
                    ui.end_row();
                    ui.label("Color");
                    ui.text_edit_singleline(&mut state.icon_color);
                    ui.end_row();
                    ui.label("Size");
                    ui.text_edit_singleline(&mut state.icon_size);
                    ui.end_row();
                });
            if ui.button("Update icon").clicked() {
                let payload = json!({
                    "url": state.icon_url,
                    "color": state.icon_color,
                    "size": state.icon_size.trim().parse::<f64>().ok(),
                });
                dispatch(field, state, HostEvent::UPDATE_MARKER_ICON, payload);
            }
        });
}

fn render_geojson_section(
    ui: &mut egui::Ui,
    ctx: &egui::Context,
    state: &mut PlaygroundState,
    field: &mut MapField<MemoryHost>,
    file_picker: &FilePickerChannel,
) {
    egui::CollapsingHeader::new(RichText::new("GeoJSON").strong())
        .default_open(true)
        .show(ui, |ui| {
            ui.add_enabled_ui(!state.picking_file, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Load file...").clicked() {
                        state.picking_file = true;
                        state.status_message = "Opening file dialog...".to_string();
                        file_picker.pick_file(ctx.clone());
                    }
                    if ui.button("Clear").clicked() {
                        dispatch(field, state, HostEvent::LOAD_GEOJSON, json!({ "geojson": "" }));
                    }
                });
            });

            if state.picking_file {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Selecting file...");
                });
            }

            if let Some((name, size)) = &state.loaded_file {
                ui.group(|ui| {
                    ui.label(RichText::new(name).strong().monospace());
                    ui.label(format_file_size(*size));
                });
            }

            let count = field.controller().shapes().len();
            ui.label(
                RichText::new(format!("{} drawn shape(s)", count))
                    .small()
                    .color(colors::ui::VALUE),
            );
            if field.controller().geojson_write_back_disabled() {
                ui.label(
                    RichText::new("Write-back disabled: hidden input is missing")
                        .small()
                        .color(colors::notices::WARNING),
                );
            }
        });
}

fn render_location_section(
    ui: &mut egui::Ui,
    state: &mut PlaygroundState,
    field: &mut MapField<MemoryHost>,
) {
    egui::CollapsingHeader::new(RichText::new("Device location").strong())
        .default_open(false)
        .show(ui, |ui| {
            let mut changed = ui
                .checkbox(&mut state.simulate_location, "Simulate a position")
                .changed();
            ui.add_enabled_ui(state.simulate_location, |ui| {
                egui::Grid::new("location_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Lat");
                    changed |= ui.text_edit_singleline(&mut state.simulated_lat).changed();
                    ui.end_row();
                    ui.label("Lng");
                    changed |= ui.text_edit_singleline(&mut state.simulated_lng).changed();
                    ui.end_row();
                });
            });
            if changed {
                field.location_mut().set_simulated(state.simulated_position());
            }
            if state.simulate_location && state.simulated_position().is_none() {
                ui.label(
                    RichText::new("Not a valid position")
                        .small()
                        .color(colors::notices::ERROR),
                );
            }
        });
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", head)
}

fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
