//! Right panel UI: layer switcher, draw tools and the drawn shapes.

use super::colors;
use crate::state::{DrawTool, PlaygroundState};
use eframe::egui::{self, RichText, ScrollArea};
use egui_phosphor::regular as icons;
use map_picker::config::DrawToolbar;
use map_picker::controller::MapMessage;
use map_picker::host::MemoryHost;
use map_picker::runtime::MapField;

pub fn render_right_panel(
    ctx: &egui::Context,
    state: &mut PlaygroundState,
    field: &MapField<MemoryHost>,
    toolbar: Option<&DrawToolbar>,
) -> Vec<MapMessage> {
    let mut messages = Vec::new();

    egui::SidePanel::right("right_panel")
        .resizable(true)
        .default_width(220.0)
        .min_width(180.0)
        .max_width(350.0)
        .show(ctx, |ui| {
            ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Map");
                ui.separator();

                render_layers_section(ui, field, &mut messages);
                ui.add_space(5.0);

                render_tools_section(ui, state, toolbar, &mut messages);
                ui.add_space(5.0);

                render_shapes_section(ui, state, field, toolbar, &mut messages);
            });
        });

    messages
}

fn render_layers_section(
    ui: &mut egui::Ui,
    field: &MapField<MemoryHost>,
    messages: &mut Vec<MapMessage>,
) {
    egui::CollapsingHeader::new(RichText::new("Layers").strong())
        .default_open(true)
        .show(ui, |ui| {
            let layers = field.controller().layers();
            if layers.base_layers().is_empty() {
                ui.label(RichText::new("No map surface").small().color(colors::ui::LABEL));
                return;
            }

            let active = layers.active_base().unwrap_or_default();
            for base in layers.base_layers() {
                if ui.radio(base.name == active, &base.name).clicked() && base.name != active {
                    messages.push(MapMessage::SelectBaseLayer(base.name.clone()));
                }
            }

            if !layers.overlays().is_empty() {
                ui.separator();
                ui.label(RichText::new("Overlays").small());
            }
            for overlay in layers.overlays() {
                ui.horizontal(|ui| {
                    let mut visible = overlay.visible;
                    if ui.checkbox(&mut visible, &overlay.name).changed() {
                        messages.push(MapMessage::SetOverlayVisible {
                            name: overlay.name.clone(),
                            visible,
                        });
                    }
                    if overlay.handle.is_none() {
                        ui.spinner();
                    }
                });
            }
        });
}

fn render_tools_section(
    ui: &mut egui::Ui,
    state: &mut PlaygroundState,
    toolbar: Option<&DrawToolbar>,
    messages: &mut Vec<MapMessage>,
) {
    egui::CollapsingHeader::new(RichText::new("Tools").strong())
        .default_open(true)
        .show(ui, |ui| {
            for tool in DrawTool::all() {
                let enabled = match toolbar {
                    Some(toolbar) => tool.enabled(toolbar),
                    None => *tool == DrawTool::Pointer,
                };
                if !enabled {
                    continue;
                }
                let label = format!("{} {}", tool.icon(), tool.label());
                if ui.selectable_label(state.tool == *tool, label).clicked() {
                    state.select_tool(*tool);
                }
            }

            if state.tool == DrawTool::Text {
                ui.text_edit_singleline(&mut state.text_label);
            }
            if state.tool.is_multi_point() {
                ui.label(
                    RichText::new(format!("{} point(s), Enter to finish", state.sketch.len()))
                        .small()
                        .color(colors::ui::VALUE),
                );
                if ui.button("Finish").clicked() {
                    if let Some(shape) = state.finish_sketch() {
                        messages.push(MapMessage::ShapeCreated(shape));
                    }
                }
            }
        });
}

fn render_shapes_section(
    ui: &mut egui::Ui,
    state: &mut PlaygroundState,
    field: &MapField<MemoryHost>,
    toolbar: Option<&DrawToolbar>,
    messages: &mut Vec<MapMessage>,
) {
    egui::CollapsingHeader::new(RichText::new("Shapes").strong())
        .default_open(true)
        .show(ui, |ui| {
            let shapes = field.controller().shapes();
            if shapes.is_empty() {
                ui.label(RichText::new("Nothing drawn").small().color(colors::ui::LABEL));
                return;
            }

            let removable = toolbar.is_some_and(|t| t.delete_layer);
            for (id, shape) in shapes.iter() {
                ui.horizontal(|ui| {
                    let selected = state.selected == Some(id);
                    let label = format!("{} #{}", shape.kind.name(), id.0);
                    if ui.selectable_label(selected, label).clicked() {
                        state.selected = if selected { None } else { Some(id) };
                    }
                    if removable && ui.small_button(icons::TRASH).clicked() {
                        messages.push(MapMessage::ShapeRemoved(id));
                        if selected {
                            state.selected = None;
                        }
                    }
                });
            }
        });
}
