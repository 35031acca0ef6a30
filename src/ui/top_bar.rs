//! Top bar UI: title, lifecycle and marker status.

use super::colors;
use crate::state::PlaygroundState;
use eframe::egui::{self, Color32, RichText};
use map_picker::controller::{Lifecycle, MapController};

pub fn render_top_bar(ctx: &egui::Context, state: &PlaygroundState, controller: &MapController) {
    egui::TopBottomPanel::top("top_bar")
        .exact_height(36.0)
        .show(ctx, |ui| {
            ui.horizontal_centered(|ui| {
                ui.label(
                    RichText::new("Map Picker Playground")
                        .strong()
                        .size(16.0)
                        .color(Color32::WHITE),
                );

                ui.separator();

                let (text, color) = match controller.lifecycle() {
                    Lifecycle::Active { generation } => {
                        (format!("Active #{}", generation), colors::ui::SUCCESS)
                    }
                    Lifecycle::Inactive => ("Inactive".to_string(), colors::ui::LABEL),
                };
                ui.label(RichText::new(text).monospace().size(12.0).color(color));

                ui.separator();

                let position = controller
                    .marker_position()
                    .map(|p| format!("{:.5}, {:.5}", p.lat, p.lng))
                    .unwrap_or_else(|| "no marker".to_string());
                ui.label(RichText::new(position).monospace().size(12.0).color(colors::ui::VALUE));
                let mode = if controller.follows_map() { "follow" } else { "fixed" };
                ui.label(RichText::new(mode).size(12.0).color(colors::ui::ACTIVE));
                if controller.has_pending_sync() {
                    ui.spinner();
                }

                ui.separator();

                ui.label(
                    RichText::new(&state.status_message)
                        .size(13.0)
                        .color(Color32::GRAY),
                );
            });
        });
}
