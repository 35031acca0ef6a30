//! Bottom panel UI: notices shown by the field, newest first.

use super::colors;
use crate::state::PlaygroundState;
use eframe::egui::{self, RichText, ScrollArea};
use map_picker::host::{Notice, NoticeLevel};

/// Notices kept visible in the log.
const LOG_LENGTH: usize = 50;

pub fn render_bottom_panel(ctx: &egui::Context, notices: &[Notice]) {
    egui::TopBottomPanel::bottom("bottom_panel")
        .resizable(true)
        .default_height(90.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new("Notices").strong());
                ui.label(
                    RichText::new(format!("({})", notices.len()))
                        .small()
                        .color(colors::ui::LABEL),
                );
            });
            ui.separator();

            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    if notices.is_empty() {
                        ui.label(RichText::new("Nothing yet").small().color(colors::ui::LABEL));
                    }
                    for notice in notices.iter().rev().take(LOG_LENGTH) {
                        ui.horizontal(|ui| {
                            ui.label(
                                RichText::new(level_label(notice.level))
                                    .monospace()
                                    .small()
                                    .color(level_color(notice.level)),
                            );
                            ui.label(&notice.message);
                        });
                    }
                });
        });
}

/// Shows the oldest unacknowledged blocking notice as a modal-style window.
pub fn render_alert(ctx: &egui::Context, state: &mut PlaygroundState, notices: &[Notice]) {
    let pending = notices
        .iter()
        .filter(|n| n.level == NoticeLevel::Blocking)
        .nth(state.acknowledged_alerts);
    let Some(notice) = pending else {
        return;
    };

    egui::Window::new("Alert")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
        .show(ctx, |ui| {
            ui.label(&notice.message);
            ui.add_space(8.0);
            if ui.button("OK").clicked() {
                state.acknowledged_alerts += 1;
            }
        });
}

fn level_label(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "INFO ",
        NoticeLevel::Success => "OK   ",
        NoticeLevel::Warning => "WARN ",
        NoticeLevel::Error => "ERROR",
        NoticeLevel::Blocking => "ALERT",
    }
}

fn level_color(level: NoticeLevel) -> egui::Color32 {
    match level {
        NoticeLevel::Info => colors::notices::INFO,
        NoticeLevel::Success => colors::notices::SUCCESS,
        NoticeLevel::Warning => colors::notices::WARNING,
        NoticeLevel::Error => colors::notices::ERROR,
        NoticeLevel::Blocking => colors::notices::BLOCKING,
    }
}
