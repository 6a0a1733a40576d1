//! Read-only view of the query behind the latest answer.

use egui::{self, RichText, ScrollArea};
use crate::theme::*;

pub fn sql_panel(ui: &mut egui::Ui, sql_query: &str) {
    egui::Frame::default()
        .fill(CODE_BG)
        .inner_margin(PANEL_PADDING)
        .corner_radius(PANEL_ROUNDING)
        .show(ui, |ui| {
            ui.label(RichText::new("SQL Query").color(CODE_FG).strong().monospace());
            ui.separator();

            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    if sql_query.is_empty() {
                        ui.label(
                            RichText::new("No query yet. Ask Billy a question.")
                                .color(TEXT_SECONDARY)
                                .italics()
                                .monospace(),
                        );
                    } else {
                        // Selectable but not editable
                        let mut text = sql_query;
                        ui.add(
                            egui::TextEdit::multiline(&mut text)
                                .code_editor()
                                .text_color(CODE_FG)
                                .desired_width(f32::INFINITY),
                        );
                    }
                });
        });
}
