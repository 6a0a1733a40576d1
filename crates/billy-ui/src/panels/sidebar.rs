//! Sidebar: chat history list and the new-chat button.

use egui::{self, RichText, ScrollArea, Vec2};
use billy_types::session::ChatSummary;
use crate::theme::*;

pub enum SidebarAction {
    None,
    NewChat,
    Select(String),
}

/// Render the chat list. `chats` is in sidebar order, most recent first.
pub fn sidebar_panel(
    ui: &mut egui::Ui,
    chats: &[ChatSummary],
    active_id: Option<&str>,
    loading: bool,
) -> SidebarAction {
    let mut action = SidebarAction::None;

    egui::Frame::default()
        .fill(BG_SECONDARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            let new_chat = ui.add(
                egui::Button::new(RichText::new("+ New Chat").color(TEXT_PRIMARY).strong())
                    .fill(ACCENT)
                    .corner_radius(PANEL_ROUNDING)
                    .min_size(Vec2::new(ui.available_width(), 32.0)),
            );
            if new_chat.clicked() {
                action = SidebarAction::NewChat;
            }

            ui.add_space(8.0);
            ui.label(RichText::new("History").color(TEXT_SECONDARY).small());
            ui.separator();

            if loading {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new("Loading chats...").color(TEXT_SECONDARY).small());
                });
            }

            ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    for chat in chats {
                        let selected = active_id == Some(chat.id.as_str());
                        let color = if selected { TEXT_PRIMARY } else { TEXT_SECONDARY };
                        let row = ui
                            .selectable_label(selected, RichText::new(&chat.name).color(color))
                            .on_hover_text(format!("{} messages", chat.message_count));
                        if row.clicked() && !selected {
                            action = SidebarAction::Select(chat.id.clone());
                        }
                    }
                });
        });

    action
}
