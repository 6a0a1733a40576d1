//! Chat panel: conversation, per-answer controls and the input field.

use egui::{self, Align, Layout, RichText, ScrollArea, Vec2};
use billy_core::store::SessionStore;
use billy_types::message::{Message, Role};
use crate::markdown::show_markdown;
use crate::state::UiState;
use crate::theme::*;

/// Starter prompts offered on an empty chat: (title, prompt)
pub const SUGGESTIONS: [(&str, &str); 3] = [
    (
        "Tua's Injury",
        "What are the key stats I should consider before betting on Cowboys vs Giants?",
    ),
    ("Props for Week 3", "How has Ceedee Lamb performed in his last 3 games?"),
    (
        "Ravens vs. Cowboys",
        "How do Dallas Cowboys and New York Giants match up head-to-head?",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    None,
    Send(String),
    AskAgain(usize),
    Feedback { index: usize, approved: bool },
    /// Start voice input, or stop it while listening
    ToggleVoice,
}

/// Render the active chat. `greeting` is the name shown on an empty chat.
pub fn chat_panel(
    ui: &mut egui::Ui,
    state: &mut UiState,
    store: &SessionStore,
    greeting: &str,
) -> ChatAction {
    let mut action = ChatAction::None;
    let Some(session) = store.active() else {
        ui.label(RichText::new("No chat selected").color(TEXT_SECONDARY));
        return action;
    };
    let chat_id = session.id.as_str();
    let answering = store.is_answering(chat_id);

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.heading(RichText::new(&session.name).color(TEXT_PRIMARY).strong());
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    let status_color = if answering { WARNING } else { SUCCESS };
                    ui.label(RichText::new(&state.status_text).color(status_color).small());
                    ui.toggle_value(&mut state.show_sql, RichText::new("SQL").small());
                });
            });

            if let Some(error) = &state.error_text {
                ui.label(RichText::new(error).color(ERROR).small());
            }

            ui.separator();

            let available_height = ui.available_height() - 60.0;
            ScrollArea::vertical()
                .max_height(available_height)
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    if session.messages.is_empty() {
                        if let Some(prompt) = suggestions(ui, greeting) {
                            action = ChatAction::Send(prompt.to_string());
                        }
                    }

                    for (index, message) in session.messages.iter().enumerate() {
                        render_message(ui, message);
                        if message.role == Role::Assistant && !answering {
                            if let Some(a) = answer_controls(ui, store, chat_id, index) {
                                action = a;
                            }
                        }
                        ui.add_space(4.0);
                    }
                });

            ui.add_space(8.0);

            ui.horizontal(|ui| {
                let buttons_width = if state.voice_supported { 110.0 } else { 70.0 };
                let input = egui::TextEdit::singleline(&mut state.input_text)
                    .hint_text("Ask Billy about a game...")
                    .desired_width(ui.available_width() - buttons_width)
                    .font(egui::FontId::proportional(14.0));

                let response = ui.add(input);

                if state.voice_supported {
                    let (icon, fill) = if state.listening { ("■", WARNING) } else { ("🎤", BG_SURFACE) };
                    let mic = ui.add_enabled(
                        !answering,
                        egui::Button::new(RichText::new(icon).color(TEXT_PRIMARY))
                            .fill(fill)
                            .corner_radius(PANEL_ROUNDING),
                    );
                    if mic.on_hover_text(voice_hint(state.listening)).clicked() {
                        action = ChatAction::ToggleVoice;
                    }
                }

                let send_enabled = !state.input_text.trim().is_empty() && !answering;
                let send_btn = ui.add_enabled(
                    send_enabled,
                    egui::Button::new(RichText::new("Send").color(TEXT_PRIMARY))
                        .fill(if send_enabled { ACCENT } else { BG_SURFACE })
                        .corner_radius(PANEL_ROUNDING)
                        .min_size(Vec2::new(60.0, 0.0)),
                );

                let entered = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if send_enabled && (entered || send_btn.clicked()) {
                    if let Some(text) = state.take_input() {
                        action = ChatAction::Send(text);
                    }
                    response.request_focus();
                }
            });
        });

    action
}

fn suggestions(ui: &mut egui::Ui, greeting: &str) -> Option<&'static str> {
    let mut picked = None;
    ui.add_space(24.0);
    ui.vertical_centered(|ui| {
        ui.heading(RichText::new(format!("Hi {}, I'm Billy", greeting)).color(TEXT_PRIMARY));
        ui.label(RichText::new("Ask me anything about this week's games.").color(TEXT_SECONDARY));
        ui.add_space(12.0);
        for (title, prompt) in SUGGESTIONS {
            let card = egui::Button::new(
                RichText::new(format!("{}\n{}", title, prompt)).color(TEXT_PRIMARY),
            )
            .fill(BG_SECONDARY)
            .corner_radius(PANEL_ROUNDING)
            .min_size(Vec2::new(320.0, 48.0));
            if ui.add(card).clicked() {
                picked = Some(prompt);
            }
        }
    });
    picked
}

fn render_message(ui: &mut egui::Ui, message: &Message) {
    let (label, label_color) = match message.role {
        Role::User => ("You", ACCENT),
        Role::Assistant => ("Billy", SUCCESS),
    };

    egui::Frame::default()
        .fill(BG_SECONDARY)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(8.0)
        .show(ui, |ui| {
            ui.label(RichText::new(label).color(label_color).strong().small());
            if message.is_placeholder() {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new(&message.content).color(TEXT_SECONDARY).italics());
                });
            } else if message.role == Role::Assistant {
                show_markdown(ui, &message.content);
            } else {
                ui.label(RichText::new(&message.content).color(TEXT_PRIMARY));
            }
        });
}

/// Tooltip for the mic button.
pub fn voice_hint(listening: bool) -> &'static str {
    if listening {
        "Stop listening"
    } else {
        "Ask by voice"
    }
}

/// Label for a feedback button given the recorded status.
pub fn feedback_label(approve: bool, recorded: Option<bool>, pending: bool) -> &'static str {
    if pending {
        return "Saving...";
    }
    match (approve, recorded) {
        (true, Some(true)) => "Approved",
        (false, Some(false)) => "Disapproved",
        (true, _) => "Approve",
        (false, _) => "Disapprove",
    }
}

fn answer_controls(
    ui: &mut egui::Ui,
    store: &SessionStore,
    chat_id: &str,
    index: usize,
) -> Option<ChatAction> {
    let mut action = None;
    let eligible = store.feedback_eligible(chat_id, index);
    let locked = store.feedback_locked(chat_id, index);
    let pending = store.feedback_pending(chat_id, index);
    let recorded = store
        .feedback_status(chat_id, index)
        .map(|status| status.is_approved());

    ui.horizontal(|ui| {
        if eligible {
            for approve in [true, false] {
                let color = if approve { SUCCESS } else { ERROR };
                let text = RichText::new(feedback_label(approve, recorded, pending))
                    .color(color)
                    .small();
                if ui.add_enabled(!locked, egui::Button::new(text)).clicked() {
                    action = Some(ChatAction::Feedback { index, approved: approve });
                }
            }
        }
        if index > 0 && ui.small_button(RichText::new("Ask again").color(TEXT_SECONDARY)).clicked() {
            action = Some(ChatAction::AskAgain(index));
        }
    });

    action
}
