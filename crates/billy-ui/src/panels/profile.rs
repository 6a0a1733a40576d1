//! Profile page: account details, password change and sign out.

use egui::{self, RichText, Vec2};
use billy_types::auth::UserIdentity;
use crate::panels::auth::notice_label;
use crate::state::{Notice, PasswordForm};
use crate::theme::*;

pub enum ProfileAction {
    None,
    UpdatePassword(String),
    SignOut,
}

pub fn profile_panel(ui: &mut egui::Ui, user: &UserIdentity, form: &mut PasswordForm) -> ProfileAction {
    let mut action = ProfileAction::None;

    egui::Frame::default()
        .fill(BG_SECONDARY)
        .inner_margin(PANEL_PADDING)
        .corner_radius(PANEL_ROUNDING)
        .show(ui, |ui| {
            ui.set_max_width(420.0);
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new(user.initial().to_string())
                        .color(BG_PRIMARY)
                        .background_color(ACCENT)
                        .heading()
                        .strong(),
                );
                ui.vertical(|ui| {
                    ui.label(RichText::new(user.greeting_name()).color(TEXT_PRIMARY).strong());
                    ui.label(RichText::new(&user.email).color(TEXT_SECONDARY).small());
                });
            });

            ui.add_space(8.0);
            ui.separator();
            ui.label(RichText::new("Change password").color(ACCENT).strong());

            ui.label(RichText::new("New password").color(TEXT_SECONDARY).small());
            ui.add(egui::TextEdit::singleline(&mut form.password).password(true));
            ui.label(RichText::new("Repeat password").color(TEXT_SECONDARY).small());
            ui.add(egui::TextEdit::singleline(&mut form.repeat).password(true));

            ui.add_space(4.0);
            let update = ui.add_enabled(
                !form.submitting,
                egui::Button::new(RichText::new("Update password").color(TEXT_PRIMARY))
                    .fill(ACCENT)
                    .corner_radius(PANEL_ROUNDING)
                    .min_size(Vec2::new(140.0, 28.0)),
            );
            if update.clicked() {
                match form.validate() {
                    Ok(()) => {
                        form.submitting = true;
                        form.notice = None;
                        action = ProfileAction::UpdatePassword(form.password.clone());
                    }
                    Err(message) => form.notice = Some(Notice::error(message)),
                }
            }
            if let Some(notice) = &form.notice {
                notice_label(ui, notice);
            }

            ui.add_space(12.0);
            ui.separator();
            if ui
                .button(RichText::new("Sign out").color(ERROR))
                .clicked()
            {
                action = ProfileAction::SignOut;
            }
        });

    action
}
