//! Sign-in, sign-up and magic-link forms shown before a user is known.

use egui::{self, RichText, Vec2};
use billy_types::auth::SignUpRequest;
use crate::state::{AuthForm, AuthMode, Notice};
use crate::theme::*;

pub enum AuthAction {
    None,
    SignIn { email: String, password: String },
    SignUp(SignUpRequest),
    SendMagicLink(String),
}

pub fn auth_panel(ui: &mut egui::Ui, form: &mut AuthForm) -> AuthAction {
    let mut action = AuthAction::None;

    ui.vertical_centered(|ui| {
        ui.add_space(48.0);
        ui.heading(RichText::new("Billy Bets").color(ACCENT).strong());
        ui.label(RichText::new("Your sports betting assistant").color(TEXT_SECONDARY));
        ui.add_space(16.0);

        egui::Frame::default()
            .fill(BG_SECONDARY)
            .inner_margin(PANEL_PADDING)
            .corner_radius(PANEL_ROUNDING)
            .show(ui, |ui| {
                ui.set_max_width(360.0);

                ui.horizontal(|ui| {
                    for (mode, label) in [
                        (AuthMode::SignIn, "Sign in"),
                        (AuthMode::SignUp, "Sign up"),
                        (AuthMode::ForgotPassword, "Magic link"),
                    ] {
                        if ui.selectable_label(form.mode == mode, label).clicked() {
                            form.switch_mode(mode);
                        }
                    }
                });
                ui.separator();

                if form.mode == AuthMode::SignUp {
                    field(ui, "First name", &mut form.first_name, false);
                    field(ui, "Last name", &mut form.last_name, false);
                }
                field(ui, "Email", &mut form.email, false);
                if form.mode != AuthMode::ForgotPassword {
                    field(ui, "Password", &mut form.password, true);
                }

                ui.add_space(8.0);
                let label = match form.mode {
                    AuthMode::SignIn => "Sign in",
                    AuthMode::SignUp => "Create account",
                    AuthMode::ForgotPassword => "Send magic link",
                };
                let submit = ui.add_enabled(
                    !form.submitting,
                    egui::Button::new(RichText::new(label).color(TEXT_PRIMARY).strong())
                        .fill(ACCENT)
                        .corner_radius(PANEL_ROUNDING)
                        .min_size(Vec2::new(ui.available_width(), 30.0)),
                );
                if submit.clicked() {
                    match form.validate() {
                        Ok(()) => {
                            form.submitting = true;
                            form.notice = None;
                            action = match form.mode {
                                AuthMode::SignIn => AuthAction::SignIn {
                                    email: form.email.trim().to_string(),
                                    password: form.password.clone(),
                                },
                                AuthMode::SignUp => AuthAction::SignUp(form.sign_up_request()),
                                AuthMode::ForgotPassword => {
                                    AuthAction::SendMagicLink(form.email.trim().to_string())
                                }
                            };
                        }
                        Err(message) => form.notice = Some(Notice::error(message)),
                    }
                }

                if form.submitting {
                    ui.spinner();
                }
                if let Some(notice) = &form.notice {
                    notice_label(ui, notice);
                }
            });
    });

    action
}

fn field(ui: &mut egui::Ui, label: &str, value: &mut String, password: bool) {
    ui.label(RichText::new(label).color(TEXT_SECONDARY).small());
    ui.add(
        egui::TextEdit::singleline(value)
            .password(password)
            .desired_width(f32::INFINITY),
    );
    ui.add_space(4.0);
}

pub(crate) fn notice_label(ui: &mut egui::Ui, notice: &Notice) {
    let color = if notice.is_error { ERROR } else { SUCCESS };
    ui.label(RichText::new(&notice.text).color(color).small());
}
