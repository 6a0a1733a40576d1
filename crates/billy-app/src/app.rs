//! Main egui application: composes the panels and dispatches user
//! actions to the chat controller and the Supabase adapters.

use std::cell::RefCell;
use std::rc::Rc;

use egui::{self, CentralPanel, RichText, SidePanel, TopBottomPanel};
use wasm_bindgen_futures::spawn_local;

use billy_core::analytics::{load_dashboard, DashboardData};
use billy_core::controller::ChatController;
use billy_core::event_bus::EventBus;
use billy_core::exchange::StreamingClient;
use billy_core::gateway::PersistenceGateway;
use billy_core::ports::AuthPort;
use billy_core::store::{SessionStore, SharedStore};
use billy_platform::browser;
use billy_platform::http::HttpChatBackend;
use billy_platform::socket::SocketIoStream;
use billy_platform::speech::{self, SpeechSession};
use billy_platform::supabase::{SupabaseAnalytics, SupabaseAuth, SupabaseClient};
use billy_platform::timer::GlooTimer;
use billy_types::{auth::UserIdentity, config::BillyConfig, BillyError, Result};
use billy_ui::panels::auth::{auth_panel, AuthAction};
use billy_ui::panels::chat::{chat_panel, ChatAction};
use billy_ui::panels::dashboard::dashboard_panel;
use billy_ui::panels::profile::{profile_panel, ProfileAction};
use billy_ui::panels::sidebar::{sidebar_panel, SidebarAction};
use billy_ui::panels::sql::sql_panel;
use billy_ui::state::{Notice, UiState, View};
use billy_ui::theme;

/// Results of background auth and analytics requests, applied on the
/// next frame.
enum Outcome {
    SignedIn(UserIdentity),
    AuthNotice(Notice),
    PasswordNotice(Notice),
    FirstName(String),
    Dashboard(Result<DashboardData>),
    Transcript(String),
    VoiceEnded,
}

type Inbox = Rc<RefCell<Vec<Outcome>>>;

pub struct BillyApp {
    ui_state: UiState,
    event_bus: EventBus,
    store: SharedStore,
    controller: Rc<ChatController>,
    auth: Rc<dyn AuthPort>,
    analytics: Rc<SupabaseAnalytics>,
    user: Option<UserIdentity>,
    inbox: Inbox,
    voice: Option<SpeechSession>,
    first_frame: bool,
}

impl BillyApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Result<Self> {
        let config = BillyConfig::from_env();
        config.validate()?;
        log::info!("API {} / backend {}", config.api_url, config.backend_url);

        let event_bus = EventBus::new();
        let store = SessionStore::shared();

        let client = StreamingClient::new(
            Rc::new(SocketIoStream::from_config(&config)?),
            Rc::new(GlooTimer),
            event_bus.clone(),
            config.exchange_timeout_ms,
        );
        let gateway = PersistenceGateway::new(
            Rc::new(HttpChatBackend::new(&config)),
            config.history_limit,
            config.feedback_category.clone(),
        );
        let controller = Rc::new(ChatController::new(
            store.clone(),
            client,
            gateway,
            event_bus.clone(),
        ));

        let supabase = SupabaseClient::from_config(&config);
        let mut auth = SupabaseAuth::new(supabase.clone());
        if let Some(url) = browser::page_url() {
            auth = auth.with_redirect(url);
        }

        let mut ui_state = UiState::new();
        ui_state.voice_supported = speech::is_supported();

        let app = Self {
            ui_state,
            event_bus,
            store,
            controller,
            auth: Rc::new(auth),
            analytics: Rc::new(SupabaseAnalytics::new(supabase)),
            user: None,
            inbox: Rc::new(RefCell::new(Vec::new())),
            voice: None,
            first_frame: true,
        };
        app.confirm_signup();
        Ok(app)
    }

    /// Complete an emailed sign-up link carried in the page URL.
    fn confirm_signup(&self) {
        let Some(token) = browser::signup_token() else {
            return;
        };
        browser::clear_query();
        let auth = self.auth.clone();
        let inbox = self.inbox.clone();
        spawn_local(async move {
            let notice = match auth.verify_signup(&token).await {
                Ok(()) => Notice::info("Email confirmed. You can sign in now."),
                Err(e) => {
                    log::error!("Sign-up confirmation failed: {}", e);
                    Notice::error(format!("Could not confirm email: {}", e))
                }
            };
            inbox.borrow_mut().push(Outcome::AuthNotice(notice));
        });
    }

    fn apply_outcomes(&mut self, ctx: &egui::Context) {
        let outcomes: Vec<Outcome> = self.inbox.borrow_mut().drain(..).collect();
        for outcome in outcomes {
            match outcome {
                Outcome::SignedIn(identity) => self.on_signed_in(identity, ctx),
                Outcome::AuthNotice(notice) => self.ui_state.auth.finish(notice),
                Outcome::PasswordNotice(notice) => self.ui_state.password.finish(notice),
                Outcome::FirstName(name) => {
                    if let Some(user) = self.user.as_mut() {
                        user.first_name = Some(name);
                    }
                }
                Outcome::Dashboard(result) => {
                    let dashboard = &mut self.ui_state.dashboard;
                    dashboard.loading = false;
                    match result {
                        Ok(data) => {
                            dashboard.data = Some(data);
                            dashboard.error = None;
                        }
                        Err(e) => dashboard.error = Some(e.to_string()),
                    }
                }
                Outcome::Transcript(text) => self.ui_state.apply_transcript(&text),
                Outcome::VoiceEnded => {
                    self.voice = None;
                    self.ui_state.listening = false;
                }
            }
        }
    }

    fn on_signed_in(&mut self, identity: UserIdentity, ctx: &egui::Context) {
        self.ui_state.auth.finish(Notice::info("Signed in"));
        self.controller.set_user(Some(identity.user_id.clone()));
        self.analytics.set_access_token(Some(identity.access_token.clone()));

        if identity.first_name.is_none() {
            let auth = self.auth.clone();
            let inbox = self.inbox.clone();
            let lookup = identity.clone();
            let ctx = ctx.clone();
            spawn_local(async move {
                match auth.first_name(&lookup).await {
                    Ok(Some(name)) => inbox.borrow_mut().push(Outcome::FirstName(name)),
                    Ok(None) => {}
                    Err(e) => log::warn!("Profile lookup failed: {}", e),
                }
                ctx.request_repaint();
            });
        }
        self.user = Some(identity);

        self.ui_state.history_loading = true;
        let controller = self.controller.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            controller.load_history().await;
            ctx.request_repaint();
        });
    }

    fn sign_out(&mut self) {
        if let Some(identity) = self.user.take() {
            let auth = self.auth.clone();
            spawn_local(async move {
                if let Err(e) = auth.sign_out(&identity).await {
                    log::warn!("Sign out request failed: {}", e);
                }
            });
        }
        self.voice = None;
        self.controller.set_user(None);
        self.analytics.set_access_token(None);
        *self.store.borrow_mut() = SessionStore::new();
        self.ui_state.reset_session();
        log::info!("Signed out");
    }
}

impl eframe::App for BillyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.first_frame {
            theme::apply_theme(ctx);
            self.first_frame = false;
        }

        self.apply_outcomes(ctx);

        let events = self.event_bus.drain();
        if !events.is_empty() {
            self.ui_state.process_events(events);
            ctx.request_repaint();
        }

        let Some(user) = self.user.clone() else {
            CentralPanel::default().show(ctx, |ui| {
                let action = auth_panel(ui, &mut self.ui_state.auth);
                self.dispatch_auth(action, ctx);
            });
            return;
        };

        let answering = {
            let store = self.store.borrow();
            store.active_id().is_some_and(|id| store.is_answering(id))
        };
        if answering || self.ui_state.dashboard.loading {
            ctx.request_repaint();
        }

        // ── Top bar ──────────────────────────────────────────
        TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new("Billy Bets")
                        .strong()
                        .color(theme::ACCENT)
                        .size(16.0),
                );
                ui.separator();
                for (view, label) in [
                    (View::Chat, "Chat"),
                    (View::Dashboard, "Dashboard"),
                    (View::Profile, "Profile"),
                ] {
                    if ui.selectable_label(self.ui_state.view == view, label).clicked() {
                        self.ui_state.view = view;
                    }
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        RichText::new(user.initial().to_string())
                            .color(theme::BG_PRIMARY)
                            .background_color(theme::ACCENT)
                            .strong(),
                    );
                });
            });
        });

        match self.ui_state.view {
            View::Chat => self.chat_view(ctx, &user),
            View::Dashboard => {
                let data_missing = self.ui_state.dashboard.data.is_none()
                    && self.ui_state.dashboard.error.is_none()
                    && !self.ui_state.dashboard.loading;
                if data_missing {
                    self.dispatch_dashboard(ctx);
                }
                CentralPanel::default().show(ctx, |ui| {
                    if dashboard_panel(ui, &self.ui_state.dashboard) {
                        self.dispatch_dashboard(ctx);
                    }
                });
            }
            View::Profile => {
                CentralPanel::default().show(ctx, |ui| {
                    match profile_panel(ui, &user, &mut self.ui_state.password) {
                        ProfileAction::None => {}
                        ProfileAction::UpdatePassword(password) => {
                            self.dispatch_password(user.clone(), password, ctx)
                        }
                        ProfileAction::SignOut => self.sign_out(),
                    }
                });
            }
        }
    }
}

impl BillyApp {
    fn chat_view(&mut self, ctx: &egui::Context, user: &UserIdentity) {
        let (summaries, active_id) = {
            let store = self.store.borrow();
            (store.summaries(), store.active_id().map(str::to_string))
        };

        SidePanel::left("history_panel")
            .min_width(200.0)
            .max_width(260.0)
            .show(ctx, |ui| {
                let action = sidebar_panel(
                    ui,
                    &summaries,
                    active_id.as_deref(),
                    self.ui_state.history_loading,
                );
                match action {
                    SidebarAction::None => {}
                    SidebarAction::NewChat => {
                        self.controller.new_chat();
                    }
                    SidebarAction::Select(id) => self.dispatch_select(id, ctx),
                }
            });

        if self.ui_state.show_sql {
            let sql = self
                .store
                .borrow()
                .active()
                .map(|s| s.sql_query.clone())
                .unwrap_or_default();
            SidePanel::right("sql_panel")
                .min_width(280.0)
                .max_width(420.0)
                .show(ctx, |ui| sql_panel(ui, &sql));
        }

        CentralPanel::default().show(ctx, |ui| {
            let action = {
                let store = self.store.borrow();
                chat_panel(ui, &mut self.ui_state, &store, user.greeting_name())
            };
            self.dispatch_chat(action, ctx);
        });
    }

    // ─── Dispatch ────────────────────────────────────────────

    fn dispatch_chat(&mut self, action: ChatAction, ctx: &egui::Context) {
        let controller = self.controller.clone();
        let ctx = ctx.clone();
        match action {
            ChatAction::None => {}
            ChatAction::Send(text) => spawn_local(async move {
                if let Err(e) = controller.send(&text).await {
                    log::error!("Exchange failed: {}", e);
                }
                ctx.request_repaint();
            }),
            ChatAction::AskAgain(index) => spawn_local(async move {
                if let Err(e) = controller.ask_again(index).await {
                    log::error!("Ask again failed: {}", e);
                }
                ctx.request_repaint();
            }),
            ChatAction::Feedback { index, approved } => spawn_local(async move {
                controller.record_feedback(index, approved).await;
                ctx.request_repaint();
            }),
            ChatAction::ToggleVoice => self.toggle_voice(&ctx),
        }
    }

    fn toggle_voice(&mut self, ctx: &egui::Context) {
        if let Some(session) = &self.voice {
            session.stop();
            return;
        }
        let transcripts = self.inbox.clone();
        let endings = self.inbox.clone();
        let (repaint, repaint_end) = (ctx.clone(), ctx.clone());
        let started = SpeechSession::start(
            move |text| {
                transcripts.borrow_mut().push(Outcome::Transcript(text));
                repaint.request_repaint();
            },
            move || {
                endings.borrow_mut().push(Outcome::VoiceEnded);
                repaint_end.request_repaint();
            },
        );
        match started {
            Ok(session) => {
                self.voice = Some(session);
                self.ui_state.listening = true;
            }
            Err(e) => {
                log::error!("Voice input unavailable: {}", e);
                self.ui_state.status_text = "Voice input unavailable".to_string();
            }
        }
    }

    fn dispatch_select(&self, chat_id: String, ctx: &egui::Context) {
        let controller = self.controller.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            controller.select_chat(&chat_id).await;
            ctx.request_repaint();
        });
    }

    fn dispatch_auth(&self, action: AuthAction, ctx: &egui::Context) {
        if matches!(action, AuthAction::None) {
            return;
        }
        let auth = self.auth.clone();
        let inbox = self.inbox.clone();
        let ctx = ctx.clone();
        let task = async move {
            let outcome = match action {
                AuthAction::None => return,
                AuthAction::SignIn { email, password } => {
                    match auth.sign_in(&email, &password).await {
                        Ok(identity) => Outcome::SignedIn(identity),
                        Err(e) => Outcome::AuthNotice(auth_failure("Sign in failed", e)),
                    }
                }
                AuthAction::SignUp(request) => match auth.sign_up(&request).await {
                    Ok(()) => Outcome::AuthNotice(Notice::info(
                        "Check your email to confirm your account.",
                    )),
                    Err(e) => Outcome::AuthNotice(auth_failure("Sign up failed", e)),
                },
                AuthAction::SendMagicLink(email) => match auth.send_magic_link(&email).await {
                    Ok(()) => Outcome::AuthNotice(Notice::info("Check your email for the login link.")),
                    Err(e) => Outcome::AuthNotice(auth_failure("Could not send link", e)),
                },
            };
            inbox.borrow_mut().push(outcome);
            ctx.request_repaint();
        };
        spawn_local(task);
    }

    fn dispatch_password(&self, identity: UserIdentity, password: String, ctx: &egui::Context) {
        let auth = self.auth.clone();
        let inbox = self.inbox.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            let notice = match auth.update_password(&identity, &password).await {
                Ok(()) => Notice::info("Password updated"),
                Err(e) => auth_failure("Password update failed", e),
            };
            inbox.borrow_mut().push(Outcome::PasswordNotice(notice));
            ctx.request_repaint();
        });
    }

    fn dispatch_dashboard(&mut self, ctx: &egui::Context) {
        self.ui_state.dashboard.loading = true;
        let analytics = self.analytics.clone();
        let inbox = self.inbox.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            let result = load_dashboard(analytics.as_ref(), chrono::Utc::now()).await;
            if let Err(e) = &result {
                log::error!("Dashboard load failed: {}", e);
            }
            inbox.borrow_mut().push(Outcome::Dashboard(result));
            ctx.request_repaint();
        });
    }
}

fn auth_failure(context: &str, error: BillyError) -> Notice {
    log::warn!("{}: {}", context, error);
    Notice::error(error.to_string())
}
