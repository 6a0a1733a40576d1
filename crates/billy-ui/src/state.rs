//! UI-level state that drives rendering.
//! Chat content is read from the session store each frame; this holds
//! only what the widgets own (forms, view selection, status line),
//! updated by draining the EventBus.

use billy_core::analytics::DashboardData;
use billy_types::{auth::SignUpRequest, event::ChatEvent};

/// Top-level page once signed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Chat,
    Dashboard,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
    ForgotPassword,
}

/// Message shown under a form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }
}

/// Sign-in / sign-up / recovery form
#[derive(Debug, Clone)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub submitting: bool,
    pub notice: Option<Notice>,
}

impl AuthForm {
    pub fn new() -> Self {
        Self {
            mode: AuthMode::SignIn,
            email: String::new(),
            password: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            submitting: false,
            notice: None,
        }
    }

    pub fn switch_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
        self.notice = None;
    }

    /// Fields required by the current mode are filled in.
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("Email is required".to_string());
        }
        match self.mode {
            AuthMode::ForgotPassword => Ok(()),
            AuthMode::SignIn if self.password.is_empty() => Err("Password is required".to_string()),
            AuthMode::SignIn => Ok(()),
            AuthMode::SignUp => {
                if self.password.is_empty() {
                    Err("Password is required".to_string())
                } else if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
                    Err("First and last name are required".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn sign_up_request(&self) -> SignUpRequest {
        SignUpRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
        }
    }

    /// An auth request finished.
    pub fn finish(&mut self, notice: Notice) {
        self.submitting = false;
        if !notice.is_error {
            self.password.clear();
        }
        self.notice = Some(notice);
    }
}

impl Default for AuthForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Password change form on the profile page
#[derive(Debug, Clone, Default)]
pub struct PasswordForm {
    pub password: String,
    pub repeat: String,
    pub submitting: bool,
    pub notice: Option<Notice>,
}

impl PasswordForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.password.is_empty() {
            return Err("Password cannot be empty".to_string());
        }
        if self.password != self.repeat {
            return Err("Passwords do not match".to_string());
        }
        Ok(())
    }

    pub fn finish(&mut self, notice: Notice) {
        self.submitting = false;
        if !notice.is_error {
            self.password.clear();
            self.repeat.clear();
        }
        self.notice = Some(notice);
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub data: Option<DashboardData>,
    pub loading: bool,
    pub error: Option<String>,
}

/// State visible to UI panels
pub struct UiState {
    pub view: View,
    /// Input field content
    pub input_text: String,
    /// Whether the SQL panel is open
    pub show_sql: bool,
    /// Status line text
    pub status_text: String,
    /// Last exchange failure, shown until the next send
    pub error_text: Option<String>,
    pub history_loading: bool,
    /// The browser offers speech recognition; hides the mic otherwise
    pub voice_supported: bool,
    pub listening: bool,
    pub auth: AuthForm,
    pub password: PasswordForm,
    pub dashboard: DashboardState,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            view: View::Chat,
            input_text: String::new(),
            show_sql: false,
            status_text: "Ready".to_string(),
            error_text: None,
            history_loading: false,
            voice_supported: false,
            listening: false,
            auth: AuthForm::new(),
            password: PasswordForm::default(),
            dashboard: DashboardState::default(),
        }
    }

    /// Process events from the EventBus and update UI state
    pub fn process_events(&mut self, events: Vec<ChatEvent>) {
        for event in events {
            match event {
                ChatEvent::ExchangeStarted { .. } => {
                    self.error_text = None;
                    self.status_text = "Billy is thinking...".to_string();
                }
                ChatEvent::QueryUpdated { .. } => {
                    self.status_text = "Query ready".to_string();
                }
                ChatEvent::AnswerProgress { .. } => {
                    self.status_text = "Answering...".to_string();
                }
                ChatEvent::ExchangeDone { .. } => {
                    self.status_text = "Ready".to_string();
                }
                ChatEvent::ExchangeFailed { message, .. } => {
                    self.status_text = "Ready".to_string();
                    self.error_text = Some(message);
                }
                ChatEvent::ChatSaved { .. } => {}
                ChatEvent::SaveFailed { chat_id, message } => {
                    log::warn!("Chat {} was not saved: {}", chat_id, message);
                }
                ChatEvent::HistoryLoaded { count } => {
                    self.history_loading = false;
                    self.status_text = format!("Loaded {} chats", count);
                }
                ChatEvent::HistoryFailed { .. } => {
                    self.history_loading = false;
                    self.status_text = "Could not load chat history".to_string();
                }
                ChatEvent::FeedbackRecorded { status, .. } => {
                    self.status_text = format!("Feedback saved: {}", status.label());
                }
                ChatEvent::FeedbackFailed { .. } => {
                    self.status_text = "Feedback could not be saved".to_string();
                }
            }
        }
    }

    /// Take the trimmed input for sending, if there is any.
    pub fn take_input(&mut self) -> Option<String> {
        let text = self.input_text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.input_text.clear();
        Some(text)
    }

    /// A voice transcript replaces the input; later results of the
    /// same utterance supersede earlier ones.
    pub fn apply_transcript(&mut self, transcript: &str) {
        let transcript = transcript.trim();
        if !transcript.is_empty() {
            self.input_text = transcript.to_string();
        }
    }

    /// Forget everything tied to the signed-in user.
    pub fn reset_session(&mut self) {
        let email = std::mem::take(&mut self.auth.email);
        let voice_supported = self.voice_supported;
        *self = Self::new();
        self.auth.email = email;
        self.voice_supported = voice_supported;
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}
