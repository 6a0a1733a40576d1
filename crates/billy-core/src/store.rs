//! Session store: the single owner of chat state on the client.
//!
//! Holds every chat session keyed by id, the sidebar order, the active
//! session, which sessions have an exchange outstanding, and the
//! per-session feedback ledgers. All operations are plain state
//! transitions; nothing here talks to the network.
//!
//! Invariants:
//! - a session's message list only grows;
//! - only the last message's content is rewritten, and only while an
//!   exchange for that session is outstanding;
//! - at most one outstanding exchange per session.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use billy_types::{
    event::StreamRequest,
    feedback::{FeedbackDraft, FeedbackStatus},
    message::{Message, Role},
    session::{name_from_message, ChatId, ChatSession, ChatSummary, UNTITLED_CHAT},
};
use crate::feedback::FeedbackLedger;

/// The store as shared between the controller and the UI.
pub type SharedStore = Rc<RefCell<SessionStore>>;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<ChatId, ChatSession>,
    /// Sidebar order, most recent first
    order: Vec<ChatId>,
    active: Option<ChatId>,
    answering: HashSet<ChatId>,
    feedback: HashMap<ChatId, FeedbackLedger>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, chat_id: &str) -> Option<&ChatSession> {
        self.sessions.get(chat_id)
    }

    /// Sessions in sidebar order.
    pub fn sessions(&self) -> impl Iterator<Item = &ChatSession> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    pub fn summaries(&self) -> Vec<ChatSummary> {
        self.sessions().map(ChatSummary::from).collect()
    }

    // ─── Active session ──────────────────────────────────────

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active.as_deref().and_then(|id| self.sessions.get(id))
    }

    pub fn activate(&mut self, chat_id: &str) -> bool {
        if self.sessions.contains_key(chat_id) {
            self.active = Some(chat_id.to_string());
            true
        } else {
            false
        }
    }

    /// Start a new conversation and make it active.
    pub fn new_chat(&mut self) -> ChatId {
        let session = ChatSession::fresh(self.len() + 1);
        let id = session.id.clone();
        self.insert(session);
        self.active = Some(id.clone());
        id
    }

    /// Insert at the top of the sidebar, replacing any session with the
    /// same id.
    pub fn insert(&mut self, session: ChatSession) {
        let id = session.id.clone();
        self.order.retain(|existing| existing != &id);
        self.order.insert(0, id.clone());
        self.sessions.insert(id, session);
    }

    /// Replace the collection with sessions loaded from history.
    ///
    /// Sessions with an exchange outstanding keep their local copy. The
    /// active session is kept when it survives, otherwise the first
    /// loaded session becomes active.
    pub fn replace_all(&mut self, loaded: Vec<ChatSession>) {
        let mut sessions = HashMap::new();
        let mut order = Vec::new();

        for id in &self.order {
            if self.answering.contains(id) && !loaded.iter().any(|s| &s.id == id) {
                if let Some(local) = self.sessions.get(id) {
                    order.push(id.clone());
                    sessions.insert(id.clone(), local.clone());
                }
            }
        }

        for session in loaded {
            if sessions.contains_key(&session.id) {
                continue;
            }
            let id = session.id.clone();
            let session = if self.answering.contains(&id) {
                self.sessions.remove(&id).unwrap_or(session)
            } else {
                session
            };
            order.push(id.clone());
            sessions.insert(id, session);
        }

        self.feedback.retain(|id, _| sessions.contains_key(id));
        self.sessions = sessions;
        self.order = order;

        let keep_active = self
            .active
            .as_ref()
            .is_some_and(|id| self.sessions.contains_key(id));
        if !keep_active {
            self.active = self.order.first().cloned();
        }
    }

    /// Overwrite a session's messages and query with a freshly loaded
    /// copy. Refused while an exchange is outstanding.
    pub fn refresh_messages(&mut self, chat_id: &str, messages: Vec<Message>, sql_query: String) -> bool {
        if self.answering.contains(chat_id) {
            return false;
        }
        match self.sessions.get_mut(chat_id) {
            Some(session) => {
                session.messages = messages;
                session.sql_query = sql_query;
                true
            }
            None => false,
        }
    }

    // ─── Message list ────────────────────────────────────────

    /// Push a message onto a session, tagged as new. Blank content is
    /// ignored.
    pub fn append_message(&mut self, chat_id: &str, mut message: Message) -> bool {
        if message.is_blank() {
            return false;
        }
        match self.sessions.get_mut(chat_id) {
            Some(session) => {
                message.is_new = true;
                session.messages.push(message);
                true
            }
            None => false,
        }
    }

    /// Rewrite the content of the session's last message.
    ///
    /// With `is_final` the message is marked new and a snapshot of the
    /// session is returned for the caller to persist. Ignored when the
    /// session has no outstanding exchange.
    pub fn update_trailing_message(
        &mut self,
        chat_id: &str,
        content: &str,
        is_final: bool,
    ) -> Option<ChatSession> {
        if !self.answering.contains(chat_id) {
            log::debug!("Ignoring trailing update for idle chat {}", chat_id);
            return None;
        }
        let session = self.sessions.get_mut(chat_id)?;
        let last = session.messages.last_mut()?;
        last.content = content.to_string();
        if !is_final {
            return None;
        }
        last.is_new = true;
        session.updated_at = Some(chrono::Utc::now().to_rfc3339());
        Some(session.clone())
    }

    pub fn set_query(&mut self, chat_id: &str, text: &str) -> bool {
        match self.sessions.get_mut(chat_id) {
            Some(session) => {
                session.sql_query = text.to_string();
                true
            }
            None => false,
        }
    }

    // ─── Exchanges ───────────────────────────────────────────

    pub fn is_answering(&self, chat_id: &str) -> bool {
        self.answering.contains(chat_id)
    }

    /// Append the user's message and the assistant placeholder, and mark
    /// the session as answering.
    ///
    /// Returns the request to emit, or None for blank input, unknown
    /// sessions, or a session that is already answering.
    pub fn begin_send(&mut self, chat_id: &str, text: &str) -> Option<StreamRequest> {
        if text.trim().is_empty() || self.answering.contains(chat_id) {
            return None;
        }
        let session = self.sessions.get_mut(chat_id)?;

        if session.first_user_message().is_none()
            && (session.has_placeholder_name() || session.name == UNTITLED_CHAT)
        {
            session.name = name_from_message(text);
        }

        self.append_message(chat_id, Message::user(text));
        self.append_message(chat_id, Message::placeholder());
        self.answering.insert(chat_id.to_string());
        Some(StreamRequest::new(chat_id, text))
    }

    /// Resend the user message that precedes the assistant message at
    /// `assistant_index`.
    pub fn ask_again(&mut self, chat_id: &str, assistant_index: usize) -> Option<StreamRequest> {
        let question = self.question_for(chat_id, assistant_index)?.to_string();
        self.begin_send(chat_id, &question)
    }

    /// The exchange ended with its terminal fragment.
    pub fn finish_exchange(&mut self, chat_id: &str) {
        self.answering.remove(chat_id);
    }

    /// The exchange ended without an answer. A placeholder that was
    /// never replaced is rewritten to `notice`. The unfinished reply can
    /// no longer be judged.
    pub fn fail_exchange(&mut self, chat_id: &str, notice: &str) {
        if !self.answering.remove(chat_id) {
            return;
        }
        if let Some(last) = self
            .sessions
            .get_mut(chat_id)
            .and_then(|s| s.messages.last_mut())
            .filter(|m| m.role == Role::Assistant)
        {
            if last.is_placeholder() {
                last.content = notice.to_string();
            }
            last.is_new = false;
        }
    }

    // ─── Feedback ────────────────────────────────────────────

    fn question_for(&self, chat_id: &str, assistant_index: usize) -> Option<&str> {
        let messages = &self.sessions.get(chat_id)?.messages;
        let answer = messages.get(assistant_index)?;
        let question = messages.get(assistant_index.checked_sub(1)?)?;
        if answer.role == Role::Assistant && question.role == Role::User {
            Some(&question.content)
        } else {
            None
        }
    }

    /// Feedback controls are shown for this message.
    pub fn feedback_eligible(&self, chat_id: &str, index: usize) -> bool {
        if self.answering.contains(chat_id) || self.question_for(chat_id, index).is_none() {
            return false;
        }
        self.sessions
            .get(chat_id)
            .and_then(|s| s.messages.get(index))
            .is_some_and(|m| m.is_new)
    }

    pub fn feedback_status(&self, chat_id: &str, index: usize) -> Option<FeedbackStatus> {
        self.feedback.get(chat_id).and_then(|l| l.status(index))
    }

    pub fn feedback_pending(&self, chat_id: &str, index: usize) -> bool {
        self.feedback
            .get(chat_id)
            .is_some_and(|l| l.is_pending(index))
    }

    /// Controls for this message are disabled.
    pub fn feedback_locked(&self, chat_id: &str, index: usize) -> bool {
        self.feedback
            .get(chat_id)
            .is_some_and(|l| l.is_locked(index))
    }

    /// Claim a message for judgment and resolve the question/answer pair.
    pub fn begin_feedback(&mut self, chat_id: &str, index: usize) -> Option<FeedbackDraft> {
        if !self.feedback_eligible(chat_id, index) {
            return None;
        }
        let question = self.question_for(chat_id, index)?.to_string();
        let session = self.sessions.get(chat_id)?;
        let draft = FeedbackDraft {
            question,
            answer: session.messages.get(index)?.content.clone(),
            sql: session.sql_query.clone(),
        };
        let ledger = self.feedback.entry(chat_id.to_string()).or_default();
        if ledger.begin(index) {
            Some(draft)
        } else {
            None
        }
    }

    pub fn finish_feedback(&mut self, chat_id: &str, index: usize, status: FeedbackStatus, success: bool) {
        self.feedback
            .entry(chat_id.to_string())
            .or_default()
            .finish(index, status, success);
    }
}
