use serde::{Deserialize, Serialize};
use crate::feedback::FeedbackStatus;
use crate::session::ChatId;

/// Status value carried by the terminal answer fragment.
pub const STATUS_DONE: &str = "done";

/// Payload emitted to the assistant backend, one per user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub message: StreamRequestBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequestBody {
    pub session: ChatId,
    pub message: String,
}

impl StreamRequest {
    pub fn new(session: impl Into<ChatId>, message: impl Into<String>) -> Self {
        Self {
            message: StreamRequestBody {
                session: session.into(),
                message: message.into(),
            },
        }
    }

    pub fn session(&self) -> &str {
        &self.message.session
    }

    pub fn text(&self) -> &str {
        &self.message.message
    }
}

/// Discriminator of an inbound fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// Generated SQL for the current exchange
    Query,
    /// Answer text, cumulative up to this point
    Answer,
    #[serde(other)]
    Other,
}

/// One event received from the assistant backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFragment {
    #[serde(rename = "type")]
    pub kind: FragmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub response: String,
}

impl StreamFragment {
    pub fn query(sql: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Query,
            status: None,
            response: sql.into(),
        }
    }

    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Answer,
            status: Some("partial".to_string()),
            response: text.into(),
        }
    }

    pub fn done(text: impl Into<String>) -> Self {
        Self {
            kind: FragmentKind::Answer,
            status: Some(STATUS_DONE.to_string()),
            response: text.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.status.as_deref() == Some(STATUS_DONE)
    }

    /// The answer fragment that ends an exchange.
    pub fn is_terminal(&self) -> bool {
        self.kind == FragmentKind::Answer && self.is_done()
    }
}

/// Events emitted by the chat controller.
/// UI subscribes to these for status and repaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A user message was sent and an exchange began
    ExchangeStarted { chat_id: ChatId },

    /// The backend produced SQL for the running exchange
    QueryUpdated { chat_id: ChatId },

    /// A non-terminal answer fragment arrived
    AnswerProgress { chat_id: ChatId },

    /// The terminal answer arrived
    ExchangeDone { chat_id: ChatId },

    /// Timeout, transport failure, or early close
    ExchangeFailed { chat_id: ChatId, message: String },

    /// Chat uploaded to the backend
    ChatSaved { chat_id: ChatId },

    /// Chat upload failed (logged, not surfaced)
    SaveFailed { chat_id: ChatId, message: String },

    /// Stored chats were loaded into the session store
    HistoryLoaded { count: usize },

    /// Loading stored chats failed
    HistoryFailed { message: String },

    FeedbackRecorded { chat_id: ChatId, index: usize, status: FeedbackStatus },

    FeedbackFailed { chat_id: ChatId, index: usize },
}
