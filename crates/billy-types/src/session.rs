use serde::{Deserialize, Serialize};
use crate::message::{Message, Role};

pub type ChatId = String;

/// Name given to stored chats that come back without one.
pub const UNTITLED_CHAT: &str = "Untitled Chat";

/// Number of characters of the first user message kept in a chat name.
const NAME_PREFIX_CHARS: usize = 10;

/// A chat session held by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: ChatId,
    pub name: String,
    pub messages: Vec<Message>,
    /// Query text the backend generated for the most recent exchange
    pub sql_query: String,
    /// RFC 3339 timestamp of the last stored update, when known
    pub updated_at: Option<String>,
}

impl ChatSession {
    pub fn new(id: ChatId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            messages: Vec::new(),
            sql_query: String::new(),
            updated_at: None,
        }
    }

    /// Fresh session with a random id and the `Chat N` placeholder name.
    pub fn fresh(ordinal: usize) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), placeholder_name(ordinal))
    }

    /// True while the name is still the `Chat N` placeholder.
    pub fn has_placeholder_name(&self) -> bool {
        is_placeholder_name(&self.name)
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::User)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

pub fn placeholder_name(ordinal: usize) -> String {
    format!("Chat {}", ordinal)
}

fn is_placeholder_name(name: &str) -> bool {
    name.strip_prefix("Chat ")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Display name derived from a message: its first ten characters,
/// followed by `...` when the message is longer.
pub fn name_from_message(text: &str) -> String {
    let mut chars = text.chars();
    let prefix: String = chars.by_ref().take(NAME_PREFIX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", prefix)
    } else {
        prefix
    }
}

/// Summary of a chat for the sidebar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: ChatId,
    pub name: String,
    pub updated_at: Option<String>,
    pub message_count: usize,
}

impl From<&ChatSession> for ChatSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            updated_at: session.updated_at.clone(),
            message_count: session.messages.len(),
        }
    }
}

// ─── Chat backend wire types ─────────────────────────────────

/// One record from `retrieve-all-chats`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredChat {
    pub id: ChatId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Message list in its stored JSON text form. Older rows hold the
    /// list itself; it is re-encoded to text.
    #[serde(default, deserialize_with = "json_text")]
    pub messages: Option<String>,
    #[serde(default)]
    pub sql_query: Option<String>,
}

/// A JSON column that should be text: strings pass through, lists and
/// objects are re-encoded, anything else reads as absent.
fn json_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(value @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
            Some(value.to_string())
        }
        _ => None,
    })
}

impl StoredChat {
    pub fn last_updated(&self) -> Option<&str> {
        self.updated_at
            .as_deref()
            .or(self.created_at.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveAllChatsResponse {
    #[serde(default)]
    pub chats: Vec<StoredChat>,
}

/// Body of `retrieve-chat`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrieveChatResponse {
    /// Message list in its stored JSON text form
    #[serde(default, deserialize_with = "json_text")]
    pub chat: Option<String>,
    #[serde(default)]
    pub sql_query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveAllChatsRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveChatRequest {
    pub user_id: String,
    pub chat_id: ChatId,
}

/// Body of `post-chats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostChatRequest {
    pub user_id: String,
    /// JSON-encoded message list
    pub messages: String,
    pub name: String,
    pub sql_query: String,
    pub chat_id: ChatId,
}
