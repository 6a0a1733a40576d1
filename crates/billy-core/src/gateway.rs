//! Persistence gateway: moves chat sessions between the session store
//! and the chat backend, and records answer feedback.

use std::cmp::Reverse;
use std::rc::Rc;

use billy_types::{
    Result,
    feedback::{FeedbackDraft, FeedbackRecord},
    message::{encode_messages, Message},
    session::{ChatSession, PostChatRequest, StoredChat, UNTITLED_CHAT},
    time::parse_timestamp,
};
use crate::ports::ChatBackendPort;

/// Messages and query text of a single stored chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedChat {
    pub messages: Vec<Message>,
    pub sql_query: String,
}

pub struct PersistenceGateway {
    backend: Rc<dyn ChatBackendPort>,
    history_limit: usize,
    feedback_category: String,
}

impl PersistenceGateway {
    pub fn new(
        backend: Rc<dyn ChatBackendPort>,
        history_limit: usize,
        feedback_category: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            history_limit,
            feedback_category: feedback_category.into(),
        }
    }

    /// Upload a session. Failures are logged and reported as `false`;
    /// local state is never rolled back.
    pub async fn save(&self, user_id: &str, session: &ChatSession) -> bool {
        let request = match build_post_request(user_id, session) {
            Ok(r) => r,
            Err(e) => {
                log::error!("Failed to encode chat {}: {}", session.id, e);
                return false;
            }
        };
        match self.backend.post_chat(&request).await {
            Ok(()) => {
                log::info!("Chat {} saved", session.id);
                true
            }
            Err(e) => {
                log::error!("Failed to post chat {}: {}", session.id, e);
                false
            }
        }
    }

    /// Fetch the user's stored chats, most recently updated first,
    /// truncated to the history limit.
    pub async fn load_all(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let stored = self.backend.retrieve_all_chats(user_id).await?;
        Ok(sessions_from_records(stored, self.history_limit))
    }

    /// Fetch one stored chat. Malformed message text yields an empty list.
    pub async fn load_one(&self, user_id: &str, chat_id: &str) -> Result<Option<LoadedChat>> {
        let record = self.backend.retrieve_chat(user_id, chat_id).await?;
        let Some(text) = record.chat else {
            log::warn!("Chat {} has no stored data", chat_id);
            return Ok(None);
        };
        Ok(Some(LoadedChat {
            messages: decode_messages(&text),
            sql_query: record.sql_query.unwrap_or_default(),
        }))
    }

    /// Post a judgment for one question/answer pair.
    pub async fn record_feedback(
        &self,
        question: &str,
        answer: &str,
        correct: bool,
        sql_query: &str,
        user_id: &str,
    ) -> bool {
        let draft = FeedbackDraft {
            question: question.to_string(),
            answer: answer.to_string(),
            sql: sql_query.to_string(),
        };
        let record = FeedbackRecord::new(draft, correct, self.feedback_category.clone(), user_id);
        match self.backend.store_feedback(&record).await {
            Ok(()) => {
                log::info!("Feedback stored (correct: {})", correct);
                true
            }
            Err(e) => {
                log::error!("Error storing feedback: {}", e);
                false
            }
        }
    }
}

pub fn build_post_request(user_id: &str, session: &ChatSession) -> Result<PostChatRequest> {
    let name = if session.name.trim().is_empty() {
        UNTITLED_CHAT.to_string()
    } else {
        session.name.clone()
    };
    Ok(PostChatRequest {
        user_id: user_id.to_string(),
        messages: encode_messages(&session.messages)?,
        name,
        sql_query: session.sql_query.clone(),
        chat_id: session.id.clone(),
    })
}

/// Decode a stored message list. Malformed text is logged and yields an
/// empty list.
pub fn decode_messages(text: &str) -> Vec<Message> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<Message>>(text) {
        Ok(messages) => messages,
        Err(e) => {
            log::warn!("Error parsing stored messages: {}", e);
            Vec::new()
        }
    }
}

/// Turn stored records into sessions: decode messages, default names,
/// sort by last update (newest first, unparseable last), keep `limit`.
pub fn sessions_from_records(records: Vec<StoredChat>, limit: usize) -> Vec<ChatSession> {
    let mut records: Vec<_> = records
        .into_iter()
        .map(|r| (r.last_updated().and_then(parse_timestamp), r))
        .collect();
    records.sort_by_key(|(ts, _)| Reverse(*ts));
    records.truncate(limit);

    records
        .into_iter()
        .map(|(_, record)| {
            let updated_at = record.last_updated().map(str::to_string);
            let name = record
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_CHAT.to_string());
            ChatSession {
                messages: record.messages.as_deref().map(decode_messages).unwrap_or_default(),
                sql_query: record.sql_query.unwrap_or_default(),
                id: record.id,
                name,
                updated_at,
            }
        })
        .collect()
}
