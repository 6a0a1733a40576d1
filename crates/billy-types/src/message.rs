use serde::{Deserialize, Serialize};

/// Content shown in the assistant slot until the first fragment arrives.
pub const PLACEHOLDER_CONTENT: &str = "Thinking...";

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message.
///
/// `is_new` marks messages produced in this page session (eligible for
/// feedback). It never reaches the stored message list, so anything
/// loaded from history comes back with `is_new == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip)]
    pub is_new: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            is_new: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            is_new: false,
        }
    }

    pub fn placeholder() -> Self {
        Self::assistant(PLACEHOLDER_CONTENT)
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.content == PLACEHOLDER_CONTENT
    }
}

/// Serialize a message list into the text form the chat backend stores.
pub fn encode_messages(messages: &[Message]) -> crate::Result<String> {
    Ok(serde_json::to_string(messages)?)
}
