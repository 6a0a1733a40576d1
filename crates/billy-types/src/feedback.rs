use serde::{Deserialize, Serialize};

/// One-time judgment on an assistant answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Approved,
    Disapproved,
}

impl FeedbackStatus {
    pub fn from_approved(approved: bool) -> Self {
        if approved {
            FeedbackStatus::Approved
        } else {
            FeedbackStatus::Disapproved
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, FeedbackStatus::Approved)
    }

    pub fn label(&self) -> &str {
        match self {
            FeedbackStatus::Approved => "Approved",
            FeedbackStatus::Disapproved => "Disapproved",
        }
    }
}

/// Question/answer pair resolved from a chat, ready to be judged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackDraft {
    pub question: String,
    pub answer: String,
    pub sql: String,
}

/// Body of `store-query`.
/// `correct` travels as the string `"true"` or `"false"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub question: String,
    pub answer: String,
    pub correct: String,
    pub category: String,
    pub sql: String,
    pub user_id: String,
}

impl FeedbackRecord {
    pub fn new(
        draft: FeedbackDraft,
        correct: bool,
        category: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            question: draft.question,
            answer: draft.answer,
            correct: correct.to_string(),
            category: category.into(),
            sql: draft.sql,
            user_id: user_id.into(),
        }
    }
}
