use serde::{Deserialize, Serialize};

/// A judged question from the `store-queries` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub created_at: String,
    /// `"true"` or `"false"`
    #[serde(default)]
    pub correct: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl QueryRecord {
    pub fn is_correct(&self) -> bool {
        self.correct == "true"
    }
}

/// A tracked user session from the `user_sessions` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub id: String,
    pub session_start: String,
    #[serde(default)]
    pub session_end: Option<String>,
    /// Postgres interval text, e.g. `01:02:03`
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub user_id: String,
}
