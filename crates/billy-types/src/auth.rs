use serde::{Deserialize, Serialize};

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    #[serde(default)]
    pub first_name: Option<String>,
}

impl UserIdentity {
    /// Single letter shown in the profile avatar.
    pub fn initial(&self) -> char {
        self.email
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('B')
    }

    pub fn greeting_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or(&self.email)
    }
}

/// Fields collected by the sign-up form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}
