use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use billy_core::ports::AuthPort;
use billy_types::{
    BillyError, Result,
    auth::{SignUpRequest, UserIdentity},
};
use super::{check, send, SupabaseClient};

/// GoTrue REST client
pub struct SupabaseAuth {
    client: SupabaseClient,
    /// Where the sign-up confirmation email sends the user
    redirect_to: Option<String>,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client, redirect_to: None }
    }

    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_to = Some(url.into());
        self
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

#[derive(Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

#[derive(Deserialize)]
struct ProfileRow {
    #[serde(default)]
    first_name: Option<String>,
}

fn auth_error(message: String) -> BillyError {
    BillyError::Auth(message)
}

#[async_trait(?Send)]
impl AuthPort for SupabaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity> {
        let request = self
            .client
            .post(&self.client.auth_url("token"), None)
            .query([("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let response = check(send(request).await?, auth_error).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BillyError::Serialization(e.to_string()))?;

        let first_name = token
            .user
            .user_metadata
            .get("first_name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        log::info!("Signed in as {}", token.user.id);
        Ok(UserIdentity {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            access_token: token.access_token,
            first_name,
        })
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<()> {
        let mut builder = self.client.post(&self.client.auth_url("signup"), None);
        if let Some(redirect) = &self.redirect_to {
            builder = builder.query([("redirect_to", redirect.as_str())]);
        }
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": {
                "first_name": request.first_name,
                "last_name": request.last_name,
            },
        });
        check(send(builder.json(&body)).await?, auth_error).await?;
        log::info!("Sign-up submitted for {}", request.email);
        Ok(())
    }

    async fn verify_signup(&self, token_hash: &str) -> Result<()> {
        let body = json!({ "type": "signup", "token_hash": token_hash });
        let request = self.client.post(&self.client.auth_url("verify"), None).json(&body);
        check(send(request).await?, auth_error).await?;
        log::info!("Email confirmed");
        Ok(())
    }

    async fn send_magic_link(&self, email: &str) -> Result<()> {
        let body = json!({ "email": email, "create_user": true });
        let request = self.client.post(&self.client.auth_url("otp"), None).json(&body);
        check(send(request).await?, auth_error).await?;
        Ok(())
    }

    async fn update_password(&self, identity: &UserIdentity, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(BillyError::Auth("Password cannot be empty".to_string()));
        }
        let request = self
            .client
            .put(&self.client.auth_url("user"), Some(&identity.access_token))
            .json(&json!({ "password": password }));
        check(send(request).await?, auth_error).await?;
        log::info!("Password updated for {}", identity.user_id);
        Ok(())
    }

    async fn sign_out(&self, identity: &UserIdentity) -> Result<()> {
        let request = self
            .client
            .post(&self.client.auth_url("logout"), Some(&identity.access_token))
            .build();
        check(send(request).await?, auth_error).await?;
        Ok(())
    }

    async fn first_name(&self, identity: &UserIdentity) -> Result<Option<String>> {
        let id_filter = format!("eq.{}", identity.user_id);
        let request = self
            .client
            .get(&self.client.rest_url("profiles"), Some(&identity.access_token))
            .query([("select", "first_name"), ("id", id_filter.as_str())])
            .build();
        let response = check(send(request).await?, BillyError::Network).await?;
        let rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| BillyError::Serialization(e.to_string()))?;
        Ok(rows
            .into_iter()
            .find_map(|row| row.first_name.filter(|n| !n.is_empty())))
    }
}
