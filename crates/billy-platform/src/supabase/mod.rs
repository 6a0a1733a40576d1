//! Supabase adapters: GoTrue auth and PostgREST reads.

mod auth;
mod rest;

pub use auth::SupabaseAuth;
pub use rest::SupabaseAnalytics;

use gloo_net::http::{Request, RequestBuilder, Response};
use serde_json::Value;

use billy_types::{
    BillyError, Result,
    config::{BillyConfig, SupabaseConfig},
};

/// Project URL and anon key shared by the auth and REST adapters.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        }
    }

    pub fn from_config(config: &BillyConfig) -> Self {
        Self::new(&config.supabase)
    }

    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path)
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    /// Attach the project key, and the user's token when there is one.
    fn authorize(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let bearer = format!("Bearer {}", token.unwrap_or(&self.anon_key));
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", &bearer)
    }

    pub(crate) fn get(&self, url: &str, token: Option<&str>) -> RequestBuilder {
        self.authorize(Request::get(url), token)
    }

    pub(crate) fn post(&self, url: &str, token: Option<&str>) -> RequestBuilder {
        self.authorize(Request::post(url), token)
            .header("Content-Type", "application/json")
    }

    pub(crate) fn put(&self, url: &str, token: Option<&str>) -> RequestBuilder {
        self.authorize(Request::put(url), token)
            .header("Content-Type", "application/json")
    }
}

/// Human-readable message from a GoTrue or PostgREST error body.
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

async fn send(request: std::result::Result<Request, gloo_net::Error>) -> Result<Response> {
    request
        .map_err(|e| BillyError::Serialization(e.to_string()))?
        .send()
        .await
        .map_err(|e| BillyError::Network(e.to_string()))
}

/// Fail with the server's message on a non-2xx status.
async fn check(response: Response, to_error: fn(String) -> BillyError) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    log::warn!("Supabase request failed ({}): {}", status, message);
    if message.is_empty() {
        Err(to_error(format!("Request failed with status {}", status)))
    } else {
        Err(to_error(message))
    }
}
