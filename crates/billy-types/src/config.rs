use serde::{Deserialize, Serialize};
use crate::{BillyError, Result};

/// Top-level client configuration.
/// Read once at startup and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillyConfig {
    /// Assistant service: socket endpoint and `store-query`
    pub api_url: String,
    /// Chat persistence endpoints
    pub backend_url: String,
    pub supabase: SupabaseConfig,
    /// Socket.IO event name used in both directions
    pub socket_event: String,
    /// Idle timeout while connecting and between fragments
    pub exchange_timeout_ms: u64,
    /// Stored chats kept after a history load
    pub history_limit: usize,
    /// Category attached to feedback records
    pub feedback_category: String,
}

impl Default for BillyConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            backend_url: DEFAULT_API_URL.to_string(),
            supabase: SupabaseConfig::default(),
            socket_event: "billy".to_string(),
            exchange_timeout_ms: 60_000,
            history_limit: 10,
            feedback_category: "general".to_string(),
        }
    }
}

impl BillyConfig {
    /// Configuration baked in at build time.
    ///
    /// `BILLY_API_URL`, `BILLY_BACKEND_URL`, `BILLY_SUPABASE_URL`,
    /// `BILLY_SUPABASE_ANON_KEY` and `BILLY_EXCHANGE_TIMEOUT_MS` override
    /// the defaults. The backend URL falls back to the API URL.
    pub fn from_env() -> Self {
        Self::from_values(
            option_env!("BILLY_API_URL"),
            option_env!("BILLY_BACKEND_URL"),
            option_env!("BILLY_SUPABASE_URL"),
            option_env!("BILLY_SUPABASE_ANON_KEY"),
            option_env!("BILLY_EXCHANGE_TIMEOUT_MS"),
        )
    }

    pub fn from_values(
        api_url: Option<&str>,
        backend_url: Option<&str>,
        supabase_url: Option<&str>,
        supabase_anon_key: Option<&str>,
        timeout_ms: Option<&str>,
    ) -> Self {
        let mut config = Self::default();
        if let Some(url) = non_empty(api_url) {
            config.api_url = trim_base(url);
        }
        config.backend_url = non_empty(backend_url)
            .map(trim_base)
            .unwrap_or_else(|| config.api_url.clone());
        if let Some(url) = non_empty(supabase_url) {
            config.supabase.url = trim_base(url);
        }
        if let Some(key) = non_empty(supabase_anon_key) {
            config.supabase.anon_key = key.to_string();
        }
        if let Some(ms) = non_empty(timeout_ms).and_then(|v| v.parse().ok()) {
            config.exchange_timeout_ms = ms;
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(BillyError::Config("api_url is empty".to_string()));
        }
        if self.backend_url.is_empty() {
            return Err(BillyError::Config("backend_url is empty".to_string()));
        }
        if self.socket_event.is_empty() {
            return Err(BillyError::Config("socket_event is empty".to_string()));
        }
        if self.exchange_timeout_ms == 0 {
            return Err(BillyError::Config(
                "exchange_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Join a chat-persistence endpoint onto the backend URL.
    pub fn backend_endpoint(&self, path: &str) -> String {
        join_url(&self.backend_url, path)
    }

    /// Join an assistant-service endpoint onto the API URL.
    pub fn api_endpoint(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
        }
    }
}

const DEFAULT_API_URL: &str = "http://localhost:5000";

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
