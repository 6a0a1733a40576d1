use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BillyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Connection closed before the answer completed")]
    ConnectionClosed,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for BillyError {
    fn from(e: serde_json::Error) -> Self {
        BillyError::Serialization(e.to_string())
    }
}
