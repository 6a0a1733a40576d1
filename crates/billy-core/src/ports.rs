//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `billy-core` (pure Rust).
//! Implementations live in `billy-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use std::future::Future;
use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use billy_types::{
    Result,
    analytics::{QueryRecord, SessionRecord},
    auth::{SignUpRequest, UserIdentity},
    event::{StreamFragment, StreamRequest},
    feedback::FeedbackRecord,
    session::{PostChatRequest, RetrieveChatResponse, StoredChat},
};

// ─── Streaming Port ──────────────────────────────────────────

/// Inbound event on an open exchange channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A decoded fragment from the assistant backend
    Fragment(StreamFragment),
    /// The server or transport closed the channel
    Closed,
    /// Transport failure
    Error(String),
}

/// Closes the transport behind a channel.
pub trait ChannelHandle {
    /// Close the connection. Calling it again is a no-op.
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// An open connection scoped to one exchange
pub struct ExchangeChannel {
    pub events: Pin<Box<dyn Stream<Item = ChannelEvent>>>,
    pub handle: Box<dyn ChannelHandle>,
}

#[async_trait(?Send)]
pub trait StreamPort {
    /// Open a connection to the assistant backend and, once the server
    /// acknowledges it, emit `request`. Resolves to the channel on which
    /// fragments arrive.
    async fn open(&self, request: &StreamRequest) -> Result<ExchangeChannel>;
}

// ─── Timer Port ──────────────────────────────────────────────

pub trait TimerPort {
    /// Resolve after `ms` milliseconds.
    fn sleep(&self, ms: u64) -> Pin<Box<dyn Future<Output = ()>>>;
}

// ─── Chat Backend Port ───────────────────────────────────────

#[async_trait(?Send)]
pub trait ChatBackendPort {
    /// `retrieve-all-chats`
    async fn retrieve_all_chats(&self, user_id: &str) -> Result<Vec<StoredChat>>;

    /// `retrieve-chat`
    async fn retrieve_chat(&self, user_id: &str, chat_id: &str) -> Result<RetrieveChatResponse>;

    /// `post-chats`
    async fn post_chat(&self, request: &PostChatRequest) -> Result<()>;

    /// `store-query`
    async fn store_feedback(&self, record: &FeedbackRecord) -> Result<()>;
}

// ─── Auth Port ───────────────────────────────────────────────

#[async_trait(?Send)]
pub trait AuthPort {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserIdentity>;

    /// Register; the user confirms by email before signing in.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<()>;

    /// Confirm a sign-up from the emailed token hash.
    async fn verify_signup(&self, token_hash: &str) -> Result<()>;

    /// Email a one-time sign-in link (password recovery).
    async fn send_magic_link(&self, email: &str) -> Result<()>;

    async fn update_password(&self, identity: &UserIdentity, password: &str) -> Result<()>;

    async fn sign_out(&self, identity: &UserIdentity) -> Result<()>;

    /// First name from the user's profile row, if any.
    async fn first_name(&self, identity: &UserIdentity) -> Result<Option<String>>;
}

// ─── Analytics Port ──────────────────────────────────────────

#[async_trait(?Send)]
pub trait AnalyticsPort {
    /// Judged questions created at or after `since` (RFC 3339), or all.
    async fn query_records(&self, since: Option<&str>) -> Result<Vec<QueryRecord>>;

    /// Tracked user sessions.
    async fn session_records(&self) -> Result<Vec<SessionRecord>>;
}
