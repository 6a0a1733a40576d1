//! Chat backend adapter over browser `fetch()` via gloo-net.
//!
//! Every endpoint is a JSON POST. Chat history lives under the backend
//! URL; `store-query` belongs to the assistant service under the API URL.

use async_trait::async_trait;
use gloo_net::http::{Request, Response};
use serde::Serialize;

use billy_core::ports::ChatBackendPort;
use billy_types::{
    BillyError, Result,
    config::BillyConfig,
    feedback::FeedbackRecord,
    session::{
        PostChatRequest, RetrieveAllChatsRequest, RetrieveAllChatsResponse, RetrieveChatRequest,
        RetrieveChatResponse, StoredChat,
    },
};

pub const RETRIEVE_ALL_CHATS: &str = "retrieve-all-chats";
pub const RETRIEVE_CHAT: &str = "retrieve-chat";
pub const POST_CHATS: &str = "post-chats";
pub const STORE_QUERY: &str = "store-query";

pub struct HttpChatBackend {
    retrieve_all_url: String,
    retrieve_one_url: String,
    post_url: String,
    feedback_url: String,
}

impl HttpChatBackend {
    pub fn new(config: &BillyConfig) -> Self {
        Self {
            retrieve_all_url: config.backend_endpoint(RETRIEVE_ALL_CHATS),
            retrieve_one_url: config.backend_endpoint(RETRIEVE_CHAT),
            post_url: config.backend_endpoint(POST_CHATS),
            feedback_url: config.api_endpoint(STORE_QUERY),
        }
    }
}

/// POST a JSON body and fail on a non-2xx status.
pub(crate) async fn post_json<B: Serialize>(url: &str, body: &B) -> Result<Response> {
    let response = Request::post(url)
        .header("Content-Type", "application/json")
        .json(body)
        .map_err(|e| BillyError::Serialization(e.to_string()))?
        .send()
        .await
        .map_err(|e| BillyError::Network(e.to_string()))?;
    ensure_ok(response).await
}

pub(crate) async fn ensure_ok(response: Response) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(BillyError::Http { status, body })
}

#[async_trait(?Send)]
impl ChatBackendPort for HttpChatBackend {
    async fn retrieve_all_chats(&self, user_id: &str) -> Result<Vec<StoredChat>> {
        let body = RetrieveAllChatsRequest { user_id: user_id.to_string() };
        let response = post_json(&self.retrieve_all_url, &body).await?;
        let data: RetrieveAllChatsResponse = response
            .json()
            .await
            .map_err(|e| BillyError::Serialization(e.to_string()))?;
        log::debug!("Retrieved {} stored chats", data.chats.len());
        Ok(data.chats)
    }

    async fn retrieve_chat(&self, user_id: &str, chat_id: &str) -> Result<RetrieveChatResponse> {
        let body = RetrieveChatRequest {
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
        };
        let response = post_json(&self.retrieve_one_url, &body).await?;
        response
            .json()
            .await
            .map_err(|e| BillyError::Serialization(e.to_string()))
    }

    async fn post_chat(&self, request: &PostChatRequest) -> Result<()> {
        post_json(&self.post_url, request).await?;
        Ok(())
    }

    async fn store_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        post_json(&self.feedback_url, record).await?;
        Ok(())
    }
}
