use std::cell::RefCell;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use billy_core::ports::AnalyticsPort;
use billy_types::{
    BillyError, Result,
    analytics::{QueryRecord, SessionRecord},
};
use super::{check, send, SupabaseClient};

pub const QUERIES_TABLE: &str = "store-queries";
pub const SESSIONS_TABLE: &str = "user_sessions";

/// PostgREST reads for the dashboard. Uses the signed-in user's token
/// when one has been set, the anon key otherwise.
pub struct SupabaseAnalytics {
    client: SupabaseClient,
    access_token: RefCell<Option<String>>,
}

impl SupabaseAnalytics {
    pub fn new(client: SupabaseClient) -> Self {
        Self {
            client,
            access_token: RefCell::new(None),
        }
    }

    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.borrow_mut() = token;
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, params: &[(&str, &str)]) -> Result<Vec<T>> {
        let token = self.access_token.borrow().clone();
        let request = self
            .client
            .get(&self.client.rest_url(table), token.as_deref())
            .query(params.iter().copied())
            .build();
        let response = check(send(request).await?, BillyError::Network).await?;
        response
            .json()
            .await
            .map_err(|e| BillyError::Serialization(e.to_string()))
    }
}

#[async_trait(?Send)]
impl AnalyticsPort for SupabaseAnalytics {
    async fn query_records(&self, since: Option<&str>) -> Result<Vec<QueryRecord>> {
        let filter = since.map(|ts| format!("gte.{}", ts));
        let mut params = vec![("select", "created_at,correct,bucket,user_id")];
        if let Some(filter) = &filter {
            params.push(("created_at", filter.as_str()));
        }
        let records: Vec<QueryRecord> = self.select(QUERIES_TABLE, &params).await?;
        log::debug!("Fetched {} judged questions", records.len());
        Ok(records)
    }

    async fn session_records(&self) -> Result<Vec<SessionRecord>> {
        self.select(SESSIONS_TABLE, &[("select", "*")]).await
    }
}
