//! Remote SQL query service
//!
//! Statements are not validated or executed locally; they are posted as
//! `{"sql": ..., "limit": ...}` to the query endpoint with bearer-token auth.

use crate::config::QueryServiceConfig;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

/// Row cap applied to every statement, independent of the statement's own LIMIT.
pub const QUERY_ROW_LIMIT: u32 = 10;

#[async_trait]
pub trait QueryService: Send + Sync {
    /// Execute one statement. Service-side rejections come back as
    /// [`AgentError::QueryRejected`]; transport failures as other variants.
    async fn execute(&self, sql: &str, limit: u32) -> Result<serde_json::Value>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    sql: &'a str,
    limit: u32,
}

#[derive(Clone)]
pub struct HttpQueryService {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpQueryService {
    pub fn new(config: &QueryServiceConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AgentError::Config("Query service token is not set (QUERY_API_TOKEN)".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            token,
        })
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn execute(&self, sql: &str, limit: u32) -> Result<serde_json::Value> {
        info!("Executing SQL: {}", sql);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(&QueryRequest { sql, limit })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::QueryRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        debug!("Query service response: {}", body);
        Ok(body)
    }
}
