//! GraphQL over HTTP POST for queries and mutations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{Subscription, Transport};
use crate::config::MythicConfig;
use crate::error::{MythicError, Result};
use crate::graphql::{GraphqlRequest, GraphqlResponse};

/// Longest response body echoed back in an error.
const BODY_PREVIEW_LIMIT: usize = 512;

pub struct HttpTransport {
    client: Client,
    url: String,
    auth: (&'static str, String),
    scripting_version: String,
}

impl HttpTransport {
    pub fn new(config: Arc<MythicConfig>) -> Result<Self> {
        let mut builder = Client::builder().danger_accept_invalid_certs(config.ssl);
        if let Some(timeout) = config.global_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: config.http_url(),
            auth: config.auth_header()?,
            scripting_version: config.scripting_version.clone(),
        })
    }

    /// Point at an explicit endpoint instead of the one derived from config.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn post(&self, request: &GraphqlRequest) -> Result<Value> {
        tracing::debug!(
            operation = request.operation_name().unwrap_or("anonymous"),
            "POST {}",
            self.url
        );

        let resp = self
            .client
            .post(&self.url)
            .header(self.auth.0, &self.auth.1)
            .header("Content-Type", "application/json")
            .header("scripting_version", &self.scripting_version)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(MythicError::HttpStatus {
                status: status.as_u16(),
                body: preview_body(&text),
            });
        }

        let envelope: GraphqlResponse = serde_json::from_str(&text)?;
        envelope.into_data()
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn query(&self, request: GraphqlRequest) -> Result<Value> {
        self.post(&request).await
    }

    async fn subscribe(
        &self,
        _request: GraphqlRequest,
        _timeout: Option<Duration>,
    ) -> Result<Subscription> {
        Err(MythicError::Subscription(
            "subscriptions are not supported over HTTP".to_string(),
        ))
    }
}
