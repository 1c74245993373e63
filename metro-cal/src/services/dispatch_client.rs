//! Outbound message dispatch
//!
//! Reminder messages leave the service as one JSON batch POSTed to an
//! external endpoint with a bearer token. Delivery (SMTP and the like) is
//! the endpoint's business.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("metro-cal/", env!("CARGO_PKG_VERSION"));

/// One reminder for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub subject: String,
    /// Sender label
    pub sender: String,
    pub recipient_name: String,
    pub sender_address: String,
    pub recipient_address: String,
    pub body: String,
}

/// Request body of the batch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchBatch {
    pub messages: Vec<OutboundMessage>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatch client setup failed: {0}")]
    Client(String),

    #[error("Dispatch request failed: {0}")]
    Network(String),
}

/// Outcome of a delivered batch call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReceipt {
    pub http_status: u16,
    /// Messages submitted in the batch
    pub accepted: usize,
}

impl DispatchReceipt {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

/// Sink for reminder batches
#[async_trait::async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn dispatch(&self, batch: &DispatchBatch) -> Result<DispatchReceipt, DispatchError>;
}

/// reqwest-backed dispatcher
pub struct HttpDispatcher {
    http_client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpDispatcher {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl MessageDispatcher for HttpDispatcher {
    async fn dispatch(&self, batch: &DispatchBatch) -> Result<DispatchReceipt, DispatchError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            messages = batch.messages.len(),
            "Posting reminder batch"
        );

        let mut request = self.http_client.post(&self.endpoint).json(batch);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        Ok(DispatchReceipt {
            http_status: response.status().as_u16(),
            accepted: batch.messages.len(),
        })
    }
}
