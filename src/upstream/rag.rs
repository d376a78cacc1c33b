//! RAG chat-completion client and the OpenAI-compatible wire types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ensure_success, http_client, join_url, transport_error};
use crate::error::Service;
use crate::Result;

/// Timeout for the startup connectivity probe
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// One message of a chat-completion request or response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI-compatible chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

/// Message of a completion choice; backends may omit `role` or send `content: null`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A single completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ReplyMessage>,
}

/// OpenAI-compatible chat-completion response (only the fields we read)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

impl ChatCompletionResponse {
    /// Content of the first choice's message, if present and non-empty
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

/// Relays chat completions to the RAG backend
pub struct RagClient {
    client: reqwest::Client,
    base_url: String,
}

impl RagClient {
    /// Create a new RAG client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    /// Configured base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full completions endpoint
    #[must_use]
    pub fn completions_url(&self) -> String {
        join_url(&self.base_url, "/v1/chat/completions")
    }

    /// Forward a chat-completion body verbatim and return the upstream JSON
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable, answers non-2xx, or
    /// returns a body that is not JSON
    pub async fn relay(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = self.completions_url();
        tracing::debug!(url = %url, "forwarding chat completion");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(Service::ChatCompletion, e))?;

        let response = ensure_success(Service::ChatCompletion, response).await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| transport_error(Service::ChatCompletion, e))?;
        Ok(data)
    }

    /// Probe the backend's `/health` endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached or is unhealthy
    pub async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(join_url(&self.base_url, "/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| crate::Error::from_transport(Service::ChatCompletion, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(crate::Error::Upstream {
                service: Service::ChatCompletion,
                status: status.as_u16(),
                body: super::truncate_body(&response.text().await.unwrap_or_default()),
            })
        }
    }
}
