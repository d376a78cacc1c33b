//! Conversational agent client (legacy signed-URL flow)

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::{ensure_success, http_client, join_url, transport_error};
use crate::error::Service;
use crate::{Error, Result};

#[derive(serde::Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

/// Fetches signed conversation URLs for a hosted agent
pub struct AgentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    agent_id: String,
}

impl AgentClient {
    /// Create a new agent client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        agent_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
            api_key,
            agent_id: agent_id.into(),
        })
    }

    /// Request a signed conversation URL for the configured agent
    ///
    /// # Errors
    ///
    /// Returns error if the provider rejects the request
    pub async fn signed_url(&self) -> Result<String> {
        let url = join_url(
            &self.base_url,
            &format!(
                "/v1/convai/conversation/get_signed_url?agent_id={}",
                urlencoding::encode(&self.agent_id)
            ),
        );
        tracing::debug!(agent_id = %self.agent_id, "requesting signed URL");

        let response = self
            .client
            .get(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| transport_error(Service::Agent, e))?;

        let response = ensure_success(Service::Agent, response).await?;

        let data: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| transport_error(Service::Agent, e))?;

        if data.signed_url.is_empty() {
            return Err(Error::Upstream {
                service: Service::Agent,
                status: 200,
                body: "response missing signed_url".to_string(),
            });
        }
        Ok(data.signed_url)
    }
}
