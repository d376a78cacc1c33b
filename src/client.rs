//! HTTP client for a running gateway
//!
//! Used by the terminal frontend; speaks the same `/api` routes the browser
//! frontend does.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};

use crate::error::Service;
use crate::session::{CapturedAudio, ProxyApi};
use crate::upstream::{
    ChatCompletionRequest, ChatCompletionResponse, ensure_success, http_client, join_url,
    transport_error,
};
use crate::{Error, Result};

/// Turns wait on the full upstream chain, so allow more than one upstream timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TranscribeReply {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_id: Option<&'a str>,
}

/// Client for the gateway's speech and chat endpoints
pub struct ProxyClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    /// Create a client for the gateway at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid gateway URL {base_url}: {e}")))?;

        Ok(Self {
            client: http_client(timeout)?,
            base_url,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

#[async_trait(?Send)]
impl ProxyApi for ProxyClient {
    async fn transcribe(&self, audio: CapturedAudio) -> Result<String> {
        let part = multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime)
            .map_err(|e| Error::Validation(format!("invalid audio MIME type: {e}")))?;
        let form = multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(self.url("/api/speech-to-text"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(Service::Proxy, e))?;

        let reply: TranscribeReply = ensure_success(Service::Proxy, response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(Service::Proxy, e))?;

        Ok(reply.text)
    }

    async fn chat(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(Service::Proxy, e))?;

        ensure_success(Service::Proxy, response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(Service::Proxy, e))
    }

    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.url("/api/text-to-speech"))
            .json(&SynthesizeBody { text, voice_id })
            .send()
            .await
            .map_err(|e| transport_error(Service::Proxy, e))?;

        let bytes = ensure_success(Service::Proxy, response)
            .await?
            .bytes()
            .await
            .map_err(|e| transport_error(Service::Proxy, e))?;

        Ok(bytes.to_vec())
    }
}
