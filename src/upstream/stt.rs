//! Speech-to-text (STT) client

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::{ensure_success, http_client, join_url, transport_error};
use crate::error::Service;
use crate::{Error, Result};

/// Response from the `ElevenLabs` transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for speech-to-text".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        })
    }

    /// Model identifier sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Transcribe audio to text
    ///
    /// Returns the trimmed transcript.
    ///
    /// # Errors
    ///
    /// Returns error if the audio is empty or transcription fails
    pub async fn transcribe(&self, audio: Vec<u8>, file_name: &str, mime: &str) -> Result<String> {
        if audio.is_empty() {
            return Err(Error::Validation("empty audio data".to_string()));
        }

        tracing::debug!(audio_bytes = audio.len(), mime, "starting transcription");

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| Error::Validation(format!("invalid audio MIME type {mime:?}: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model_id", self.model.clone());

        let response = self
            .client
            .post(join_url(&self.base_url, "/v1/speech-to-text"))
            .header("xi-api-key", self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(Service::SpeechToText, e))?;

        let response = ensure_success(Service::SpeechToText, response).await?;

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        let transcript = result.text.trim().to_string();
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}
