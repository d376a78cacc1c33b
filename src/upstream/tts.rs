//! Text-to-speech (TTS) client

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::{ensure_success, http_client, join_url, transport_error};
use crate::error::Service;
use crate::{Error, Result};

/// Fixed voice-quality parameters sent with every synthesis
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    default_voice: String,
    settings: VoiceSettings,
}

impl TextToSpeech {
    /// Create a new TTS client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        default_voice: impl Into<String>,
        settings: VoiceSettings,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for text-to-speech".to_string(),
            ));
        }

        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            default_voice: default_voice.into(),
            settings,
        })
    }

    /// Synthesize text to speech
    ///
    /// Uses the configured default voice when `voice_id` is `None` or blank.
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if the text is empty or synthesis fails
    pub async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SynthesisRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        if text.trim().is_empty() {
            return Err(Error::Validation("text is required".to_string()));
        }

        let voice = voice_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.default_voice);

        tracing::debug!(chars = text.len(), voice, "starting synthesis");

        let url = join_url(
            &self.base_url,
            &format!("/v1/text-to-speech/{}", urlencoding::encode(voice)),
        );

        let request = SynthesisRequest {
            text,
            model_id: &self.model,
            voice_settings: self.settings,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(Service::TextToSpeech, e))?;

        let response = ensure_success(Service::TextToSpeech, response).await?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| transport_error(Service::TextToSpeech, e))?;
        tracing::info!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
