//! Speech endpoints: speech-to-text and text-to-speech

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::media::{
    AudioNormalizer, DEFAULT_UPLOAD_MIME, NORMALIZED_MIME, NormalizedAudio, UploadedAudio,
};
use crate::{Error, Result};

const TRANSCRIBE_FAILED: &str = "Transcription failed";
const SYNTHESIS_FAILED: &str = "Text-to-speech failed";

/// Build speech router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/speech-to-text", post(speech_to_text))
        .route("/transcribe", post(speech_to_text))
        .route("/text-to-speech", post(text_to_speech))
        .with_state(state)
}

/// Transcription response
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Audio received in a multipart upload
#[derive(Debug)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
}

/// Transcribe an uploaded audio file
///
/// Expects multipart form data with the audio in field `audio` (`file` is
/// accepted too).
async fn speech_to_text(
    State(state): State<Arc<ApiState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<TranscribeResponse>, ApiError> {
    let multipart = multipart.map_err(|e| {
        tracing::warn!(error = %e, "rejected non-multipart transcription request");
        ApiError::bad_request("Expected multipart form data with an audio file")
    })?;

    let upload = read_audio_field(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No audio file uploaded"))?;

    tracing::info!(
        bytes = upload.bytes.len(),
        file_name = %upload.file_name,
        mime = %upload.mime,
        "received audio for transcription"
    );

    let text = transcribe_upload(&state, upload).await.map_err(|e| {
        tracing::error!(error = %e, unreachable = e.is_unreachable(), "transcription failed");
        ApiError::from_error(TRANSCRIBE_FAILED, &e)
    })?;

    Ok(Json(TranscribeResponse { text }))
}

/// Pull the first audio field out of a multipart body
async fn read_audio_field(
    mut multipart: Multipart,
) -> std::result::Result<Option<AudioUpload>, ApiError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        tracing::warn!(error = %e, "malformed multipart body");
        ApiError::bad_request(format!("Malformed multipart body: {e}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if !matches!(field.name(), Some("audio" | "file")) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("recording.wav").to_string();
        let mime = field
            .content_type()
            .unwrap_or(DEFAULT_UPLOAD_MIME)
            .to_string();
        let bytes = field.bytes().await.map_err(malformed)?;

        return Ok(Some(AudioUpload {
            bytes: bytes.to_vec(),
            file_name,
            mime,
        }));
    }

    Ok(None)
}

/// Stage, optionally normalize, and transcribe one upload
///
/// The staged upload and any normalized copy live only inside this function;
/// both temp files are removed when it returns, whatever the outcome.
///
/// # Errors
///
/// Returns [`Error::Validation`] for empty audio, [`Error::Config`] when no
/// STT provider is configured, and upstream errors from the STT call
pub async fn transcribe_upload(state: &ApiState, upload: AudioUpload) -> Result<String> {
    if upload.bytes.is_empty() {
        return Err(Error::Validation("Uploaded audio file is empty".to_string()));
    }

    let stt = state.stt.as_ref().ok_or_else(|| {
        Error::Config("speech-to-text not configured (ELEVENLABS_API_KEY missing)".to_string())
    })?;

    let AudioUpload {
        bytes,
        file_name,
        mime,
    } = upload;
    let staged = UploadedAudio::stage(&state.upload_dir, bytes, &mime, &file_name).await?;

    let normalized = match &state.normalizer {
        Some(normalizer) => normalize_or_fallback(normalizer, &staged, &state.upload_dir).await,
        None => None,
    };

    let result = match normalized {
        Some((normalized, bytes)) => {
            let result = stt.transcribe(bytes, "audio.wav", NORMALIZED_MIME).await;
            drop(normalized);
            result
        }
        None => {
            stt.transcribe(staged.bytes().to_vec(), staged.file_name(), staged.mime())
                .await
        }
    };

    drop(staged);
    result
}

/// Normalize the upload, or log and return `None` so the original is used
async fn normalize_or_fallback(
    normalizer: &AudioNormalizer,
    staged: &UploadedAudio,
    dir: &Path,
) -> Option<(NormalizedAudio, Vec<u8>)> {
    let normalized = match normalizer.normalize(staged, dir).await {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::warn!(error = %e, "audio normalization failed, submitting original audio");
            return None;
        }
    };

    match normalized.read().await {
        Ok(bytes) => Some((normalized, bytes)),
        Err(e) => {
            tracing::warn!(error = %e, "could not read normalized audio, submitting original audio");
            None
        }
    }
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// Synthesize text to speech
///
/// Returns audio in MP3 format
async fn text_to_speech(
    State(state): State<Arc<ApiState>>,
    payload: std::result::Result<Json<SynthesizeRequest>, JsonRejection>,
) -> std::result::Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::warn!(error = %e, "rejected synthesis request body");
        ApiError::bad_request(format!("Invalid JSON body: {}", e.body_text()))
    })?;

    let text = request
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Text is required"))?;

    let tts = state.tts.as_ref().ok_or_else(|| {
        ApiError::from_error(
            SYNTHESIS_FAILED,
            &Error::Config("text-to-speech not configured (ELEVENLABS_API_KEY missing)".to_string()),
        )
    })?;

    tracing::info!(chars = text.len(), voice_id = ?request.voice_id, "synthesizing speech");

    let audio = tts
        .synthesize(text, request.voice_id.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, unreachable = e.is_unreachable(), "synthesis failed");
            ApiError::from_error(SYNTHESIS_FAILED, &e)
        })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_LENGTH, audio.len().to_string()),
        ],
        audio,
    )
        .into_response())
}
