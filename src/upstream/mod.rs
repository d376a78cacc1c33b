//! Typed HTTP clients for the external collaborators
//!
//! Each client owns a `reqwest::Client` built with a bounded timeout. A
//! non-success status becomes [`Error::Upstream`] carrying the status and a
//! truncated body; transport failures become [`Error::UpstreamUnreachable`].

mod agent;
mod rag;
mod stt;
mod tts;

use std::time::Duration;

pub use agent::AgentClient;
pub use rag::{
    ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, RagClient,
    ReplyMessage,
};
pub use stt::SpeechToText;
pub use tts::{TextToSpeech, VoiceSettings};

use crate::error::Service;
use crate::{Error, Result};

/// Upstream bodies are cut to this many characters before logging
pub const MAX_BODY_CHARS: usize = 512;

/// Build an HTTP client with the given request timeout
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::Http)
}

/// Truncate an upstream body for logs and error details
#[must_use]
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

/// Join a base URL and an absolute path without doubling slashes
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Pass a response through if successful, otherwise read its body into an error
pub(crate) async fn ensure_success(service: Service, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    tracing::debug!(service = service.as_str(), status = %status, "received response");

    if status.is_success() {
        return Ok(response);
    }

    let body = truncate_body(&response.text().await.unwrap_or_default());
    tracing::error!(
        service = service.as_str(),
        status = status.as_u16(),
        body = %body,
        "upstream returned error status"
    );
    Err(Error::Upstream {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Log and classify a transport failure
pub(crate) fn transport_error(service: Service, e: reqwest::Error) -> Error {
    let err = Error::from_transport(service, e);
    if err.is_unreachable() {
        tracing::error!(service = service.as_str(), error = %err, kind = "unreachable", "upstream request failed");
    } else {
        tracing::error!(service = service.as_str(), error = %err, "upstream request failed");
    }
    err
}
