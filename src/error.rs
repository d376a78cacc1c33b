//! Error types for the Otter gateway

use std::fmt;

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// External collaborator an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Speech-to-text provider
    SpeechToText,
    /// Text-to-speech provider
    TextToSpeech,
    /// RAG chat-completion backend
    ChatCompletion,
    /// Conversational agent provider (legacy signed-URL flow)
    Agent,
    /// The gateway itself, as seen from the frontend
    Proxy,
}

impl Service {
    /// Short identifier used in structured log fields
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SpeechToText => "stt",
            Self::TextToSpeech => "tts",
            Self::ChatCompletion => "rag",
            Self::Agent => "agent",
            Self::Proxy => "proxy",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SpeechToText => "speech-to-text service",
            Self::TextToSpeech => "text-to-speech service",
            Self::ChatCompletion => "RAG backend",
            Self::Agent => "agent service",
            Self::Proxy => "gateway",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or missing client input
    #[error("validation error: {0}")]
    Validation(String),

    /// A reachable upstream answered with a non-success status
    #[error("{service} returned status {status}: {body}")]
    Upstream {
        service: Service,
        status: u16,
        body: String,
    },

    /// Connection, DNS or timeout failure reaching an upstream
    #[error("{service} unreachable: {source}")]
    UpstreamUnreachable {
        service: Service,
        #[source]
        source: reqwest::Error,
    },

    /// Local audio pre-processing failed
    #[error("local processing error: {0}")]
    LocalProcessing(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Map a transport-level reqwest failure for `service`
    ///
    /// Timeouts and connection failures become [`Error::UpstreamUnreachable`];
    /// anything else (body decoding, builder errors) stays [`Error::Http`].
    #[must_use]
    pub fn from_transport(service: Service, source: reqwest::Error) -> Self {
        if source.is_timeout() || source.is_connect() || source.is_request() {
            Self::UpstreamUnreachable { service, source }
        } else {
            Self::Http(source)
        }
    }

    /// Whether the upstream could not be reached at all
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::UpstreamUnreachable { .. })
    }

    /// Whether this error was caused by client input
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Upstream HTTP status, when the upstream answered
    #[must_use]
    pub const fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_mentions_status() {
        let err = Error::Upstream {
            service: Service::SpeechToText,
            status: 502,
            body: "bad gateway".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("speech-to-text"));
        assert_eq!(err.upstream_status(), Some(502));
        assert!(!err.is_unreachable());
    }

    #[test]
    fn validation_is_flagged() {
        assert!(Error::Validation("no text".into()).is_validation());
        assert!(!Error::Config("x".into()).is_validation());
    }
}
