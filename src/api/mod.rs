//! HTTP API server for the Otter gateway

pub mod chat;
pub mod error;
pub mod health;
pub mod legacy;
pub mod speech;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::config::Config;
use crate::media::AudioNormalizer;
use crate::upstream::{AgentClient, RagClient, SpeechToText, TextToSpeech, VoiceSettings};
use crate::{Error, Result};

/// Largest accepted request body (audio uploads)
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for API handlers
///
/// Holds only process-wide configuration and upstream clients; nothing in
/// here is mutated by requests.
pub struct ApiState {
    /// Speech-to-text client, absent when no provider key is configured
    pub stt: Option<SpeechToText>,
    /// Text-to-speech client, absent when no provider key is configured
    pub tts: Option<TextToSpeech>,
    pub rag: RagClient,
    /// Legacy conversational agent client, absent without both a key and an agent id
    pub agent: Option<AgentClient>,
    /// Configured agent id, reported even when no provider key is set
    pub agent_id: Option<String>,
    /// ffmpeg normalizer, absent when normalization is disabled
    pub normalizer: Option<AudioNormalizer>,
    /// Where uploads are staged for the duration of a request
    pub upload_dir: PathBuf,
}

impl ApiState {
    /// Build upstream clients from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self> {
        let voice = &config.voice;
        let timeout = config.upstream_timeout;
        let key = config.api_keys.elevenlabs.as_ref();

        let stt = key
            .map(|k| SpeechToText::new(&voice.base_url, copy_secret(k), &voice.stt_model, timeout))
            .transpose()?;

        let tts = key
            .map(|k| {
                TextToSpeech::new(
                    &voice.base_url,
                    copy_secret(k),
                    &voice.tts_model,
                    &voice.tts_voice,
                    VoiceSettings {
                        stability: voice.stability,
                        similarity_boost: voice.similarity_boost,
                    },
                    timeout,
                )
            })
            .transpose()?;

        let agent = match (key, &config.api_keys.elevenlabs_agent_id) {
            (Some(k), Some(agent_id)) => Some(AgentClient::new(
                &voice.base_url,
                copy_secret(k),
                agent_id,
                timeout,
            )?),
            _ => None,
        };

        if stt.is_none() {
            tracing::warn!("ELEVENLABS_API_KEY not set: speech endpoints will fail");
        }

        Ok(Self {
            stt,
            tts,
            rag: RagClient::new(&config.rag.url, timeout)?,
            agent,
            agent_id: config.api_keys.elevenlabs_agent_id.clone(),
            normalizer: voice
                .normalize
                .then(|| AudioNormalizer::new(voice.ffmpeg.clone())),
            upload_dir: config.server.upload_dir.clone(),
        })
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// Build the API routes (without static file serving)
pub fn router(state: Arc<ApiState>) -> Router {
    let api = Router::new()
        .merge(speech::router(state.clone()))
        .merge(chat::router(state.clone()))
        .merge(legacy::router(state.clone()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .nest("/api", api)
        .merge(health::router())
        .merge(health::ready_router(state))
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(state: Arc<ApiState>) -> Self {
        Self {
            state,
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
        }
    }

    /// Set the interface to bind
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port to listen on
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: self.state,
            host: self.host,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = router(self.state.clone());

        // Serve static files if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router
                .nest_service("/static", ServeDir::new(static_dir))
                .fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        match self.state.rag.health().await {
            Ok(()) => tracing::info!(url = %self.state.rag.base_url(), "RAG backend reachable"),
            Err(e) => tracing::warn!(
                url = %self.state.rag.base_url(),
                error = %e,
                "RAG backend health check failed; chat requests may fail"
            ),
        }

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(%addr, "API server listening on http://{addr}");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutting down");
                }
            })
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
