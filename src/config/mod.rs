//! Configuration management for the Otter gateway

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

/// Default ElevenLabs voice ("Rachel")
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Timeout applied to every upstream call
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway configuration, loaded once at startup
#[derive(Debug)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Voice provider configuration
    pub voice: VoiceConfig,

    /// RAG backend configuration
    pub rag: RagConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Timeout for STT, TTS and chat upstream calls
    pub upstream_timeout: Duration,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Directory where uploaded audio is staged for the duration of a request
    pub upload_dir: PathBuf,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Provider base URL
    pub base_url: String,

    /// STT model identifier sent with every transcription
    pub stt_model: String,

    /// TTS model identifier
    pub tts_model: String,

    /// Voice used when a synthesis request names none
    pub tts_voice: String,

    /// Voice stability (0.0 to 1.0)
    pub stability: f32,

    /// Voice similarity boost (0.0 to 1.0)
    pub similarity_boost: f32,

    /// Normalize uploads with ffmpeg before transcription
    pub normalize: bool,

    /// ffmpeg binary
    pub ffmpeg: PathBuf,
}

/// RAG backend configuration
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Base URL; `/v1/chat/completions` and `/health` are appended
    pub url: String,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `ElevenLabs` API key (STT and TTS)
    pub elevenlabs: Option<SecretString>,

    /// `ElevenLabs` conversational agent id (legacy endpoints)
    pub elevenlabs_agent_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
            upload_dir: std::env::temp_dir().join("otter-uploads"),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            stt_model: "scribe_v1".to_string(),
            tts_model: "eleven_monolingual_v1".to_string(),
            tts_voice: DEFAULT_VOICE_ID.to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            normalize: true,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            voice: VoiceConfig::default(),
            rag: RagConfig::default(),
            api_keys: ApiKeys::default(),
            upstream_timeout: UPSTREAM_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a URL setting is malformed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let defaults = Self::default();

        let server = ServerConfig {
            host: env("OTTER_HOST")
                .or(fc.server.host)
                .unwrap_or(defaults.server.host),
            port: env("OTTER_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(defaults.server.port),
            static_dir: env("OTTER_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            upload_dir: env("OTTER_UPLOAD_DIR")
                .or(fc.server.upload_dir)
                .map_or(defaults.server.upload_dir, PathBuf::from),
        };

        let voice = VoiceConfig {
            base_url: env("ELEVENLABS_BASE_URL")
                .or(fc.voice.base_url)
                .unwrap_or(defaults.voice.base_url),
            stt_model: env("OTTER_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.voice.stt_model),
            tts_model: env("OTTER_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.voice.tts_model),
            tts_voice: env("OTTER_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(defaults.voice.tts_voice),
            stability: fc.voice.stability.unwrap_or(defaults.voice.stability),
            similarity_boost: fc
                .voice
                .similarity_boost
                .unwrap_or(defaults.voice.similarity_boost),
            normalize: env("OTTER_NORMALIZE_AUDIO")
                .map(|v| parse_flag(&v))
                .or(fc.voice.normalize)
                .unwrap_or(defaults.voice.normalize),
            ffmpeg: env("OTTER_FFMPEG")
                .or(fc.voice.ffmpeg)
                .map_or(defaults.voice.ffmpeg, PathBuf::from),
        };

        let rag = RagConfig {
            url: env("RAG_BACKEND_URL")
                .or(fc.rag.url)
                .unwrap_or(defaults.rag.url),
        };

        let api_keys = ApiKeys {
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
            elevenlabs_agent_id: env("ELEVENLABS_AGENT_ID").or(fc.api_keys.elevenlabs_agent_id),
        };

        let config = Self {
            server,
            voice,
            rag,
            api_keys,
            upstream_timeout: defaults.upstream_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that configured base URLs parse
    ///
    /// # Errors
    ///
    /// Returns error naming the first malformed URL
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("RAG backend URL", &self.rag.url),
            ("voice provider URL", &self.voice.base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("invalid {name} {value:?}: {e}")))?;
        }
        Ok(())
    }

    /// Log which secrets are present without revealing them
    pub fn log_environment(&self) {
        tracing::info!(
            elevenlabs_api_key = presence(self.api_keys.elevenlabs.is_some()),
            elevenlabs_agent_id = presence(self.api_keys.elevenlabs_agent_id.is_some()),
            rag_backend = %self.rag.url,
            normalize_audio = self.voice.normalize,
            "environment check"
        );
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

const fn presence(set: bool) -> &'static str {
    if set { "set" } else { "not set" }
}
