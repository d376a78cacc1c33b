//! TOML configuration file loading
//!
//! Supports `~/.config/otter/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct OtterConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Voice (STT/TTS) configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// RAG backend configuration
    #[serde(default)]
    pub rag: RagFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Interface to bind
    pub host: Option<String>,

    /// Port to listen on
    pub port: Option<u16>,

    /// Directory holding the built web UI
    pub static_dir: Option<String>,

    /// Directory for temporary audio uploads
    pub upload_dir: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Provider base URL (e.g. `https://api.elevenlabs.io`)
    pub base_url: Option<String>,

    /// STT model (e.g. "scribe_v1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "eleven_monolingual_v1")
    pub tts_model: Option<String>,

    /// Default TTS voice identifier
    pub tts_voice: Option<String>,

    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,

    /// Normalize uploads to mono/16 kHz/PCM16 before STT
    pub normalize: Option<bool>,

    /// Path to the ffmpeg binary
    pub ffmpeg: Option<String>,
}

/// RAG backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct RagFileConfig {
    /// Base URL of the OpenAI-compatible completion service
    pub url: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub elevenlabs: Option<String>,
    pub elevenlabs_agent_id: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `OtterConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> OtterConfigFile {
    let Some(path) = config_file_path() else {
        return OtterConfigFile::default();
    };

    if !path.exists() {
        return OtterConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                OtterConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            OtterConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/otter/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("otter").join("config.toml"))
}
