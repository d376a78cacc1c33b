//! Otter Gateway - Voice chat proxy and terminal frontend
//!
//! This library provides both halves of a voice chatbot:
//! - An HTTP proxy in front of a speech provider (STT/TTS) and a RAG
//!   chat-completion backend
//! - A conversation state machine and turn orchestrator for frontends
//! - A terminal frontend with local microphone capture and playback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Frontends                         │
//! │        Browser (static/)   │   Terminal (chat)       │
//! └────────────────────┬────────────────────────────────┘
//!                      │  /api/speech-to-text, /api/chat,
//!                      │  /api/text-to-speech
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Otter Gateway                       │
//! │   Upload staging  │  Normalization  │  Relay         │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼──────────┐       ┌──────────▼────────────┐
//! │  Speech provider    │       │  RAG backend          │
//! │  STT  │  TTS        │       │  /v1/chat/completions │
//! └─────────────────────┘       └───────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod media;
pub mod session;
pub mod terminal;
pub mod upstream;
pub mod voice;

pub use api::{ApiServer, ApiServerBuilder, ApiState};
pub use client::ProxyClient;
pub use config::Config;
pub use conversation::{ConversationSession, ConversationState, InputMode, Transcript};
pub use error::{Error, Result};
pub use session::Orchestrator;
