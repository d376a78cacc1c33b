//! Session orchestration for one conversational frontend
//!
//! The [`Orchestrator`] sequences a turn strictly: capture, transcribe, relay,
//! synthesize, play. Each stage waits for the previous one because its input
//! is the previous stage's output. Devices, the proxy and the view sit behind
//! traits so the whole flow runs without a browser, microphone or network.
//!
//! The frontend is single-threaded and cooperative, so the seams are
//! `?Send` async traits.

use async_trait::async_trait;

use crate::Result;
use crate::conversation::{
    ChatTurn, ConversationSession, FALLBACK_REPLY, InputMode, PrimaryAction, Transcript,
    normalize_user_text,
};
use crate::upstream::{ChatCompletionRequest, ChatCompletionResponse};

/// Chat model requested from the RAG backend
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4";

/// Audio recorded from the microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

impl CapturedAudio {
    /// WAV recording with the default upload filename
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "audio/wav".to_string(),
            file_name: "recording.wav".to_string(),
        }
    }
}

/// The gateway's three operations as seen by the frontend
#[async_trait(?Send)]
pub trait ProxyApi {
    /// Transcribe recorded audio
    async fn transcribe(&self, audio: CapturedAudio) -> Result<String>;

    /// Relay a chat-completion request
    async fn chat(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse>;

    /// Synthesize speech; returns MPEG audio
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>>;
}

/// Microphone access
#[async_trait(?Send)]
pub trait Microphone {
    /// Ask for access to the microphone
    async fn request_permission(&mut self) -> Result<()>;

    /// Open a capture stream and start recording
    fn open(&mut self) -> Result<Box<dyn CaptureStream>>;
}

/// An open microphone stream
///
/// Dropping the stream releases the device without producing audio.
pub trait CaptureStream {
    /// Stop capturing, release the device, and return the recording
    fn finish(self: Box<Self>) -> Result<CapturedAudio>;
}

/// Plays synthesized speech
#[async_trait(?Send)]
pub trait AudioSink {
    /// Play MPEG audio to completion
    async fn play(&mut self, mpeg: &[u8]) -> Result<()>;
}

/// Decorative "speaking" feedback (the avatar's mouth)
pub trait SpeakingIndicator {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Indicator that shows nothing
#[derive(Debug, Default)]
pub struct NoIndicator;

impl SpeakingIndicator for NoIndicator {
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

/// Where the conversation is rendered
pub trait View {
    /// The session changed state or input mode
    fn render_state(&mut self, session: ConversationSession);

    /// A turn was appended to the transcript
    fn render_turn(&mut self, turn: &ChatTurn);

    /// A user-visible error
    fn show_error(&mut self, message: &str);
}

/// Drives conversational turns against the gateway
pub struct Orchestrator {
    proxy: Box<dyn ProxyApi>,
    microphone: Box<dyn Microphone>,
    sink: Box<dyn AudioSink>,
    view: Box<dyn View>,
    indicator: Box<dyn SpeakingIndicator>,
    transcript: Transcript,
    capture: Option<Box<dyn CaptureStream>>,
    chat_model: String,
    voice_id: Option<String>,
}

impl Orchestrator {
    /// Create an orchestrator with no speaking indicator
    #[must_use]
    pub fn new(
        proxy: Box<dyn ProxyApi>,
        microphone: Box<dyn Microphone>,
        sink: Box<dyn AudioSink>,
        view: Box<dyn View>,
    ) -> Self {
        Self {
            proxy,
            microphone,
            sink,
            view,
            indicator: Box::new(NoIndicator),
            transcript: Transcript::new(),
            capture: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            voice_id: None,
        }
    }

    /// Set the speaking indicator
    #[must_use]
    pub fn with_indicator(mut self, indicator: Box<dyn SpeakingIndicator>) -> Self {
        self.indicator = indicator;
        self
    }

    /// Set the chat model requested from the backend
    #[must_use]
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Request a specific TTS voice
    #[must_use]
    pub fn with_voice(mut self, voice_id: Option<String>) -> Self {
        self.voice_id = voice_id;
        self
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Whether a microphone stream is currently held
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Perform whatever the primary button means in `session`
    pub async fn primary_action(&mut self, session: ConversationSession) -> ConversationSession {
        match session.primary_action() {
            PrimaryAction::StartConversation => self.start_conversation(session).await,
            PrimaryAction::StartRecording => self.start_recording(session),
            PrimaryAction::StopRecording => self.stop_recording(session).await,
            PrimaryAction::None => session,
        }
    }

    /// Switch between voice and text input
    pub fn set_input_mode(
        &mut self,
        session: ConversationSession,
        mode: InputMode,
    ) -> ConversationSession {
        self.render(session.with_input_mode(mode))
    }

    /// `Ready → Connected` once the microphone is granted
    pub async fn start_conversation(&mut self, session: ConversationSession) -> ConversationSession {
        let connected = match session.connect() {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(error = %e, "start ignored");
                return session;
            }
        };

        match self.microphone.request_permission().await {
            Ok(()) => {
                tracing::info!("conversation started");
                self.render(connected)
            }
            Err(e) => {
                tracing::warn!(error = %e, "microphone permission denied");
                self.view
                    .show_error("Microphone permission is required for voice features.");
                self.render(session)
            }
        }
    }

    /// `Connected → Recording`, opening exactly one capture stream
    pub fn start_recording(&mut self, session: ConversationSession) -> ConversationSession {
        let recording = match session.start_recording() {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(error = %e, "recording not started");
                return session;
            }
        };

        // Release any stale stream before opening a new one
        self.capture = None;

        match self.microphone.open() {
            Ok(stream) => {
                self.capture = Some(stream);
                tracing::debug!("recording started");
                self.render(recording)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to open microphone");
                self.view
                    .show_error(&format!("Failed to start speech recognition. {e}"));
                self.render(session)
            }
        }
    }

    /// `Recording → Processing → Connected`, running a full voice turn
    ///
    /// The capture stream is released before any network call is made.
    pub async fn stop_recording(&mut self, session: ConversationSession) -> ConversationSession {
        let processing = match session.stop_recording() {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(error = %e, "stop ignored");
                return session;
            }
        };

        let recorded = self.capture.take().map(CaptureStream::finish);
        self.render(processing);
        self.indicator.start();

        match recorded {
            Some(Ok(audio)) => self.voice_turn(audio).await,
            Some(Err(e)) => {
                tracing::error!(error = %e, "failed to finish recording");
                self.view.show_error(&format!("Failed to record audio: {e}"));
            }
            None => {
                tracing::error!("stop requested without an open capture stream");
                self.view.show_error("No active recording.");
            }
        }

        self.finish_turn(processing)
    }

    /// Run a typed turn: `Connected → Processing → Connected`
    pub async fn submit_text(
        &mut self,
        session: ConversationSession,
        text: &str,
    ) -> ConversationSession {
        let text = normalize_user_text(text);
        if text.is_empty() {
            return session;
        }

        let processing = match session.submit_text() {
            Ok(next) => next,
            Err(e) => {
                tracing::debug!(error = %e, "text submission rejected");
                self.view
                    .show_error("Not connected. Please start the conversation first.");
                return session;
            }
        };

        self.push_turn(ChatTurn::user(text));
        self.render(processing);
        self.indicator.start();

        self.respond().await;

        self.finish_turn(processing)
    }

    /// Any state `→ Ready`: release the microphone, clear the transcript,
    /// and stop the speaking indicator
    pub fn end_conversation(&mut self, session: ConversationSession) -> ConversationSession {
        if self.capture.take().is_some() {
            tracing::debug!("released microphone stream");
        }
        self.transcript.clear();
        self.indicator.stop();
        tracing::info!("conversation ended");
        self.render(session.end())
    }

    /// Transcribe, then respond to the transcript
    async fn voice_turn(&mut self, audio: CapturedAudio) {
        tracing::debug!(bytes = audio.bytes.len(), "sending audio for transcription");

        let text = match self.proxy.transcribe(audio).await {
            Ok(text) => normalize_user_text(&text),
            Err(e) => {
                tracing::error!(error = %e, "transcription failed");
                self.view
                    .show_error(&format!("Failed to transcribe speech: {e}"));
                return;
            }
        };

        if text.is_empty() {
            self.view.show_error("No speech detected. Please try again.");
            return;
        }

        tracing::info!(transcript = %text, "received transcription");
        self.push_turn(ChatTurn::user(text));
        self.respond().await;
    }

    /// Relay the transcript, append the reply, and speak it
    async fn respond(&mut self) {
        let request = ChatCompletionRequest {
            model: self.chat_model.clone(),
            messages: self.transcript.to_messages(),
            stream: false,
        };

        let reply = match self.proxy.chat(&request).await {
            Ok(response) => response
                .first_content()
                .map_or_else(|| FALLBACK_REPLY.to_string(), ToString::to_string),
            Err(e) => {
                tracing::error!(error = %e, "chat relay failed");
                self.view.show_error("Failed to process your message.");
                return;
            }
        };

        self.push_turn(ChatTurn::assistant(reply.clone()));
        self.speak(&reply).await;
    }

    /// Synthesize and play; failures are logged, never shown
    async fn speak(&mut self, text: &str) {
        let audio = match self.proxy.synthesize(text, self.voice_id.as_deref()).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "text-to-speech failed, continuing without audio");
                return;
            }
        };

        self.indicator.start();
        if let Err(e) = self.sink.play(&audio).await {
            tracing::warn!(error = %e, "audio playback failed");
        }
        self.indicator.stop();
    }

    fn push_turn(&mut self, turn: ChatTurn) {
        self.view.render_turn(&turn);
        self.transcript.push(turn);
    }

    fn finish_turn(&mut self, processing: ConversationSession) -> ConversationSession {
        self.indicator.stop();
        match processing.finish_turn() {
            Ok(next) => self.render(next),
            Err(e) => {
                tracing::error!(error = %e, "turn finished in unexpected state");
                processing
            }
        }
    }

    fn render(&mut self, session: ConversationSession) -> ConversationSession {
        self.view.render_state(session);
        session
    }
}
