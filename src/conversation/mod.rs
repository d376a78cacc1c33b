//! Conversation state machine
//!
//! A [`ConversationSession`] is a small `Copy` value. Every transition
//! consumes the current value and returns the next one, so callers thread the
//! session through each step explicitly instead of sharing mutable state.
//!
//! ```text
//!            start               primary (voice)          stop
//!   Ready ─────────▶ Connected ─────────────────▶ Recording ─────▶ Processing
//!     ▲                 ▲  │ submit text                               │
//!     │                 │  └──────────────────────────────────────────▶│
//!     │ end (any)       └──────────────────── finish ──────────────────┘
//! ```

mod transcript;

use std::fmt;

use thiserror::Error;

pub use transcript::{ChatTurn, FALLBACK_REPLY, Role, Transcript, normalize_user_text};

/// UI conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConversationState {
    /// No conversation; microphone not yet granted
    #[default]
    Ready,
    /// Conversation started, waiting for input
    Connected,
    /// Capturing microphone audio
    Recording,
    /// A turn is in flight (STT → chat → TTS)
    Processing,
}

impl ConversationState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Connected => "connected",
            Self::Recording => "recording",
            Self::Processing => "processing",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the user supplies input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputMode {
    #[default]
    Voice,
    Text,
}

/// Events the state machine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Connect,
    StartRecording,
    StopRecording,
    SubmitText,
    FinishTurn,
    End,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::StartRecording => "start recording",
            Self::StopRecording => "stop recording",
            Self::SubmitText => "submit text",
            Self::FinishTurn => "finish turn",
            Self::End => "end conversation",
        };
        f.write_str(name)
    }
}

/// An event that is not valid in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {event} while {state} ({mode:?} mode)")]
pub struct TransitionError {
    pub state: ConversationState,
    pub mode: InputMode,
    pub event: Event,
}

/// What the primary button does in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction {
    StartConversation,
    StartRecording,
    StopRecording,
    /// Button disabled, or text mode where input arrives via the text box
    None,
}

/// Rendering of the primary button and status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonView {
    pub label: &'static str,
    pub status: &'static str,
    pub enabled: bool,
    pub visible: bool,
}

/// One UI session: the conversation state plus the active input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversationSession {
    state: ConversationState,
    input_mode: InputMode,
}

impl ConversationSession {
    /// Fresh session: `Ready`, voice mode
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConversationState::Ready,
            input_mode: InputMode::Voice,
        }
    }

    #[must_use]
    pub const fn state(self) -> ConversationState {
        self.state
    }

    #[must_use]
    pub const fn input_mode(self) -> InputMode {
        self.input_mode
    }

    /// Switch between voice and text input
    ///
    /// Allowed in any state; an in-progress recording keeps going and can
    /// still be stopped with the primary action.
    #[must_use]
    pub const fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    /// The primary action, as a pure function of state and input mode
    #[must_use]
    pub const fn primary_action(self) -> PrimaryAction {
        match (self.state, self.input_mode) {
            (ConversationState::Ready, _) => PrimaryAction::StartConversation,
            (ConversationState::Connected, InputMode::Voice) => PrimaryAction::StartRecording,
            (ConversationState::Recording, _) => PrimaryAction::StopRecording,
            (ConversationState::Connected, InputMode::Text) | (ConversationState::Processing, _) => {
                PrimaryAction::None
            }
        }
    }

    /// `Ready → Connected` after the microphone was granted
    ///
    /// # Errors
    ///
    /// Returns error unless the session is `Ready`
    pub const fn connect(self) -> Result<Self, TransitionError> {
        match self.state {
            ConversationState::Ready => Ok(self.into_state(ConversationState::Connected)),
            _ => Err(self.reject(Event::Connect)),
        }
    }

    /// `Connected → Recording`, voice mode only
    ///
    /// # Errors
    ///
    /// Returns error unless the session is `Connected` in voice mode
    pub const fn start_recording(self) -> Result<Self, TransitionError> {
        match (self.state, self.input_mode) {
            (ConversationState::Connected, InputMode::Voice) => {
                Ok(self.into_state(ConversationState::Recording))
            }
            _ => Err(self.reject(Event::StartRecording)),
        }
    }

    /// `Recording → Processing`
    ///
    /// # Errors
    ///
    /// Returns error unless the session is `Recording`
    pub const fn stop_recording(self) -> Result<Self, TransitionError> {
        match self.state {
            ConversationState::Recording => Ok(self.into_state(ConversationState::Processing)),
            _ => Err(self.reject(Event::StopRecording)),
        }
    }

    /// `Connected → Processing` for a typed message
    ///
    /// # Errors
    ///
    /// Returns error unless the session is `Connected`
    pub const fn submit_text(self) -> Result<Self, TransitionError> {
        match self.state {
            ConversationState::Connected => Ok(self.into_state(ConversationState::Processing)),
            _ => Err(self.reject(Event::SubmitText)),
        }
    }

    /// `Processing → Connected` once the turn resolved, successfully or not
    ///
    /// A completion arriving after the conversation was ended finds the
    /// session `Ready` and leaves it there.
    ///
    /// # Errors
    ///
    /// Returns error if the session is `Connected` or `Recording`
    pub const fn finish_turn(self) -> Result<Self, TransitionError> {
        match self.state {
            ConversationState::Processing => Ok(self.into_state(ConversationState::Connected)),
            ConversationState::Ready => Ok(self),
            _ => Err(self.reject(Event::FinishTurn)),
        }
    }

    /// Any state `→ Ready`
    #[must_use]
    pub const fn end(self) -> Self {
        self.into_state(ConversationState::Ready)
    }

    /// Apply an event by value
    ///
    /// # Errors
    ///
    /// Returns error if the event is not valid in the current state
    pub const fn apply(self, event: Event) -> Result<Self, TransitionError> {
        match event {
            Event::Connect => self.connect(),
            Event::StartRecording => self.start_recording(),
            Event::StopRecording => self.stop_recording(),
            Event::SubmitText => self.submit_text(),
            Event::FinishTurn => self.finish_turn(),
            Event::End => Ok(self.end()),
        }
    }

    /// Button label, status line and enablement for the current state
    #[must_use]
    pub const fn button(self) -> ButtonView {
        let voice = matches!(self.input_mode, InputMode::Voice);
        match self.state {
            ConversationState::Ready => ButtonView {
                label: if voice { "Start Conversation" } else { "Connect" },
                status: "Ready to help",
                enabled: true,
                visible: true,
            },
            ConversationState::Connected => ButtonView {
                label: if voice { "Start Speaking" } else { "Connected" },
                status: "Connected - Ready to listen",
                enabled: true,
                visible: voice,
            },
            ConversationState::Recording => ButtonView {
                label: "Stop Speaking",
                status: "Listening...",
                enabled: true,
                visible: true,
            },
            ConversationState::Processing => ButtonView {
                label: "Processing...",
                status: "Processing your message",
                enabled: false,
                visible: true,
            },
        }
    }

    const fn into_state(mut self, state: ConversationState) -> Self {
        self.state = state;
        self
    }

    const fn reject(self, event: Event) -> TransitionError {
        TransitionError {
            state: self.state,
            mode: self.input_mode,
            event,
        }
    }
}
