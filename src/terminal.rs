//! Line-oriented terminal frontend
//!
//! Enter performs the primary action; `/voice` and `/text` switch input
//! modes, `/end` ends the conversation and `/quit` exits. In text mode any
//! other line is sent as a message.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::Result;
use crate::conversation::{ChatTurn, ConversationSession, ConversationState, InputMode, Role};
use crate::session::{Orchestrator, View};

/// A parsed line of terminal input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Primary,
    Mode(InputMode),
    End,
    Quit,
    Message(String),
    Unknown(String),
}

impl Command {
    /// Parse one input line
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Primary,
            "/voice" => Self::Mode(InputMode::Voice),
            "/text" => Self::Mode(InputMode::Text),
            "/end" => Self::End,
            "/quit" | "/exit" => Self::Quit,
            cmd if cmd.starts_with('/') => Self::Unknown(cmd.to_string()),
            text => Self::Message(text.to_string()),
        }
    }
}

/// Renders the conversation to stdout and errors to stderr
#[derive(Debug, Default)]
pub struct TerminalView;

impl View for TerminalView {
    fn render_state(&mut self, session: ConversationSession) {
        let button = session.button();
        let hint = match (session.input_mode(), button.visible && button.enabled) {
            (InputMode::Text, _) if session.state() == ConversationState::Connected => {
                " (type a message)".to_string()
            }
            (_, true) => format!(" (Enter: {})", button.label),
            (_, false) => String::new(),
        };
        println!("[{}]{hint}", button.status);
        let _ = std::io::stdout().flush();
    }

    fn render_turn(&mut self, turn: &ChatTurn) {
        let who = match turn.role {
            Role::User => "you",
            Role::Assistant => "otter",
        };
        println!("{who}: {}", turn.content);
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("error: {message}");
    }
}

/// Drive `orchestrator` from stdin until `/quit` or end of input
///
/// # Errors
///
/// Returns error if stdin cannot be read
pub async fn run_chat(mut orchestrator: Orchestrator, mode: InputMode) -> Result<()> {
    let mut session = ConversationSession::new().with_input_mode(mode);
    TerminalView.render_state(session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        session = match Command::parse(&line) {
            Command::Primary => orchestrator.primary_action(session).await,
            Command::Mode(mode) => orchestrator.set_input_mode(session, mode),
            Command::End => orchestrator.end_conversation(session),
            Command::Quit => break,
            Command::Message(text) if session.input_mode() == InputMode::Text => {
                orchestrator.submit_text(session, &text).await
            }
            Command::Message(_) => {
                eprintln!("voice mode: press Enter to record, or /text to type");
                session
            }
            Command::Unknown(cmd) => {
                eprintln!("unknown command {cmd}; try /voice, /text, /end or /quit");
                session
            }
        };
    }

    orchestrator.end_conversation(session);
    Ok(())
}
