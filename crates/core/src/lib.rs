//! Tutoring orchestration core.
//!
//! Turns a student's latest response into a pedagogical decision
//! ([`decision::decide`]), a typed instruction for one downstream generation
//! agent, and the resolved natural-language prompt for that agent
//! ([`registry::Registry::build_instruction_prompt`]). Prompt text is
//! assembled from composable templates and builders; agent replies are
//! checked against the dual-channel formatting contract
//! ([`format::validate_formatting`]) before being surfaced.

pub mod agents;
pub mod assessment;
pub mod builder;
pub mod decision;
pub mod error;
pub mod format;
pub mod instruction;
pub mod llm_client;
pub mod registry;
pub mod response;
pub mod session;
pub mod template;
pub mod topic;

use crate::response::{AgentResponse, Speech};

/// Represents commands that the core logic issues to an external runtime.
///
/// This enum decouples decision-making from the runtime's execution of side
/// effects (speaking text, rendering display content, finalizing a session).
#[derive(Debug, Clone)]
pub enum Command {
    /// Speak the given text to the student, with its emotion tag.
    Speak(Speech),
    /// Render the given content in the display channel.
    Show(String),
    /// The session is complete, with a final message.
    SessionComplete(String),
}

/// Maps a validated agent response onto runtime commands, in the order the
/// runtime should execute them.
pub fn commands_for(response: &AgentResponse, session_complete: bool) -> Vec<Command> {
    let mut commands = vec![Command::Speak(response.speech.clone())];
    if let Some(content) = &response.display.content {
        if !content.trim().is_empty() {
            commands.push(Command::Show(content.clone()));
        }
    }
    if session_complete {
        commands.push(Command::SessionComplete(response.speech.text.clone()));
    }
    commands
}
