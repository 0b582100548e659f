//! Turn inputs, request bodies and outcomes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;

/// Body of a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    /// Full history, ending with the new user message.
    pub messages: Vec<Message>,
}

/// Body of an image generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTurnRequest {
    /// Prompt text.
    pub message: String,
    /// Conversation to continue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// What the caller submits for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnInput {
    /// User message text.
    pub message: String,
    /// Conversation id for image turns. Falls back to the session's last id.
    pub conversation_id: Option<String>,
}

impl TurnInput {
    /// Creates an input with no conversation id.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
        }
    }

    /// Sets the conversation id.
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}

impl From<&str> for TurnInput {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for TurnInput {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEnd {
    /// The backend sent `[DONE]`.
    Sentinel,
    /// The body ended without `[DONE]`.
    EndOfStream,
    /// The caller cancelled the turn.
    Cancelled,
}

/// Result of a finished turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Identifier of the turn, also recorded on its tracing span.
    pub turn_id: Uuid,
    /// How the turn ended.
    pub end: TurnEnd,
    /// The assistant message committed to history, if any.
    pub reply: Option<Message>,
    /// Conversation id known after the turn.
    pub conversation_id: Option<String>,
}

impl TurnOutcome {
    /// Returns true if the turn was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.end == TurnEnd::Cancelled
    }

    /// Returns the reply text, if any.
    pub fn content(&self) -> Option<&str> {
        self.reply.as_ref().map(|m| m.content.as_str())
    }
}
