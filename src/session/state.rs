//! Per-turn stream state.

use std::collections::HashMap;

/// Lifecycle of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No turn has started, or the last one was cancelled.
    #[default]
    Idle,
    /// Bytes are being received.
    Open,
    /// The turn finished, by sentinel or end of stream.
    Done,
    /// The turn failed.
    Errored,
}

impl SessionStatus {
    /// Returns true if no more content will be accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Done | SessionStatus::Errored)
    }
}

/// Accumulated state of one turn.
#[derive(Debug, Default)]
pub struct StreamSession {
    assistant_reply: String,
    side_channel: HashMap<String, String>,
    status: SessionStatus,
}

impl StreamSession {
    /// Creates an idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The reply accumulated so far.
    pub fn assistant_reply(&self) -> &str {
        &self.assistant_reply
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Looks up a side-channel value.
    pub fn side_channel(&self, key: &str) -> Option<&str> {
        self.side_channel.get(key).map(String::as_str)
    }

    /// All side-channel values seen so far.
    pub fn side_channels(&self) -> &HashMap<String, String> {
        &self.side_channel
    }

    /// Appends content to the reply.
    pub(crate) fn append(&mut self, text: &str) {
        self.assistant_reply.push_str(text);
    }

    /// Records a side-channel value. Returns false if the key was already set.
    pub(crate) fn set_side_channel(&mut self, key: &str, value: &str) -> bool {
        if let Some(existing) = self.side_channel.get(key) {
            tracing::debug!(key, existing = %existing, ignored = value, "Side-channel key already set");
            return false;
        }
        self.side_channel.insert(key.to_string(), value.to_string());
        true
    }

    pub(crate) fn mark_open(&mut self) {
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Open;
        }
    }

    /// Enters `Done`. Returns false if the session was already terminal.
    pub(crate) fn mark_done(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SessionStatus::Done;
        true
    }

    /// Drops the accumulated reply and returns what was discarded.
    pub(crate) fn discard_reply(&mut self) -> String {
        std::mem::take(&mut self.assistant_reply)
    }
}
