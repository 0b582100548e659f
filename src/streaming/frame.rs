//! Line classification.
//!
//! Each framed line yields at most one [`Frame`]. The grammar depends on the
//! endpoint being read:
//!
//! - **Chat**: only `data:` lines count. The payload is everything after
//!   `data: ` (or `data:` when no space follows), untrimmed. `[DONE]` ends
//!   the turn; every other payload, including the empty one, is text.
//! - **Image generation**: lines are trimmed. `data:` payloads carry either
//!   `[DONE]`, a `[Conversation_ID]:` tag or an `[Image_URL]:` tag with a
//!   base64 fragment. `event:`, `retry:` and `message:` lines are skipped.
//!   Any other non-empty line is a bare continuation of the base64 payload.

use serde::{Deserialize, Serialize};

/// Payload that marks the intentional end of a turn.
pub const SENTINEL: &str = "[DONE]";

/// Side-channel key under which the conversation identifier is stored.
pub const CONVERSATION_ID_KEY: &str = "conversation_id";

const DATA_PREFIX: &str = "data:";
const CONVERSATION_ID_TAG: &str = "[Conversation_ID]:";
const IMAGE_FRAGMENT_TAG: &str = "[Image_URL]:";
const METADATA_PREFIXES: [&str; 3] = ["event:", "retry:", "message:"];

/// Which endpoint grammar to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Incremental chat completion text.
    Chat,
    /// Tagged base64 image payload.
    ImageGeneration,
}

/// Where a data payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Chat `data:` payload.
    Text,
    /// Tagged image fragment.
    ImageFragment,
    /// Untagged line continuing the image payload.
    Continuation,
}

/// One interpreted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Content to append to the reply.
    Data {
        /// Raw payload text.
        payload: String,
        /// Which grammar branch produced it.
        kind: DataKind,
    },
    /// End of turn.
    Sentinel,
    /// Out-of-band value carried alongside the content.
    SideChannel {
        /// Side-channel key.
        key: String,
        /// Side-channel value.
        value: String,
    },
}

impl Frame {
    /// Creates a chat text frame.
    pub fn text(payload: impl Into<String>) -> Self {
        Frame::Data {
            payload: payload.into(),
            kind: DataKind::Text,
        }
    }

    /// Returns the data payload, if this is a data frame.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Frame::Data { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Returns true for the end-of-turn sentinel.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Frame::Sentinel)
    }
}

/// Classifies lines according to a [`StreamMode`].
#[derive(Debug, Clone, Copy)]
pub struct FrameInterpreter {
    mode: StreamMode,
}

impl FrameInterpreter {
    /// Creates an interpreter for the given mode.
    pub fn new(mode: StreamMode) -> Self {
        Self { mode }
    }

    /// Returns the mode.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Interprets one line. `None` means the line carries nothing.
    pub fn interpret(&self, line: &str) -> Option<Frame> {
        let frame = match self.mode {
            StreamMode::Chat => interpret_chat(line),
            StreamMode::ImageGeneration => interpret_image(line),
        };

        if frame.is_none() && !line.is_empty() {
            tracing::trace!(mode = ?self.mode, line, "Ignoring line");
        }

        frame
    }

    /// Interprets one line as a sequence of frames.
    pub fn frames(&self, line: &str) -> impl Iterator<Item = Frame> {
        self.interpret(line).into_iter()
    }
}

fn interpret_chat(line: &str) -> Option<Frame> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    if payload == SENTINEL {
        Some(Frame::Sentinel)
    } else {
        Some(Frame::text(payload))
    }
}

fn interpret_image(line: &str) -> Option<Frame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
        return interpret_image_payload(rest.trim());
    }

    if METADATA_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
        return None;
    }

    Some(Frame::Data {
        payload: line.to_string(),
        kind: DataKind::Continuation,
    })
}

fn interpret_image_payload(payload: &str) -> Option<Frame> {
    if payload == SENTINEL {
        return Some(Frame::Sentinel);
    }

    if let Some(value) = payload.strip_prefix(CONVERSATION_ID_TAG) {
        return Some(Frame::SideChannel {
            key: CONVERSATION_ID_KEY.to_string(),
            value: value.trim().to_string(),
        });
    }

    if let Some(fragment) = payload.strip_prefix(IMAGE_FRAGMENT_TAG) {
        return Some(Frame::Data {
            payload: fragment.trim().to_string(),
            kind: DataKind::ImageFragment,
        });
    }

    None
}
