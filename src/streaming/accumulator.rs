//! Turning frames into caller-visible updates.
//!
//! The [`SessionAccumulator`] owns the [`StreamSession`] of one turn and
//! applies frames to it in arrival order. What each frame means for the
//! caller depends on the endpoint, so that part is delegated to an
//! [`AccumulationStrategy`]:
//!
//! | | Chat | Image generation |
//! |---|---|---|
//! | data | append, emit partial | append silently |
//! | `[DONE]` | stop | stop, emit final message |
//! | EOF without `[DONE]` | keep the last partial | discard the reply |

use std::fmt;

use super::frame::{Frame, StreamMode};
use crate::session::{SessionStatus, StreamSession};
use crate::types::Message;

/// Change the caller should apply to its view of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// Replace the in-flight assistant message.
    Partial(Message),
    /// Append a finished assistant message.
    Final(Message),
    /// First value seen for a side-channel key.
    SideChannel {
        /// Side-channel key.
        key: String,
        /// Side-channel value.
        value: String,
    },
}

/// Result of applying one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Updates to hand to the caller, in order.
    pub updates: Vec<TurnUpdate>,
    /// The turn is over; remaining frames must not be applied.
    pub stop: bool,
}

impl Applied {
    fn from_update(update: Option<TurnUpdate>) -> Self {
        Self {
            updates: update.into_iter().collect(),
            stop: false,
        }
    }
}

/// How a body that ended without `[DONE]` was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofOutcome {
    /// The sentinel had already ended the turn.
    AlreadyDone,
    /// The reply received so far stands as the answer.
    ImplicitSuccess,
    /// The reply was dropped and nothing is shown.
    Discarded,
}

/// Per-endpoint interpretation of frames.
pub trait AccumulationStrategy: Send + Sync + fmt::Debug {
    /// The mode this strategy handles.
    fn mode(&self) -> StreamMode;

    /// Called after a data payload was appended to the reply.
    fn on_data(&self, session: &StreamSession) -> Option<TurnUpdate>;

    /// Called once the sentinel moved the session to `Done`.
    fn on_sentinel(&self, session: &StreamSession) -> Option<TurnUpdate>;

    /// Called when the body ended before any sentinel. The session is
    /// already `Done`.
    fn on_eof(&self, session: &mut StreamSession) -> EofOutcome;

    /// Whether newly seen side-channel values are reported to the caller.
    fn surfaces_side_channel(&self) -> bool {
        true
    }
}

/// Chat completion: every data frame produces a fresh partial snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChatStrategy;

impl AccumulationStrategy for ChatStrategy {
    fn mode(&self) -> StreamMode {
        StreamMode::Chat
    }

    fn on_data(&self, session: &StreamSession) -> Option<TurnUpdate> {
        Some(TurnUpdate::Partial(Message::assistant(
            session.assistant_reply(),
        )))
    }

    fn on_sentinel(&self, _session: &StreamSession) -> Option<TurnUpdate> {
        None
    }

    fn on_eof(&self, session: &mut StreamSession) -> EofOutcome {
        tracing::debug!(
            reply_len = session.assistant_reply().len(),
            "Chat stream ended without sentinel; keeping reply"
        );
        EofOutcome::ImplicitSuccess
    }
}

/// Image generation: the payload is only shown once it is complete.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageGenerationStrategy;

impl AccumulationStrategy for ImageGenerationStrategy {
    fn mode(&self) -> StreamMode {
        StreamMode::ImageGeneration
    }

    fn on_data(&self, _session: &StreamSession) -> Option<TurnUpdate> {
        None
    }

    fn on_sentinel(&self, session: &StreamSession) -> Option<TurnUpdate> {
        Some(TurnUpdate::Final(Message::assistant(
            session.assistant_reply(),
        )))
    }

    fn on_eof(&self, session: &mut StreamSession) -> EofOutcome {
        let discarded = session.discard_reply();
        tracing::warn!(
            discarded_len = discarded.len(),
            "Image stream ended without sentinel; discarding payload"
        );
        EofOutcome::Discarded
    }
}

/// Applies frames to the state of one turn.
#[derive(Debug)]
pub struct SessionAccumulator {
    session: StreamSession,
    strategy: Box<dyn AccumulationStrategy>,
}

impl SessionAccumulator {
    /// Creates an accumulator with a custom strategy.
    pub fn new(strategy: Box<dyn AccumulationStrategy>) -> Self {
        Self {
            session: StreamSession::new(),
            strategy,
        }
    }

    /// Creates a chat accumulator.
    pub fn chat() -> Self {
        Self::new(Box::new(ChatStrategy))
    }

    /// Creates an image generation accumulator.
    pub fn image_generation() -> Self {
        Self::new(Box::new(ImageGenerationStrategy))
    }

    /// Creates the accumulator matching a mode.
    pub fn for_mode(mode: StreamMode) -> Self {
        match mode {
            StreamMode::Chat => Self::chat(),
            StreamMode::ImageGeneration => Self::image_generation(),
        }
    }

    /// Returns the mode of the strategy in use.
    pub fn mode(&self) -> StreamMode {
        self.strategy.mode()
    }

    /// The state accumulated so far.
    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    /// Marks the turn as receiving.
    pub fn mark_open(&mut self) {
        self.session.mark_open();
    }

    /// Applies one frame.
    ///
    /// Frames arriving after the turn is `Done` are ignored.
    pub fn apply(&mut self, frame: Frame) -> Applied {
        if self.session.status().is_terminal() {
            tracing::trace!(?frame, "Ignoring frame after turn end");
            return Applied {
                updates: Vec::new(),
                stop: true,
            };
        }

        self.session.mark_open();

        match frame {
            Frame::Data { payload, .. } => {
                self.session.append(&payload);
                Applied::from_update(self.strategy.on_data(&self.session))
            }
            Frame::Sentinel => {
                self.session.mark_done();
                Applied {
                    updates: self
                        .strategy
                        .on_sentinel(&self.session)
                        .into_iter()
                        .collect(),
                    stop: true,
                }
            }
            Frame::SideChannel { key, value } => {
                let fresh = self.session.set_side_channel(&key, &value);
                if fresh && self.strategy.surfaces_side_channel() {
                    Applied::from_update(Some(TurnUpdate::SideChannel { key, value }))
                } else {
                    Applied::default()
                }
            }
        }
    }

    /// Handles the end of the body.
    pub fn finish_eof(&mut self) -> EofOutcome {
        if self.session.status() == SessionStatus::Done {
            return EofOutcome::AlreadyDone;
        }

        self.session.mark_done();
        self.strategy.on_eof(&mut self.session)
    }
}
