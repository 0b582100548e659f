//! Streaming ingestion pipeline.
//!
//! Raw body chunks flow through four stages:
//!
//! 1. [`ByteDecoder`] turns bytes into text, holding back split characters.
//! 2. [`LineFramer`] cuts the text into lines, holding back partial lines.
//! 3. [`FrameInterpreter`] classifies each line as data, sentinel or
//!    side-channel, according to the [`StreamMode`].
//! 4. [`SessionAccumulator`] applies frames to the turn state and reports
//!    what the caller should show.
//!
//! [`FramePipeline`] bundles the first three stages; [`FrameStream`] exposes
//! them as a `Stream` over any byte stream.

mod accumulator;
mod decoder;
mod frame;
mod framer;
mod pipeline;

pub use accumulator::{
    AccumulationStrategy, Applied, ChatStrategy, EofOutcome, ImageGenerationStrategy,
    SessionAccumulator, TurnUpdate,
};
pub use decoder::ByteDecoder;
pub use frame::{DataKind, Frame, FrameInterpreter, StreamMode, CONVERSATION_ID_KEY, SENTINEL};
pub use framer::LineFramer;
pub use pipeline::{FramePipeline, FrameStream};
