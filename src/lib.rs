//! Streaming response ingestion for generation backends.
//!
//! Consumes a chunked `text/event-stream`-style HTTP response from a chat
//! completion or image generation endpoint, rebuilds lines across arbitrary
//! chunk boundaries, interprets the in-band control tokens and exposes
//! incrementally updated, render-ready conversation state.
//!
//! # Features
//!
//! - **Chunk-safe decoding**: multi-byte characters split across chunks are
//!   reassembled, never replaced
//! - **Two grammars**: incremental chat text, and tagged base64 image
//!   payloads with a conversation id side channel
//! - **Snapshots**: listeners see the conversation after every chat delta,
//!   or once when an image completes
//! - **Cancellation**: an in-flight turn can be abandoned at any time
//! - **Observability**: `tracing` spans per turn and atomic counters
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use generation_stream::{GenerationSession, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StreamConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .build()?;
//!     let session = GenerationSession::chat(config)?;
//!
//!     session.on_snapshot(|snapshot| {
//!         if let Some(last) = snapshot.last() {
//!             print!("\r{}", last.content);
//!         }
//!     });
//!
//!     let outcome = session.start_turn("Hello!").await?;
//!     println!("\n{:?}", outcome.end);
//!     Ok(())
//! }
//! ```
//!
//! # Image Generation
//!
//! ```rust,no_run
//! use generation_stream::{GeneratedImage, GenerationSession, StreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = GenerationSession::image_generation(StreamConfig::from_env()?)?;
//!
//!     let outcome = session.start_turn("a lighthouse at dusk").await?;
//!     if let Some(reply) = &outcome.reply {
//!         let image = GeneratedImage::from_message(reply)?;
//!         println!("{} bytes, {:?}", image.bytes.len(), image.format);
//!     }
//!
//!     // The conversation id from the first turn is sent automatically.
//!     session.start_turn("now at dawn").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Frames Without a Session
//!
//! ```rust
//! use bytes::Bytes;
//! use futures::StreamExt;
//! use generation_stream::streaming::{Frame, FrameStream, StreamMode};
//! use generation_stream::transport::TransportError;
//!
//! # tokio_test::block_on(async {
//! let body = futures::stream::iter(vec![
//!     Ok::<_, TransportError>(Bytes::from_static(b"data: Hel")),
//!     Ok(Bytes::from_static(b"lo\ndata: [DONE]\n")),
//! ]);
//!
//! let frames: Vec<_> = FrameStream::new(body, StreamMode::Chat).collect().await;
//! assert_eq!(frames.len(), 2);
//! assert_eq!(frames[0].as_ref().ok().and_then(Frame::payload), Some("Hello"));
//! # });
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod observability;
pub mod session;
pub mod streaming;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod fixtures;

pub use auth::{ApiKeyAuth, AuthProvider, NoAuth};
pub use config::{StreamConfig, StreamConfigBuilder};
pub use errors::{StreamError, StreamResult};
pub use observability::{LoggingConfig, MetricsSnapshot, StreamMetrics};
pub use session::{GenerationSession, GenerationSessionBuilder, SessionStatus, SnapshotCallback};
pub use streaming::{FramePipeline, FrameStream, StreamMode};
pub use transport::{HttpTransport, HttpTransportImpl, TransportError};
pub use types::{
    GeneratedImage, ImageFormat, Message, Role, Snapshot, TurnEnd, TurnInput, TurnOutcome,
};
