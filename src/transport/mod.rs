//! HTTP transport layer.
//!
//! Issues the streaming `POST` for a turn and hands back the response body
//! as a stream of raw byte chunks, exactly as the network delivered them.

mod http;

pub use http::{HttpRequest, HttpTransport, HttpTransportImpl};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

/// Boxed stream of raw body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Streaming HTTP response.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Byte stream.
    pub stream: ByteStream,
}

impl StreamingResponse {
    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drains the body into a string, keeping at most `limit` bytes.
    ///
    /// Used for error responses, where the body is diagnostic text rather
    /// than an event stream.
    pub async fn text_lossy(mut self, limit: usize) -> String {
        let mut body = Vec::new();
        while let Some(chunk) = self.stream.next().await {
            match chunk {
                Ok(bytes) => {
                    let room = limit.saturating_sub(body.len());
                    body.extend_from_slice(&bytes[..bytes.len().min(room)]);
                    if body.len() >= limit {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&body).into_owned()
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Transport error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// The request was sent but the response (or its body) was unusable.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}
