//! Error types for the streaming ingestion core.
//!
//! Only failures that end a turn are represented here. Unrecognised lines,
//! invalid byte sequences and a missing `[DONE]` sentinel are handled inside
//! the read loop and never surface as errors.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Error type for streaming operations.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Configuration error (missing base URL, invalid path, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// The request could not be sent or the response body could not be read.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// The backend answered with a non-success status.
    #[error("HTTP error (status {status}): {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, if it could be read.
        body: String,
    },

    /// No chunk arrived within the configured read timeout.
    #[error("No data received for {timeout:?}")]
    ReadTimeout {
        /// Configured per-chunk timeout.
        timeout: Duration,
    },

    /// A turn is already streaming on this session.
    #[error("A turn is already in progress")]
    TurnInProgress,

    /// Bytes were fed to a decoder that already flushed its final chunk.
    #[error("Decoder already finished; no further bytes accepted")]
    DecoderFinished,

    /// The request body could not be encoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// An assembled image payload is not valid base64.
    #[error("Image decode error: {message}")]
    ImageDecode {
        /// Error message.
        message: String,
    },
}

impl StreamError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        StreamError::Configuration {
            message: message.into(),
        }
    }

    /// Wraps a transport failure.
    pub fn transport(source: TransportError) -> Self {
        StreamError::Transport {
            message: source.to_string(),
            source,
        }
    }

    /// Returns true if the error came from the network or the backend
    /// rather than from local misuse.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StreamError::Transport { .. } | StreamError::Http { .. } | StreamError::ReadTimeout { .. }
        )
    }

    /// Returns the HTTP status code, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StreamError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for StreamError {
    fn from(err: TransportError) -> Self {
        StreamError::transport(err)
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for StreamError {
    fn from(err: url::ParseError) -> Self {
        StreamError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}
