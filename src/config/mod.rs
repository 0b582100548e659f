//! Configuration module.
//!
//! Provides configuration for the generation endpoint: base URL, endpoint
//! paths, optional credentials and timeouts.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use crate::errors::{StreamError, StreamResult};

/// Default path of the chat completion endpoint.
pub const DEFAULT_CHAT_PATH: &str = "/chat";

/// Default path of the image generation endpoint.
pub const DEFAULT_IMAGE_PATH: &str = "/image";

/// Default connection timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of bytes of an error body kept for diagnostics.
pub const DEFAULT_ERROR_BODY_LIMIT: usize = 4096;

/// Configuration for a generation session.
#[derive(Clone)]
pub struct StreamConfig {
    /// Base URL for API requests.
    pub base_url: String,
    /// API key sent as a bearer token, if the backend requires one.
    pub(crate) api_key: Option<SecretString>,
    /// Path of the chat endpoint.
    pub chat_path: String,
    /// Path of the image generation endpoint.
    pub image_path: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Maximum wait for the next body chunk. `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
    /// Custom headers to include in requests.
    pub custom_headers: Vec<(String, String)>,
    /// Maximum bytes of an error response body to keep.
    pub error_body_limit: usize,
}

impl StreamConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GENSTREAM_BASE_URL` (required): backend base URL
    /// - `GENSTREAM_API_KEY` (optional): bearer token
    /// - `GENSTREAM_CHAT_PATH` (optional): chat endpoint path
    /// - `GENSTREAM_IMAGE_PATH` (optional): image endpoint path
    /// - `GENSTREAM_TIMEOUT` (optional): connect timeout in seconds
    /// - `GENSTREAM_READ_TIMEOUT` (optional): per-chunk read timeout in seconds
    pub fn from_env() -> StreamResult<Self> {
        let base_url = std::env::var("GENSTREAM_BASE_URL").map_err(|_| {
            StreamError::configuration("GENSTREAM_BASE_URL environment variable not set")
        })?;

        let mut builder = StreamConfigBuilder::new().base_url(base_url);

        if let Ok(api_key) = std::env::var("GENSTREAM_API_KEY") {
            builder = builder.api_key(api_key);
        }

        if let Ok(path) = std::env::var("GENSTREAM_CHAT_PATH") {
            builder = builder.chat_path(path);
        }

        if let Ok(path) = std::env::var("GENSTREAM_IMAGE_PATH") {
            builder = builder.image_path(path);
        }

        if let Ok(timeout_str) = std::env::var("GENSTREAM_TIMEOUT") {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.connect_timeout(Duration::from_secs(timeout_secs));
            }
        }

        if let Ok(timeout_str) = std::env::var("GENSTREAM_READ_TIMEOUT") {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.read_timeout(Duration::from_secs(timeout_secs));
            }
        }

        builder.build()
    }

    /// Returns the API key (exposing the secret).
    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|k| k.expose_secret().as_str())
    }

    /// Returns true if a bearer token is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("chat_path", &self.chat_path)
            .field("image_path", &self.image_path)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// Builder for `StreamConfig`.
#[derive(Default)]
pub struct StreamConfigBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    chat_path: Option<String>,
    image_path: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    custom_headers: Vec<(String, String)>,
    error_body_limit: Option<usize>,
}

impl StreamConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the chat endpoint path.
    pub fn chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = Some(path.into());
        self
    }

    /// Sets the image generation endpoint path.
    pub fn image_path(mut self, path: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the per-chunk read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Adds a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Sets how many bytes of an error body are kept.
    pub fn error_body_limit(mut self, limit: usize) -> Self {
        self.error_body_limit = Some(limit);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> StreamResult<StreamConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| StreamError::configuration("Base URL is required"))?
            .trim_end_matches('/')
            .to_string();

        let parsed = Url::parse(&base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StreamError::configuration(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let api_key = match self.api_key {
            Some(key) if key.is_empty() => {
                return Err(StreamError::configuration("API key cannot be empty"));
            }
            Some(key) => Some(SecretString::new(key)),
            None => None,
        };

        if self.read_timeout == Some(Duration::ZERO) {
            return Err(StreamError::configuration(
                "Read timeout must be greater than 0",
            ));
        }

        Ok(StreamConfig {
            base_url,
            api_key,
            chat_path: self
                .chat_path
                .unwrap_or_else(|| DEFAULT_CHAT_PATH.to_string()),
            image_path: self
                .image_path
                .unwrap_or_else(|| DEFAULT_IMAGE_PATH.to_string()),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: self.read_timeout,
            custom_headers: self.custom_headers,
            error_body_limit: self.error_body_limit.unwrap_or(DEFAULT_ERROR_BODY_LIMIT),
        })
    }
}
