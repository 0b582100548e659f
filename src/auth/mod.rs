//! Authentication for generation requests.
//!
//! The backend may or may not require credentials; when it does, a bearer
//! token is attached to every streaming request.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Authentication provider trait.
///
/// Implementations of this trait provide authentication credentials
/// for API requests.
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HashMap<String, String>);
}

/// Bearer token authentication provider.
pub struct ApiKeyAuth {
    api_key: SecretString,
}

impl ApiKeyAuth {
    /// Creates a new API key authentication provider.
    pub fn new(api_key: SecretString) -> Self {
        Self { api_key }
    }

    /// Creates from a string API key.
    pub fn from_string(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
        }
    }

    /// Gets a hint of the API key for debugging (last 4 characters).
    pub fn key_hint(&self) -> String {
        let key = self.api_key.expose_secret();
        match key.char_indices().rev().nth(3) {
            Some((start, _)) if start > 0 => format!("...{}", &key[start..]),
            _ => "****".to_string(),
        }
    }
}

impl AuthProvider for ApiKeyAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key.expose_secret()),
        );
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("api_key", &self.key_hint())
            .finish()
    }
}

/// Provider for backends that need no credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn apply_auth(&self, _headers: &mut HashMap<String, String>) {}
}
