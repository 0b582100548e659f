//! Integration tests using WireMock
//!
//! These tests run full turns against a mock HTTP server: request encoding,
//! authentication, response framing and error handling.

mod chat;
mod image;

use generation_stream::{GenerationSession, Snapshot, StreamConfig};
use std::sync::{Arc, Mutex};
use wiremock::{MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-api-key";

/// Builds a config pointing at the mock server.
pub fn config_for(server: &MockServer) -> StreamConfig {
    StreamConfig::builder()
        .base_url(server.uri())
        .api_key(TEST_TOKEN)
        .build()
        .expect("valid config")
}

/// Helper to create an event-stream response template.
pub fn event_stream(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

/// Collects every snapshot the session emits.
pub fn record_snapshots(session: &GenerationSession) -> Arc<Mutex<Vec<Snapshot>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    session.on_snapshot(move |snapshot| sink.lock().unwrap().push(snapshot.clone()));
    seen
}
