//! Integration tests for chat turns

use super::*;
use generation_stream::{Message, SessionStatus, StreamError, TurnEnd};
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::Mock;

#[tokio::test]
async fn test_chat_turn_integration_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("Accept", "text/event-stream"))
        .and(header("Content-Type", "application/json"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_json(json!({
            "messages": [{"role": "user", "content": "Say hello"}]
        })))
        .respond_with(event_stream(
            "data: Hel\n\ndata: lo\n\ndata:  there\n\ndata: [DONE]\n\n",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::chat(config_for(&mock_server)));
    let seen = record_snapshots(&session);

    let outcome = assert_ok!(session.start_turn("Say hello").await);

    assert_eq!(outcome.end, TurnEnd::Sentinel);
    assert_eq!(outcome.content(), Some("Hello there"));

    let contents: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.last().unwrap().content.clone())
        .collect();
    assert_eq!(contents, vec!["Hel", "Hello", "Hello there"]);

    assert_eq!(
        session.history(),
        vec![Message::user("Say hello"), Message::assistant("Hello there")]
    );
    assert_eq!(session.status(), SessionStatus::Done);
}

#[tokio::test]
async fn test_chat_history_sent_on_next_turn() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({
            "messages": [{"role": "user", "content": "one"}]
        })))
        .respond_with(event_stream("data: first\ndata: [DONE]\n"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({
            "messages": [
                {"role": "user", "content": "one"},
                {"role": "assistant", "content": "first"},
                {"role": "user", "content": "two"}
            ]
        })))
        .respond_with(event_stream("data: second\ndata: [DONE]\n"))
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::chat(config_for(&mock_server)));

    assert_ok!(session.start_turn("one").await);
    let outcome = assert_ok!(session.start_turn("two").await);

    assert_eq!(outcome.content(), Some("second"));
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn test_chat_crlf_and_missing_sentinel() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(event_stream(
            "event: delta\r\ndata: line one\\n\r\n: ping\r\ndata: line two",
        ))
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::chat(config_for(&mock_server)));
    let outcome = assert_ok!(session.start_turn("go").await);

    assert_eq!(outcome.end, TurnEnd::EndOfStream);
    assert_eq!(outcome.content(), Some("line one\\nline two"));
}

#[tokio::test]
async fn test_chat_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::chat(config_for(&mock_server)));
    let seen = record_snapshots(&session);

    let err = assert_err!(session.start_turn("hi").await);

    match err {
        StreamError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(session.status(), SessionStatus::Errored);
    assert_eq!(session.history(), vec![Message::user("hi")]);
}

#[tokio::test]
async fn test_chat_connection_refused() {
    let config = StreamConfig::builder()
        .base_url("http://127.0.0.1:1")
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let session = assert_ok!(GenerationSession::chat(config));

    let err = assert_err!(session.start_turn("hi").await);

    assert!(matches!(err, StreamError::Transport { .. }));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_chat_cancel_while_waiting_for_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            event_stream("data: too late\ndata: [DONE]\n").set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let session = Arc::new(assert_ok!(GenerationSession::chat(config_for(&mock_server))));
    let seen = record_snapshots(&session);

    let running = {
        let session = session.clone();
        tokio::spawn(async move { session.start_turn("hi").await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(session.cancel());

    let outcome = assert_ok!(tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .unwrap()
        .unwrap());

    assert_eq!(outcome.end, TurnEnd::Cancelled);
    assert!(outcome.reply.is_none());
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(session.status(), SessionStatus::Idle);
}
