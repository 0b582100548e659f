//! Integration tests for image generation turns

use super::*;
use generation_stream::{GeneratedImage, ImageFormat, Message, TurnEnd, TurnInput};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, method, path};
use wiremock::Mock;

const PNG_STREAM: &str = "event: image\n\
    data: [Conversation_ID]: conv-abc\n\
    data: [Image_URL]: iVBORw0KGgo\n\
    AAAANSUhEUg==\n\
    data: [DONE]\n";

#[tokio::test]
async fn test_image_turn_integration_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image"))
        .and(body_json(json!({"message": "a red square"})))
        .respond_with(event_stream(PNG_STREAM))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::image_generation(config_for(
        &mock_server
    )));
    let seen = record_snapshots(&session);

    let outcome = assert_ok!(session.start_turn("a red square").await);

    assert_eq!(outcome.end, TurnEnd::Sentinel);
    assert_eq!(outcome.conversation_id.as_deref(), Some("conv-abc"));

    let snapshots = seen.lock().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert!(!snapshots[0].streaming);

    let reply = outcome.reply.as_ref().unwrap();
    assert_eq!(reply.content, "iVBORw0KGgoAAAANSUhEUg==");
    let image = assert_ok!(GeneratedImage::from_message(reply));
    assert_eq!(image.format, ImageFormat::Png);
    assert_eq!(&image.bytes[12..16], b"IHDR");
}

#[tokio::test]
async fn test_image_conversation_id_carried_forward() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image"))
        .and(body_json(json!({"message": "first"})))
        .respond_with(event_stream(PNG_STREAM))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/image"))
        .and(body_json(json!({"message": "second", "conversation_id": "conv-abc"})))
        .respond_with(event_stream("data: [Image_URL]: QUJD\ndata: [DONE]\n"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::image_generation(config_for(
        &mock_server
    )));

    assert_ok!(session.start_turn("first").await);
    let outcome = assert_ok!(session.start_turn("second").await);

    assert_eq!(outcome.content(), Some("QUJD"));
}

#[tokio::test]
async fn test_image_explicit_conversation_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image"))
        .and(body_json(json!({"message": "more", "conversation_id": "conv-given"})))
        .respond_with(event_stream("data: [DONE]\n"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::image_generation(config_for(
        &mock_server
    )));
    let outcome = assert_ok!(
        session
            .start_turn(TurnInput::new("more").with_conversation_id("conv-given"))
            .await
    );

    assert_eq!(outcome.end, TurnEnd::Sentinel);
    assert_eq!(outcome.content(), Some(""));
}

#[tokio::test]
async fn test_image_premature_eof_discards_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/image"))
        .respond_with(event_stream(
            "data: [Conversation_ID]: conv-eof\ndata: [Image_URL]: AAAA\nBBBB",
        ))
        .mount(&mock_server)
        .await;

    let session = assert_ok!(GenerationSession::image_generation(config_for(
        &mock_server
    )));
    let seen = record_snapshots(&session);

    let outcome = assert_ok!(session.start_turn("draw").await);

    assert_eq!(outcome.end, TurnEnd::EndOfStream);
    assert!(outcome.reply.is_none());
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(session.history(), vec![Message::user("draw")]);
    assert_eq!(session.conversation_id().as_deref(), Some("conv-eof"));
    assert_eq!(session.metrics().snapshot().replies_discarded, 1);
}
