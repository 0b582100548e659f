//! Wire payloads shared by unit tests.

/// Chat reply "Hello world" in three data frames.
pub const CHAT_HELLO: &str = "data: Hello\ndata:  world\ndata: [DONE]\n";

/// Chat stream with SSE noise around the data frames.
pub const CHAT_WITH_NOISE: &str =
    "event: message\r\nid: 1\r\ndata: Hi\r\n\r\n: keep-alive\r\nretry: 1000\r\ndata: [DONE]\r\n";

/// Chat stream cut off before the sentinel.
pub const CHAT_NO_SENTINEL: &str = "data: partial\ndata:  answer";

/// Chat stream that keeps sending after the sentinel.
pub const CHAT_AFTER_SENTINEL: &str = "data: A\ndata: [DONE]\ndata: B\n";

/// Image stream carrying a conversation id and a two-line payload.
pub const IMAGE_WITH_CONVERSATION: &str = "event: image\n\
    data: [Conversation_ID]: conv-123\n\
    data: [Image_URL]: iVBORw0KGgo\n\
    AAAANSUhEUg==\n\
    data: [DONE]\n";

/// Image stream cut off before the sentinel.
pub const IMAGE_NO_SENTINEL: &str = "data: [Conversation_ID]: conv-9\ndata: [Image_URL]: AAAA\nBBBB";

/// Payload assembled from [`IMAGE_WITH_CONVERSATION`].
pub const IMAGE_PAYLOAD: &str = "iVBORw0KGgoAAAANSUhEUg==";
