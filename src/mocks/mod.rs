//! Mock implementations for testing.
//!
//! [`MockTransport`] replays scripted response bodies chunk by chunk, so
//! tests can place chunk boundaries anywhere, including inside a multi-byte
//! character, and inject transport failures or stalls mid-body.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::transport::{
    ByteStream, HttpRequest, HttpTransport, StreamingResponse, TransportError,
};

/// One scripted step of a response body.
#[derive(Debug, Clone)]
pub enum MockChunk {
    /// Deliver these bytes as one chunk.
    Data(Bytes),
    /// Fail the body with this error.
    Error(TransportError),
    /// Wait before the next step.
    Delay(Duration),
    /// Never deliver anything again.
    Hang,
}

/// A scripted streaming response.
#[derive(Debug, Clone)]
pub struct MockStreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body steps, in order.
    pub chunks: Vec<MockChunk>,
}

impl MockStreamResponse {
    /// Creates a 200 response with an empty body.
    pub fn ok() -> Self {
        Self {
            status: 200,
            chunks: Vec::new(),
        }
    }

    /// Creates a 200 response whose body is `body` cut every `chunk_size` bytes.
    ///
    /// Cuts ignore character boundaries.
    pub fn sse(body: &str, chunk_size: usize) -> Self {
        let size = chunk_size.max(1);
        Self {
            status: 200,
            chunks: body
                .as_bytes()
                .chunks(size)
                .map(|c| MockChunk::Data(Bytes::copy_from_slice(c)))
                .collect(),
        }
    }

    /// Creates a 200 response from explicit chunks.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Self {
            status: 200,
            chunks: chunks
                .into_iter()
                .map(|c| MockChunk::Data(Bytes::copy_from_slice(c.as_ref())))
                .collect(),
        }
    }

    /// Creates an error response with a plain-text body.
    pub fn error(status: u16, body: &str) -> Self {
        Self {
            status,
            chunks: vec![MockChunk::Data(Bytes::copy_from_slice(body.as_bytes()))],
        }
    }

    /// Appends a body step.
    pub fn then(mut self, chunk: MockChunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    /// Appends a transport failure.
    pub fn then_error(self, message: &str) -> Self {
        self.then(MockChunk::Error(TransportError::Connection {
            message: message.to_string(),
        }))
    }

    /// Appends a stall that never ends.
    pub fn then_hang(self) -> Self {
        self.then(MockChunk::Hang)
    }

    fn into_stream(self) -> ByteStream {
        let steps: VecDeque<MockChunk> = self.chunks.into();
        Box::pin(futures::stream::unfold(steps, |mut steps| async move {
            loop {
                let Some(step) = steps.pop_front() else {
                    return None;
                };
                match step {
                    MockChunk::Data(bytes) => return Some((Ok(bytes), steps)),
                    MockChunk::Error(e) => return Some((Err(e), steps)),
                    MockChunk::Delay(d) => tokio::time::sleep(d).await,
                    MockChunk::Hang => futures::future::pending::<()>().await,
                }
            }
        }))
    }
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Request headers.
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    /// Parses the body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}

/// Mock HTTP transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockStreamResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    connect_error: Mutex<Option<TransportError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn queue(&self, response: MockStreamResponse) {
        lock(&self.responses).push_back(response);
    }

    /// Makes the next request fail before any response arrives.
    pub fn fail_next_connect(&self, message: &str) {
        *lock(&self.connect_error) = Some(TransportError::Connection {
            message: message.to_string(),
        });
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        lock(&self.requests).push(RecordedRequest {
            path: request.path,
            body: request.body,
            headers: request.headers,
        });

        if let Some(err) = lock(&self.connect_error).take() {
            return Err(err);
        }

        let response = lock(&self.responses)
            .pop_front()
            .ok_or_else(|| TransportError::Connection {
                message: "no mock response queued".to_string(),
            })?;

        Ok(StreamingResponse {
            status: response.status,
            headers: HashMap::new(),
            stream: response.into_stream(),
        })
    }
}
