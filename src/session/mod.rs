//! Caller-facing generation session.
//!
//! A [`GenerationSession`] owns the conversation history for one endpoint
//! and runs one streamed turn at a time. Each call to
//! [`GenerationSession::start_turn`] sends the request, reads the body
//! through the frame pipeline and reports progress to the registered
//! snapshot listeners.

mod state;

pub use state::{SessionStatus, StreamSession};

use bytes::Bytes;
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::{ApiKeyAuth, AuthProvider, NoAuth};
use crate::config::StreamConfig;
use crate::errors::{StreamError, StreamResult};
use crate::observability::StreamMetrics;
use crate::streaming::{
    EofOutcome, Frame, FramePipeline, SessionAccumulator, StreamMode, TurnUpdate,
    CONVERSATION_ID_KEY,
};
use crate::transport::{ByteStream, HttpRequest, HttpTransport, HttpTransportImpl};
use crate::types::{
    ChatTurnRequest, ImageTurnRequest, Message, Snapshot, TurnEnd, TurnInput, TurnOutcome,
};

/// Listener invoked with every snapshot.
pub type SnapshotCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct ActiveTurn {
    id: Uuid,
    token: CancellationToken,
}

#[derive(Default)]
struct SessionState {
    history: Vec<Message>,
    /// In-flight chat reply, shown but not yet committed.
    pending: Option<Message>,
    conversation_id: Option<String>,
    status: SessionStatus,
    active: Option<ActiveTurn>,
}

impl SessionState {
    fn snapshot(&self, streaming: bool) -> Snapshot {
        Snapshot {
            messages: self
                .history
                .iter()
                .chain(self.pending.as_ref())
                .cloned()
                .collect(),
            streaming,
        }
    }

    fn is_active(&self, turn_id: Uuid) -> bool {
        self.active.as_ref().map(|a| a.id) == Some(turn_id)
    }
}

/// Releases the session if a turn future is dropped before it finishes.
struct TurnGuard<'a> {
    session: &'a GenerationSession,
    turn_id: Uuid,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.session.lock_state();
        if !state.is_active(self.turn_id) {
            return;
        }

        if let Some(active) = state.active.take() {
            active.token.cancel();
        }
        state.pending = None;
        state.status = SessionStatus::Idle;
        self.session.metrics.record_turn_cancelled();
        tracing::debug!(turn_id = %self.turn_id, "Turn abandoned before completion");
    }
}

struct TurnRun {
    end: TurnEnd,
    reply: Option<Message>,
}

impl TurnRun {
    fn cancelled() -> Self {
        Self {
            end: TurnEnd::Cancelled,
            reply: None,
        }
    }
}

enum FrameFlow {
    Continue,
    Stop,
    Cancelled,
}

/// Conversation with a streaming generation endpoint.
///
/// # Example
///
/// ```rust,no_run
/// use generation_stream::{GenerationSession, StreamConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = StreamConfig::builder()
///         .base_url("http://localhost:8000")
///         .build()?;
///     let session = GenerationSession::chat(config)?;
///
///     session.on_snapshot(|snapshot| {
///         if let Some(last) = snapshot.last() {
///             println!("{}", last.content);
///         }
///     });
///
///     let outcome = session.start_turn("Tell me a joke").await?;
///     println!("ended with {:?}", outcome.end);
///     Ok(())
/// }
/// ```
pub struct GenerationSession {
    mode: StreamMode,
    config: StreamConfig,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    state: Mutex<SessionState>,
    listeners: RwLock<Vec<SnapshotCallback>>,
    metrics: Arc<StreamMetrics>,
}

impl GenerationSession {
    /// Creates a new session builder.
    pub fn builder(mode: StreamMode) -> GenerationSessionBuilder {
        GenerationSessionBuilder::new(mode)
    }

    /// Creates a chat session over HTTP.
    pub fn chat(config: StreamConfig) -> StreamResult<Self> {
        Self::builder(StreamMode::Chat).config(config).build()
    }

    /// Creates an image generation session over HTTP.
    pub fn image_generation(config: StreamConfig) -> StreamResult<Self> {
        Self::builder(StreamMode::ImageGeneration)
            .config(config)
            .build()
    }

    /// Creates a session from environment variables.
    ///
    /// See [`StreamConfig::from_env`].
    pub fn from_env(mode: StreamMode) -> StreamResult<Self> {
        Self::builder(mode).config(StreamConfig::from_env()?).build()
    }

    /// Returns the mode.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<StreamMetrics> {
        &self.metrics
    }

    /// Registers a snapshot listener.
    ///
    /// Listeners run on the task driving the turn, in registration order.
    pub fn on_snapshot<F>(&self, callback: F)
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::new(callback));
    }

    /// Committed history.
    pub fn history(&self) -> Vec<Message> {
        self.lock_state().history.clone()
    }

    /// Status of the current or last turn.
    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    /// Last conversation id received or supplied.
    pub fn conversation_id(&self) -> Option<String> {
        self.lock_state().conversation_id.clone()
    }

    /// Returns true while a turn is in flight.
    pub fn is_busy(&self) -> bool {
        self.lock_state().active.is_some()
    }

    /// Cancels the in-flight turn. Returns false if there was none.
    ///
    /// The partial reply is dropped and no further snapshot is emitted for
    /// the cancelled turn. A new turn may start immediately.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock_state();
        match state.active.take() {
            Some(active) => {
                active.token.cancel();
                state.pending = None;
                state.status = SessionStatus::Idle;
                tracing::debug!(turn_id = %active.id, "Turn cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels any turn and forgets history and conversation id.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        if let Some(active) = state.active.take() {
            active.token.cancel();
        }
        *state = SessionState::default();
    }

    /// Runs one turn to completion.
    ///
    /// Returns once the backend sends `[DONE]`, the body ends, or the turn is
    /// cancelled. Snapshots are delivered to listeners while it runs.
    /// Dropping the returned future cancels the turn and frees the session.
    ///
    /// # Errors
    ///
    /// - [`StreamError::TurnInProgress`] if another turn is running.
    /// - [`StreamError::Transport`], [`StreamError::Http`] or
    ///   [`StreamError::ReadTimeout`] if the request or body fails. The
    ///   partial reply is dropped and the status becomes `Errored`.
    #[instrument(skip(self, input), fields(mode = ?self.mode, turn_id = tracing::field::Empty))]
    pub async fn start_turn(&self, input: impl Into<TurnInput>) -> StreamResult<TurnOutcome> {
        let turn_id = Uuid::new_v4();
        tracing::Span::current().record("turn_id", tracing::field::display(turn_id));

        let (request, token) = self.begin_turn(turn_id, input.into())?;
        let _guard = TurnGuard {
            session: self,
            turn_id,
        };
        self.metrics.record_turn_started();
        tracing::debug!(path = %request.path, "Turn started");

        let result = self.run_turn(request, &token).await;
        self.finalize(turn_id, result, &token)
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_turn(
        &self,
        turn_id: Uuid,
        input: TurnInput,
    ) -> StreamResult<(HttpRequest, CancellationToken)> {
        let mut state = self.lock_state();
        if state.active.is_some() {
            return Err(StreamError::TurnInProgress);
        }

        let user = Message::user(input.message.clone());
        let body = match self.mode {
            StreamMode::Chat => {
                let mut messages = state.history.clone();
                messages.push(user.clone());
                serde_json::to_vec(&ChatTurnRequest { messages })?
            }
            StreamMode::ImageGeneration => {
                if input.conversation_id.is_some() {
                    state.conversation_id = input.conversation_id.clone();
                }
                serde_json::to_vec(&ImageTurnRequest {
                    message: input.message,
                    conversation_id: state.conversation_id.clone(),
                })?
            }
        };

        let token = CancellationToken::new();
        state.history.push(user);
        state.pending = None;
        state.status = SessionStatus::Idle;
        state.active = Some(ActiveTurn {
            id: turn_id,
            token: token.clone(),
        });

        Ok((self.build_request(body), token))
    }

    fn build_request(&self, body: Vec<u8>) -> HttpRequest {
        let path = match self.mode {
            StreamMode::Chat => &self.config.chat_path,
            StreamMode::ImageGeneration => &self.config.image_path,
        };

        let mut request = HttpRequest::post(path.clone())
            .with_header("Accept", "text/event-stream")
            .with_header("Content-Type", "application/json")
            .with_body(body);

        for (name, value) in &self.config.custom_headers {
            request = request.with_header(name.clone(), value.clone());
        }

        self.auth.apply_auth(&mut request.headers);
        request
    }

    async fn run_turn(
        &self,
        request: HttpRequest,
        token: &CancellationToken,
    ) -> StreamResult<TurnRun> {
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(TurnRun::cancelled()),
            response = self.transport.send_streaming(request) => response?,
        };

        if !response.is_success() {
            let status = response.status;
            let body = response.text_lossy(self.config.error_body_limit).await;
            return Err(StreamError::Http { status, body });
        }

        let mut stream = response.stream;
        let mut pipeline = FramePipeline::new(self.mode);
        let mut accumulator = SessionAccumulator::for_mode(self.mode);
        let mut reply = None;
        let mut ignored_reported = 0;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(TurnRun::cancelled()),
                chunk = self.next_chunk(&mut stream) => chunk?,
            };

            let Some(chunk) = chunk else {
                break;
            };

            self.metrics.record_chunk(chunk.len());
            if accumulator.session().status() == SessionStatus::Idle {
                accumulator.mark_open();
                self.mark_open(token);
            }

            let frames = pipeline.push(&chunk)?;
            self.report_ignored(&pipeline, &mut ignored_reported);

            match self.apply_frames(&mut accumulator, frames, token, &mut reply) {
                FrameFlow::Continue => {}
                FrameFlow::Stop => {
                    return Ok(TurnRun {
                        end: TurnEnd::Sentinel,
                        reply,
                    })
                }
                FrameFlow::Cancelled => return Ok(TurnRun::cancelled()),
            }
        }

        let frames = pipeline.finish()?;
        self.report_ignored(&pipeline, &mut ignored_reported);

        match self.apply_frames(&mut accumulator, frames, token, &mut reply) {
            FrameFlow::Continue => {}
            FrameFlow::Stop => {
                return Ok(TurnRun {
                    end: TurnEnd::Sentinel,
                    reply,
                })
            }
            FrameFlow::Cancelled => return Ok(TurnRun::cancelled()),
        }

        match accumulator.finish_eof() {
            EofOutcome::AlreadyDone | EofOutcome::ImplicitSuccess => {}
            EofOutcome::Discarded => self.metrics.record_discard(),
        }

        Ok(TurnRun {
            end: TurnEnd::EndOfStream,
            reply,
        })
    }

    async fn next_chunk(&self, stream: &mut ByteStream) -> StreamResult<Option<Bytes>> {
        let next = match self.config.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, stream.next())
                .await
                .map_err(|_| StreamError::ReadTimeout { timeout })?,
            None => stream.next().await,
        };

        next.transpose().map_err(StreamError::transport)
    }

    fn mark_open(&self, token: &CancellationToken) {
        let mut state = self.lock_state();
        if !token.is_cancelled() {
            state.status = SessionStatus::Open;
        }
    }

    fn report_ignored(&self, pipeline: &FramePipeline, reported: &mut u64) {
        let ignored = pipeline.lines_ignored();
        if ignored > *reported {
            self.metrics.record_ignored_lines(ignored - *reported);
            *reported = ignored;
        }
    }

    fn apply_frames(
        &self,
        accumulator: &mut SessionAccumulator,
        frames: Vec<Frame>,
        token: &CancellationToken,
        reply: &mut Option<Message>,
    ) -> FrameFlow {
        for frame in frames {
            if token.is_cancelled() {
                return FrameFlow::Cancelled;
            }

            let accepted = !accumulator.session().status().is_terminal();
            let applied = accumulator.apply(frame);
            if accepted {
                self.metrics.record_frame();
            }

            for update in applied.updates {
                if !self.handle_update(update, token, reply) {
                    return FrameFlow::Cancelled;
                }
            }

            if applied.stop {
                return FrameFlow::Stop;
            }
        }

        FrameFlow::Continue
    }

    /// Applies one update to the shared state. Returns false if the turn
    /// was cancelled before it could be applied.
    fn handle_update(
        &self,
        update: TurnUpdate,
        token: &CancellationToken,
        reply: &mut Option<Message>,
    ) -> bool {
        let snapshot = {
            let mut state = self.lock_state();
            if token.is_cancelled() {
                return false;
            }

            match update {
                TurnUpdate::Partial(message) => {
                    state.pending = Some(message);
                    Some(state.snapshot(true))
                }
                TurnUpdate::Final(message) => {
                    state.pending = None;
                    state.history.push(message.clone());
                    *reply = Some(message);
                    Some(state.snapshot(false))
                }
                TurnUpdate::SideChannel { key, value } => {
                    tracing::debug!(key = %key, value = %value, "Side-channel value received");
                    if key == CONVERSATION_ID_KEY {
                        state.conversation_id = Some(value);
                    }
                    None
                }
            }
        };

        if let Some(snapshot) = snapshot {
            self.emit(&snapshot, token);
        }
        true
    }

    fn emit(&self, snapshot: &Snapshot, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }

        let listeners = self
            .listeners
            .read()
            .map(|l| l.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());

        for listener in &listeners {
            listener(snapshot);
        }
        self.metrics.record_snapshot();
    }

    fn finalize(
        &self,
        turn_id: Uuid,
        result: StreamResult<TurnRun>,
        token: &CancellationToken,
    ) -> StreamResult<TurnOutcome> {
        let mut state = self.lock_state();

        let cancelled = matches!(&result, Ok(run) if run.end == TurnEnd::Cancelled);
        if cancelled || !state.is_active(turn_id) {
            if state.is_active(turn_id) {
                state.active = None;
                state.pending = None;
                state.status = SessionStatus::Idle;
            }
            self.metrics.record_turn_cancelled();
            tracing::debug!("Turn ended by cancellation");
            return Ok(TurnOutcome {
                turn_id,
                end: TurnEnd::Cancelled,
                reply: None,
                conversation_id: state.conversation_id.clone(),
            });
        }

        state.active = None;

        match result {
            Ok(run) => {
                let mut reply = run.reply;
                if let Some(pending) = state.pending.take() {
                    state.history.push(pending.clone());
                    reply = Some(pending);
                }
                state.status = SessionStatus::Done;
                self.metrics.record_turn_completed();
                tracing::debug!(end = ?run.end, has_reply = reply.is_some(), "Turn completed");

                Ok(TurnOutcome {
                    turn_id,
                    end: run.end,
                    reply,
                    conversation_id: state.conversation_id.clone(),
                })
            }
            Err(e) => {
                state.status = SessionStatus::Errored;
                let closing = state.pending.take().map(|_| state.snapshot(false));
                drop(state);

                if let Some(snapshot) = closing {
                    self.emit(&snapshot, token);
                }
                self.metrics.record_turn_failed();
                tracing::warn!(error = %e, "Turn failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for GenerationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationSession")
            .field("mode", &self.mode)
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

/// Builder for [`GenerationSession`].
pub struct GenerationSessionBuilder {
    mode: StreamMode,
    config: Option<StreamConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    metrics: Option<Arc<StreamMetrics>>,
}

impl GenerationSessionBuilder {
    /// Creates a new builder.
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            config: None,
            transport: None,
            auth: None,
            metrics: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Shares a metrics collector with other sessions.
    pub fn metrics(mut self, metrics: Arc<StreamMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the session.
    pub fn build(self) -> StreamResult<GenerationSession> {
        let config = self
            .config
            .ok_or_else(|| StreamError::configuration("Configuration is required"))?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransportImpl::new(
                config.base_url.clone(),
                config.connect_timeout,
            )?),
        };

        let auth: Arc<dyn AuthProvider> = match (self.auth, config.api_key()) {
            (Some(auth), _) => auth,
            (None, Some(key)) => Arc::new(ApiKeyAuth::from_string(key)),
            (None, None) => Arc::new(NoAuth),
        };

        Ok(GenerationSession {
            mode: self.mode,
            config,
            transport,
            auth,
            state: Mutex::new(SessionState::default()),
            listeners: RwLock::new(Vec::new()),
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}
