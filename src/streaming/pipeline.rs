//! Decoder → framer → interpreter composition.

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::decoder::ByteDecoder;
use super::frame::{Frame, FrameInterpreter, StreamMode};
use super::framer::LineFramer;
use crate::errors::{StreamError, StreamResult};
use crate::transport::TransportError;

/// Turns raw body chunks into frames.
///
/// Owns one decoder, one framer and one interpreter for the lifetime of a
/// single response body.
#[derive(Debug)]
pub struct FramePipeline {
    decoder: ByteDecoder,
    framer: LineFramer,
    interpreter: FrameInterpreter,
    lines_seen: u64,
    lines_ignored: u64,
}

impl FramePipeline {
    /// Creates a pipeline for the given mode.
    pub fn new(mode: StreamMode) -> Self {
        Self {
            decoder: ByteDecoder::new(),
            framer: LineFramer::new(),
            interpreter: FrameInterpreter::new(mode),
            lines_seen: 0,
            lines_ignored: 0,
        }
    }

    /// Returns the mode.
    pub fn mode(&self) -> StreamMode {
        self.interpreter.mode()
    }

    /// Feeds one chunk and returns the frames of every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> StreamResult<Vec<Frame>> {
        let text = self.decoder.decode(chunk, true)?;
        let lines = self.framer.push(&text);
        Ok(self.interpret_all(lines))
    }

    /// Flushes the decoder and framer at end of body.
    pub fn finish(&mut self) -> StreamResult<Vec<Frame>> {
        let text = self.decoder.finish()?;
        let mut lines = self.framer.push(&text);
        lines.extend(self.framer.finish());
        Ok(self.interpret_all(lines))
    }

    /// Number of lines framed so far.
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Number of lines that produced no frame.
    pub fn lines_ignored(&self) -> u64 {
        self.lines_ignored
    }

    fn interpret_all(&mut self, lines: Vec<String>) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(lines.len());
        for line in lines {
            self.lines_seen += 1;
            let before = frames.len();
            frames.extend(self.interpreter.frames(&line));
            if frames.len() == before {
                self.lines_ignored += 1;
            }
        }
        frames
    }
}

pin_project! {
    /// Stream of frames over a stream of raw body chunks.
    ///
    /// Ends after the underlying stream ends and the pipeline is flushed, or
    /// right after yielding the first error.
    pub struct FrameStream<S> {
        #[pin]
        inner: S,
        pipeline: FramePipeline,
        pending: VecDeque<Frame>,
        done: bool,
    }
}

impl<S> FrameStream<S>
where
    S: Stream<Item = Result<Bytes, TransportError>>,
{
    /// Wraps a byte stream.
    pub fn new(inner: S, mode: StreamMode) -> Self {
        Self {
            inner,
            pipeline: FramePipeline::new(mode),
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Returns the underlying pipeline.
    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }
}

impl<S> Stream for FrameStream<S>
where
    S: Stream<Item = Result<Bytes, TransportError>>,
{
    type Item = StreamResult<Frame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => match this.pipeline.push(&chunk) {
                    Ok(frames) => this.pending.extend(frames),
                    Err(e) => {
                        *this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(StreamError::transport(e))));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    match this.pipeline.finish() {
                        Ok(frames) => this.pending.extend(frames),
                        Err(e) => return Poll::Ready(Some(Err(e))),
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::accumulator::{SessionAccumulator, TurnUpdate};
    use crate::streaming::frame::{DataKind, CONVERSATION_ID_KEY};
    use crate::types::Message;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    fn chunks(parts: &[&'static [u8]]) -> Vec<Result<Bytes, TransportError>> {
        parts.iter().map(|p| Ok(Bytes::from_static(*p))).collect()
    }

    fn texts(frames: &[Frame]) -> Vec<&str> {
        frames.iter().filter_map(Frame::payload).collect()
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut pipeline = FramePipeline::new(StreamMode::Chat);

        assert!(pipeline.push(b"data: Hel").unwrap().is_empty());
        let frames = pipeline.push(b"lo\ndata: [DONE]\n").unwrap();

        assert_eq!(frames, vec![Frame::text("Hello"), Frame::Sentinel]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let bytes = "data: héllo\n".as_bytes();
        let split = "data: h".len() + 1;

        let mut pipeline = FramePipeline::new(StreamMode::Chat);
        let mut frames = pipeline.push(&bytes[..split]).unwrap();
        frames.extend(pipeline.push(&bytes[split..]).unwrap());

        assert_eq!(frames, vec![Frame::text("héllo")]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut pipeline = FramePipeline::new(StreamMode::Chat);
        pipeline.push(b"data: a\ndata: [DONE]").unwrap();

        assert_eq!(pipeline.finish().unwrap(), vec![Frame::Sentinel]);
    }

    #[test]
    fn test_push_after_finish_is_rejected() {
        let mut pipeline = FramePipeline::new(StreamMode::Chat);
        pipeline.finish().unwrap();
        assert!(matches!(
            pipeline.push(b"data: late\n"),
            Err(StreamError::DecoderFinished)
        ));
    }

    #[test]
    fn test_ignored_lines_are_counted() {
        let mut pipeline = FramePipeline::new(StreamMode::Chat);
        pipeline
            .push(b"event: start\ndata: x\n: ping\n\ndata: [DONE]\n")
            .unwrap();

        assert_eq!(pipeline.lines_seen(), 5);
        assert_eq!(pipeline.lines_ignored(), 3);
    }

    #[test]
    fn test_image_fragments_across_lines() {
        let mut pipeline = FramePipeline::new(StreamMode::ImageGeneration);
        let frames = pipeline
            .push(b"data: [Image_URL]: AAAA\nBBBB==\ndata: [DONE]\n")
            .unwrap();

        assert_eq!(
            frames,
            vec![
                Frame::Data {
                    payload: "AAAA".to_string(),
                    kind: DataKind::ImageFragment,
                },
                Frame::Data {
                    payload: "BBBB==".to_string(),
                    kind: DataKind::Continuation,
                },
                Frame::Sentinel,
            ]
        );
    }

    /// Feeds chunks through a pipeline and an accumulator, as the read loop
    /// does, and returns the final reply and every update.
    fn run(mode: StreamMode, chunks: &[&[u8]]) -> (String, Vec<TurnUpdate>) {
        let mut pipeline = FramePipeline::new(mode);
        let mut acc = SessionAccumulator::for_mode(mode);
        let mut updates = Vec::new();

        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(pipeline.push(chunk).unwrap());
        }
        frames.extend(pipeline.finish().unwrap());

        for frame in frames {
            let applied = acc.apply(frame);
            updates.extend(applied.updates);
            if applied.stop {
                break;
            }
        }
        acc.finish_eof();

        (acc.session().assistant_reply().to_string(), updates)
    }

    const CHAT_PAYLOAD: &str = "event: x\r\ndata: Grüß\r\ndata:  dich 🦀\n\n: c\ndata: [DONE]\ndata: late\n";
    const IMAGE_PAYLOAD: &str = "data: [Conversation_ID]: conv-42\ndata: [Image_URL]: iVBOR\n  w0K\ndata: [Image_URL]: Ggo\ndata: [DONE]\nignored";

    #[test]
    fn test_chunk_boundary_invariance() {
        for (mode, payload) in [
            (StreamMode::Chat, CHAT_PAYLOAD),
            (StreamMode::ImageGeneration, IMAGE_PAYLOAD),
        ] {
            let bytes = payload.as_bytes();
            let whole = run(mode, &[bytes]);

            for split in 0..=bytes.len() {
                let (head, tail) = bytes.split_at(split);
                assert_eq!(run(mode, &[head, tail]), whole, "{:?} split at {}", mode, split);
            }

            let singles: Vec<&[u8]> = bytes.chunks(1).collect();
            assert_eq!(run(mode, &singles), whole);
        }
    }

    #[test]
    fn test_chat_happy_path_scenario() {
        let (reply, updates) = run(StreamMode::Chat, &[&b"data: Hel\ndata: lo\ndata: [DONE]\n"[..]]);

        assert_eq!(reply, "Hello");
        assert_eq!(
            updates,
            vec![
                TurnUpdate::Partial(Message::assistant("Hel")),
                TurnUpdate::Partial(Message::assistant("Hello")),
            ]
        );
    }

    #[test]
    fn test_chat_snapshots_extend_previous() {
        let (_, updates) = run(StreamMode::Chat, &[CHAT_PAYLOAD.as_bytes()]);

        let contents: Vec<String> = updates
            .into_iter()
            .filter_map(|u| match u {
                TurnUpdate::Partial(m) => Some(m.content),
                _ => None,
            })
            .collect();

        assert_eq!(contents, vec!["Grüß", "Grüß dich 🦀"]);
        for pair in contents.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }
    }

    #[test]
    fn test_image_happy_path_scenario() {
        let (reply, updates) = run(
            StreamMode::ImageGeneration,
            &[&b"data: [Conversation_ID]: conv-42\ndata: [Image_URL]: iVBOR\ndata: [Image_URL]: w0KGgo\ndata: [DONE]\n"[..]],
        );

        assert_eq!(reply, "iVBORw0KGgo");
        assert_eq!(
            updates,
            vec![
                TurnUpdate::SideChannel {
                    key: CONVERSATION_ID_KEY.to_string(),
                    value: "conv-42".to_string(),
                },
                TurnUpdate::Final(Message::assistant("iVBORw0KGgo")),
            ]
        );
    }

    #[test]
    fn test_untagged_continuation_scenario() {
        let (reply, _) = run(
            StreamMode::ImageGeneration,
            &[&b"data: [Image_URL]: AAAA\nBBBB==\ndata: [DONE]\n"[..]],
        );
        assert_eq!(reply, "AAAABBBB==");
    }

    #[test]
    fn test_image_premature_eof_scenario() {
        let (reply, updates) = run(StreamMode::ImageGeneration, &[&b"data: [Image_URL]: partial\n"[..]]);

        assert_eq!(reply, "");
        assert!(updates.is_empty());
    }

    #[test]
    fn test_second_conversation_id_ignored() {
        let mut pipeline = FramePipeline::new(StreamMode::ImageGeneration);
        let mut acc = SessionAccumulator::image_generation();
        for frame in pipeline
            .push(b"data: [Conversation_ID]: first\ndata: [Conversation_ID]: second\n")
            .unwrap()
        {
            acc.apply(frame);
        }
        assert_eq!(acc.session().side_channel(CONVERSATION_ID_KEY), Some("first"));
    }

    #[tokio::test]
    async fn test_frame_stream_yields_all_frames() {
        let body = chunks(&[&b"data: A"[..], &b"B\r\ndata: C\r\n"[..], &b"data: [DONE]"[..]]);
        let stream = FrameStream::new(futures::stream::iter(body), StreamMode::Chat);

        let frames: Vec<Frame> = stream.map(|f| f.unwrap()).collect().await;

        assert_eq!(texts(&frames), vec!["AB", "C"]);
        assert_eq!(frames.last(), Some(&Frame::Sentinel));
    }

    #[tokio::test]
    async fn test_frame_stream_ends_after_error() {
        let body = vec![
            Ok(Bytes::from_static(b"data: one\n")),
            Err(TransportError::Connection {
                message: "reset by peer".to_string(),
            }),
            Ok(Bytes::from_static(b"data: two\n")),
        ];
        let mut stream = FrameStream::new(futures::stream::iter(body), StreamMode::Chat);

        assert_eq!(stream.next().await.unwrap().unwrap(), Frame::text("one"));
        assert!(matches!(
            stream.next().await,
            Some(Err(StreamError::Transport { .. }))
        ));
        assert!(stream.next().await.is_none());
    }
}
