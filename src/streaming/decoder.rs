//! Incremental UTF-8 decoding of response body chunks.

use crate::errors::{StreamError, StreamResult};

const REPLACEMENT: char = '\u{FFFD}';

/// Converts raw body chunks into text.
///
/// A multi-byte character split across two chunks is held back until the
/// rest of it arrives, so no replacement character is produced for a split
/// that the next chunk completes. Bytes that can never become valid UTF-8
/// are replaced with U+FFFD straight away, one replacement per maximal
/// invalid subsequence.
#[derive(Debug, Default)]
pub struct ByteDecoder {
    /// Trailing bytes of an incomplete character from the previous chunk.
    pending: Vec<u8>,
    finished: bool,
}

impl ByteDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one chunk.
    ///
    /// With `stream == true` more chunks are expected and an incomplete
    /// trailing sequence is carried forward. With `stream == false` this is
    /// the final chunk: any carried bytes that never completed become a
    /// single U+FFFD and the decoder is finished.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::DecoderFinished`] if called after the final
    /// chunk was decoded.
    pub fn decode(&mut self, chunk: &[u8], stream: bool) -> StreamResult<String> {
        if self.finished {
            return Err(StreamError::DecoderFinished);
        }

        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &after[len..];
                        }
                        None if stream => {
                            self.pending = after.to_vec();
                            break;
                        }
                        None => {
                            out.push(REPLACEMENT);
                            break;
                        }
                    }
                }
            }
        }

        if !stream {
            self.finished = true;
        }

        Ok(out)
    }

    /// Flushes the decoder at end of stream.
    pub fn finish(&mut self) -> StreamResult<String> {
        self.decode(&[], false)
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true once the final chunk has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the decoder to its initial state.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.finished = false;
    }
}
