//! Line framing over decoded text.

/// Splits decoded text into newline-delimited lines.
///
/// Text after the last newline is buffered and prepended to the next
/// fragment. Empty lines are returned as empty strings; whether they mean
/// anything is up to the interpreter.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    /// Creates a new framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a text fragment and returns every line it completes.
    ///
    /// The newline is stripped, along with a single `\r` before it.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };

        let remainder = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);

        complete[..last_newline]
            .split('\n')
            .map(|line| strip_cr(line).to_string())
            .collect()
    }

    /// Emits the buffered remainder as a final line, if non-empty.
    ///
    /// Backends frequently omit the newline after the last line.
    pub fn finish(&mut self) -> Option<String> {
        let remainder = std::mem::take(&mut self.buffer);
        let line = strip_cr(&remainder);
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }

    /// Text received but not yet terminated by a newline.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Discards any buffered text.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}
