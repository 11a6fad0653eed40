//! Incremental Server-Sent-Events decoding

use serde::Deserialize;

/// Prefix of every SSE data line
const DATA_PREFIX: &str = "data: ";

/// Stream terminator sent by OpenAI-compatible servers
const DONE_SENTINEL: &str = "[DONE]";

/// Parsed SSE line types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `data: [DONE]`
    Done,
    /// `data: <payload>`, payload trimmed
    Data(String),
    /// Anything else (blank lines, `event:`, comments)
    Skip,
}

impl SseLine {
    /// Classify one complete line (without its `\n`)
    pub fn parse(line: &str) -> Self {
        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            return SseLine::Skip;
        };
        let payload = rest.trim();
        if payload == DONE_SENTINEL {
            SseLine::Done
        } else {
            SseLine::Data(payload.to_string())
        }
    }
}

/// Accumulates bytes from an HTTP response and yields complete SSE lines.
///
/// Bytes are held undecoded until a `\n` arrives. A newline byte never
/// occurs inside a multi-byte UTF-8 sequence, so a character split across
/// two reads is always reassembled before decoding.
///
/// Lines are read through a cursor; consumed bytes stay in place until
/// [`SseBuffer::compact`] drops them in one move.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buf: Vec<u8>,
    consumed: usize,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            consumed: 0,
        }
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete line (terminated by `\n`) from the buffer.
    /// Returns `None` when no complete line is available yet.
    pub fn next_line(&mut self) -> Option<SseLine> {
        let rest = &self.buf[self.consumed..];
        let pos = rest.iter().position(|&b| b == b'\n')?;
        let line = SseLine::parse(&String::from_utf8_lossy(&rest[..pos]));
        self.consumed += pos + 1;
        Some(line)
    }

    /// Drop every line already returned by [`SseBuffer::next_line`]
    pub fn compact(&mut self) {
        if self.consumed > 0 {
            self.buf.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    /// Bytes of the incomplete trailing line
    pub fn pending(&self) -> usize {
        self.buf.len() - self.consumed
    }
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    #[serde(default)]
    delta: Option<ChatStreamDelta>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Pull `choices[0].delta.content` out of one data payload.
///
/// Returns `None` for malformed JSON, missing fields and empty content.
pub fn extract_delta(payload: &str) -> Option<String> {
    let chunk: ChatStreamChunk = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!("Skipping malformed SSE frame: {}", e);
            return None;
        }
    };
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
}

/// Turns raw response chunks into text deltas, in arrival order
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    sse: SseBuffer,
    done_seen: bool,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self {
            sse: SseBuffer::new(),
            done_seen: false,
        }
    }

    /// Feed one network read, returning the deltas completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.sse.extend(chunk);

        let mut deltas = Vec::new();
        while let Some(line) = self.sse.next_line() {
            match line {
                SseLine::Data(payload) => deltas.extend(extract_delta(&payload)),
                SseLine::Done => self.done_seen = true,
                SseLine::Skip => {}
            }
        }
        self.sse.compact();
        deltas
    }

    /// Whether a `data: [DONE]` line has been seen
    pub fn done_seen(&self) -> bool {
        self.done_seen
    }

    /// End of stream. The trailing fragment cannot be a complete line and
    /// is dropped.
    pub fn finish(self) {
        let pending = self.sse.pending();
        if pending > 0 {
            tracing::debug!("Discarding {} bytes of unterminated SSE data", pending);
        }
    }
}
