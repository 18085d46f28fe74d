//! NDJSON → [`ChatStream`] decoding for Ollama's `/api/chat`.
//!
//! Ollama streams one JSON object per line:
//!
//! ```text
//! {"message":{"role":"assistant","content":"你"},"done":false}
//! {"message":{"role":"assistant","content":"好"},"done":false}
//! {"message":{"role":"assistant","content":""},"done":true}
//! ```
//!
//! [`decode_ndjson`] turns any byte stream carrying that format into
//! [`ChatChunk`] events.  Lines may be split across network chunks (including
//! in the middle of a UTF-8 sequence); bytes are buffered until a newline
//! arrives.

use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::stream::{self, Stream, StreamExt};
use leafmate_registry::ChatStream;
use leafmate_types::{ChatChunk, LeafError};
use serde::Deserialize;

/// Longest line accepted before the stream is failed.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

/// One line of the `/api/chat` stream.
#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    /// Set instead of `message` when the model fails mid-generation.
    #[serde(default)]
    error: Option<String>,
}

struct Decoder<S> {
    inner: S,
    buf: Vec<u8>,
    pending: VecDeque<Result<ChatChunk, LeafError>>,
    /// No more items will be queued once set.
    finished: bool,
}

impl<S> Decoder<S> {
    fn drain_lines(&mut self) {
        while !self.finished {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.push_line(&line);
        }
        if !self.finished && self.buf.len() > MAX_LINE_BYTES {
            self.buf.clear();
            self.fail(format!("stream line exceeds {MAX_LINE_BYTES} bytes"));
        }
    }

    /// Handle whatever is left once the byte stream has ended.
    fn drain_tail(&mut self) {
        if !self.finished && !self.buf.is_empty() {
            let line = std::mem::take(&mut self.buf);
            self.push_line(&line);
        }
        if !self.finished {
            self.pending.push_back(Ok(ChatChunk::finished("")));
            self.finished = true;
        }
    }

    fn push_line(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match serde_json::from_str::<WireChunk>(text) {
            Ok(WireChunk {
                error: Some(message),
                ..
            }) => self.fail(format!("model error: {message}")),
            Ok(chunk) => {
                let content = chunk.message.map(|m| m.content).unwrap_or_default();
                if chunk.done {
                    self.pending.push_back(Ok(ChatChunk::finished(content)));
                    self.finished = true;
                } else {
                    self.pending.push_back(Ok(ChatChunk::fragment(content)));
                }
            }
            Err(e) => self.fail(format!("undecodable stream line: {e}")),
        }
    }

    fn fail(&mut self, message: String) {
        self.pending.push_back(Err(LeafError::Backend(message)));
        self.finished = true;
    }
}

/// Decode an NDJSON byte stream into chat events.
///
/// The returned stream yields every fragment in order and ends with exactly
/// one `done == true` chunk.  A transport error, a malformed line, or an
/// `error` object from the server is yielded as a single `Err` item, after
/// which the stream ends.  So is a line longer than [`MAX_LINE_BYTES`].
pub fn decode_ndjson<S, B, E>(bytes: S) -> ChatStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let decoder = Decoder {
        inner: bytes.boxed(),
        buf: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(decoder, |mut dec| async move {
        loop {
            if let Some(item) = dec.pending.pop_front() {
                return Some((item, dec));
            }
            if dec.finished {
                return None;
            }
            match dec.inner.next().await {
                Some(Ok(chunk)) => {
                    dec.buf.extend_from_slice(chunk.as_ref());
                    dec.drain_lines();
                }
                Some(Err(e)) => dec.fail(format!("stream interrupted: {e}")),
                None => dec.drain_tail(),
            }
        }
    })
    .boxed()
}
