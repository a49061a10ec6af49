//! Server-sent-events decoding for streamed chat completions.
//!
//! The service answers a streamed request with `data: {json}` lines, one
//! event per line, terminated by `data: [DONE]`. Body chunks may split a
//! line anywhere (including inside a UTF-8 sequence), so bytes are buffered
//! until a full line is available.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::llm::LlmError;

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental line splitter yielding `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk; returns every `data:` payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\n', '\r']);
    let payload = line.strip_prefix("data:")?;
    Some(payload.strip_prefix(' ').unwrap_or(payload).to_string())
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// What one `data:` payload means for the fragment sequence.
#[derive(Debug, PartialEq)]
enum Event {
    Fragment(String),
    Nothing,
    Done,
}

fn interpret(payload: &str) -> Result<Event, LlmError> {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(Event::Done);
    }
    if payload.is_empty() {
        return Ok(Event::Nothing);
    }
    let chunk: StreamChunk =
        serde_json::from_str(payload).map_err(|e| LlmError::Decode(e.to_string()))?;
    if let Some(err) = chunk.error {
        return Err(LlmError::Stream(err.to_string()));
    }
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .unwrap_or_default();
    if text.is_empty() {
        Ok(Event::Nothing)
    } else {
        Ok(Event::Fragment(text))
    }
}

struct FragmentState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
    idle: Duration,
}

impl<S> FragmentState<S> {
    /// Queue the meaning of each payload. Returns true once the stream is over.
    fn absorb(&mut self, payloads: Vec<String>) -> bool {
        for payload in payloads {
            match interpret(&payload) {
                Ok(Event::Fragment(text)) => self.pending.push_back(Ok(text)),
                Ok(Event::Nothing) => {}
                Ok(Event::Done) => return true,
                Err(e) => {
                    self.pending.push_back(Err(e));
                    return true;
                }
            }
        }
        false
    }
}

/// Turn a raw SSE byte stream into text fragments.
///
/// The sequence ends cleanly only on `[DONE]`. A transport error, a
/// malformed event, an idle gap longer than `idle`, or a body that ends
/// without `[DONE]` yields one final `Err`.
pub fn fragments<S, B, E>(body: S, idle: Duration) -> impl Stream<Item = Result<String, LlmError>>
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = FragmentState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        idle,
    };
    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match tokio::time::timeout(st.idle, st.body.next()).await {
                Err(_) => {
                    st.finished = true;
                    st.pending.push_back(Err(LlmError::Timeout(st.idle)));
                }
                Ok(Some(Err(e))) => {
                    st.finished = true;
                    st.pending.push_back(Err(LlmError::Stream(e.to_string())));
                }
                Ok(Some(Ok(chunk))) => {
                    let payloads = st.decoder.push(chunk.as_ref());
                    st.finished = st.absorb(payloads);
                }
                Ok(None) => {
                    st.finished = true;
                    let tail: Vec<String> = st.decoder.finish().into_iter().collect();
                    if !st.absorb(tail) {
                        st.pending.push_back(Err(LlmError::Stream(
                            "connection closed before completion".to_string(),
                        )));
                    }
                }
            }
        }
    })
}
