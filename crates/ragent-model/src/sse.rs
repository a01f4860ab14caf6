//! Minimal server-sent-events decoder for streaming chat responses.
//!
//! Only `data:` fields matter to the chat APIs ragent talks to; `event:`,
//! `id:` and comment lines are skipped.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{ModelError, ModelResult};

/// Incremental SSE decoder fed with raw byte chunks.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; the decoder buffers
/// until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the data payloads of every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush whatever remains once the byte stream has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data_lines
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data_lines).join("\n"))
    }
}

/// Turn a streaming HTTP response into a stream of SSE data payloads.
pub fn data_stream(response: reqwest::Response) -> BoxStream<'static, ModelResult<String>> {
    let state = (
        response.bytes_stream().boxed(),
        SseDecoder::new(),
        VecDeque::new(),
        false,
    );

    stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
        loop {
            if let Some(data) = pending.pop_front() {
                return Some((Ok(data), (bytes, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                Some(Err(e)) => {
                    return Some((
                        Err(ModelError::stream(e.to_string())),
                        (bytes, decoder, pending, true),
                    ));
                }
                None => {
                    pending.extend(decoder.finish());
                    done = true;
                }
            }
        }
    })
    .boxed()
}
