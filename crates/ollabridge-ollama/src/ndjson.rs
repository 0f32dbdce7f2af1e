// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newline-delimited JSON decoding for streamed chat responses.
//!
//! Ollama streams one [`ChatChunk`] per line. Network chunks do not align
//! with lines, so [`LineDecoder`] buffers partial lines between reads.

use futures::stream::{self, StreamExt};
use ollabridge_core::BridgeError;
use ollabridge_core::traits::ChatStream;
use tracing::debug;

use crate::types::ChatChunk;

/// Splits a byte stream into complete lines and parses each as a chunk.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds bytes and returns every chunk completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<ChatChunk, BridgeError>> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(parsed) = parse_line(&line) {
                out.push(parsed);
            }
        }
        out
    }

    /// Parses whatever remains once the byte stream ends.
    pub fn finish(&mut self) -> Option<Result<ChatChunk, BridgeError>> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<Result<ChatChunk, BridgeError>> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice::<ChatChunk>(line).map_err(|e| BridgeError::Provider {
            message: format!("failed to parse Ollama stream line: {e}"),
            source: Some(Box::new(e)),
        }),
    )
}

/// Turns a parsed chunk into the text fragment it carries.
///
/// Error lines become errors; chunks without content yield nothing.
fn fragment(chunk: ChatChunk) -> Option<Result<String, BridgeError>> {
    if let Some(error) = chunk.error {
        return Some(Err(BridgeError::provider(error)));
    }
    if chunk.done {
        debug!(model = %chunk.model, "ollama stream finished");
    }
    chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty())
        .map(Ok)
}

/// Converts a streaming `/api/chat` response into text fragments.
pub fn fragment_stream(response: reqwest::Response) -> ChatStream {
    let bytes = response.bytes_stream();
    let state = (Box::pin(bytes), LineDecoder::new(), false);

    let chunks = stream::unfold(state, |(mut bytes, mut decoder, finished)| async move {
        if finished {
            return None;
        }
        match bytes.next().await {
            Some(Ok(data)) => {
                let parsed = decoder.push(&data);
                Some((parsed, (bytes, decoder, false)))
            }
            Some(Err(e)) => {
                let err = BridgeError::Provider {
                    message: format!("Ollama stream interrupted: {e}"),
                    source: Some(Box::new(e)),
                };
                Some((vec![Err(err)], (bytes, decoder, true)))
            }
            None => {
                let tail: Vec<_> = decoder.finish().into_iter().collect();
                Some((tail, (bytes, decoder, true)))
            }
        }
    })
    .flat_map(stream::iter);

    let fragments = chunks.filter_map(|parsed| async move {
        match parsed {
            Ok(chunk) => fragment(chunk),
            Err(e) => Some(Err(e)),
        }
    });

    Box::pin(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(results: Vec<Result<ChatChunk, BridgeError>>) -> Vec<String> {
        results
            .into_iter()
            .map(|r| r.unwrap().message.unwrap().content)
            .collect()
    }

    #[test]
    fn lines_split_across_reads_are_reassembled() {
        let mut decoder = LineDecoder::new();
        let first = decoder.push(br#"{"message":{"role":"assistant","content":"Hel"#);
        assert!(first.is_empty());
        let second = decoder.push(
            b"lo\"},\"done\":false}\n{\"message\":{\"role\":\"assistant\",\"content\":\" there\"},\"done\":false}\n",
        );
        assert_eq!(contents(second), vec!["Hello", " there"]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn trailing_line_without_newline_is_parsed_on_finish() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(br#"{"done":true,"message":{"role":"assistant","content":"end"}}"#).is_empty());
        let tail = decoder.finish().unwrap().unwrap();
        assert!(tail.done);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"\n\r\n  \n").is_empty());
    }

    #[test]
    fn malformed_line_is_an_error() {
        let mut decoder = LineDecoder::new();
        let out = decoder.push(b"not json\n");
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[test]
    fn error_chunks_become_provider_errors() {
        let chunk: ChatChunk = serde_json::from_str(r#"{"error":"out of memory"}"#).unwrap();
        let err = fragment(chunk).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "out of memory");
    }

    #[test]
    fn final_empty_chunk_yields_nothing() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"model":"m","message":{"role":"assistant","content":""},"done":true}"#,
        )
        .unwrap();
        assert!(fragment(chunk).is_none());
    }
}
