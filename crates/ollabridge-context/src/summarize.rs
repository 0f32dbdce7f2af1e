// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History summarization: collapses a long channel history into the
//! system entry, one summary entry, and a short tail of recent turns.

use std::sync::Arc;

use ollabridge_core::traits::InferenceBackend;
use ollabridge_core::types::{ChatRequest, Message, Role};
use ollabridge_core::BridgeError;
use ollabridge_dispatch::RequestDispatcher;
use tracing::{info, warn};

/// Instruction sent as the system message of every summarizer call.
pub const SUMMARIZER_INSTRUCTION: &str = r#"You compress chat transcripts for a Discord assistant.

Write at most 10 bullet points, each starting with "- ", that capture:
- facts stated by participants
- constraints and requirements
- decisions that were made
- user preferences

Rules:
- Paraphrase; never copy messages verbatim.
- Lines starting with "assistant: SUMMARY:" are earlier summaries. Do not summarize them again; carry forward only what is still relevant.
- Output only the bullet points."#;

/// Default history length above which summarization runs.
pub const DEFAULT_TRIGGER_LEN: usize = 5;

/// Default number of recent non-summary entries kept verbatim.
pub const DEFAULT_RETAINED_TAIL: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizationPolicy {
    pub trigger_len: usize,
    pub retained_tail: usize,
    pub instruction: String,
}

impl Default for SummarizationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_LEN, DEFAULT_RETAINED_TAIL)
    }
}

impl SummarizationPolicy {
    pub fn new(trigger_len: usize, retained_tail: usize) -> Self {
        Self {
            trigger_len,
            retained_tail,
            instruction: SUMMARIZER_INSTRUCTION.to_string(),
        }
    }

    /// Counts every entry, the system entry included.
    pub fn should_summarize(&self, history: &[Message]) -> bool {
        history.len() > self.trigger_len
    }

    /// `role: content` lines for every entry after the leading system entry.
    pub fn render_transcript(history: &[Message]) -> String {
        let body = match history.first() {
            Some(first) if first.role == Role::System => &history[1..],
            _ => history,
        };
        body.iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The summarizer call for `history`.
    pub fn build_request(&self, model: &str, history: &[Message]) -> ChatRequest {
        let transcript = Self::render_transcript(history);
        ChatRequest {
            model: model.to_string(),
            messages: vec![
                Message::system(self.instruction.clone(), ollabridge_core::types::SYSTEM_AUTHOR),
                Message::user(
                    format!("Summarize this conversation:\n\n{transcript}"),
                    Vec::new(),
                    ollabridge_core::types::SYSTEM_AUTHOR,
                ),
            ],
            stream: false,
        }
    }

    /// Replaces `history` with `[system?, summary, tail...]`.
    ///
    /// The tail is the last `retained_tail` entries that are neither
    /// summaries nor system entries, in their original order.
    pub fn apply(&self, history: &[Message], summary_text: &str) -> Vec<Message> {
        let mut compacted = Vec::with_capacity(self.retained_tail + 2);
        if let Some(first) = history.first().filter(|m| m.role == Role::System) {
            compacted.push(first.clone());
        }
        compacted.push(Message::summary(summary_text.trim()));

        let mut tail: Vec<Message> = history
            .iter()
            .rev()
            .filter(|m| m.role != Role::System && !m.is_summary())
            .take(self.retained_tail)
            .cloned()
            .collect();
        tail.reverse();
        compacted.extend(tail);
        compacted
    }

    /// Summarizes `history` through `dispatcher` when it is over the trigger.
    ///
    /// Returns `None` when under the trigger or when the summarizer
    /// produced no text. Summarizer failures propagate; `history` itself is
    /// only borrowed, so a failed call never loses entries.
    pub async fn summarize(
        &self,
        history: &[Message],
        model: &str,
        backend: Arc<dyn InferenceBackend>,
        dispatcher: &RequestDispatcher,
    ) -> Result<Option<Vec<Message>>, BridgeError> {
        if !self.should_summarize(history) {
            return Ok(None);
        }

        let request = self.build_request(model, history);
        let response = dispatcher
            .submit(async move { backend.chat(request).await })
            .await?;

        let summary = match response.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                warn!(model, len = history.len(), "summarizer returned no text, keeping history");
                return Ok(None);
            }
        };

        let compacted = self.apply(history, &summary);
        info!(
            model,
            original_len = history.len(),
            compacted_len = compacted.len(),
            summary_chars = summary.len(),
            "history summarized"
        );
        Ok(Some(compacted))
    }
}
