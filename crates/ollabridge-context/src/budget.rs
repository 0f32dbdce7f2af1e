// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approximate token accounting and history trimming.
//!
//! The estimator is deliberately crude: a token is a run of non-whitespace
//! text, and each of `. , ! ? ; : - ( ) [ ] { }` starts a token of its own.
//! "Hello, world!" is four tokens.

use ollabridge_core::types::{Message, Role};
use tracing::debug;

const BOUNDARY_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '-', '(', ')', '[', ']', '{', '}',
];

/// Estimated token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    let mut count = 0;
    let mut in_piece = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_piece = false;
        } else if BOUNDARY_PUNCTUATION.contains(&c) {
            count += 1;
            // Text following punctuation begins a new piece.
            in_piece = false;
        } else if !in_piece {
            count += 1;
            in_piece = true;
        }
    }
    count
}

pub fn history_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Evicts from the front until the history fits in `max_tokens`.
///
/// Returns the number of evicted entries.
pub fn enforce_budget(messages: &mut Vec<Message>, max_tokens: usize) -> usize {
    let mut total = history_tokens(messages);
    let mut evict = 0;
    while total > max_tokens && evict < messages.len() {
        total -= estimate_tokens(&messages[evict].content);
        evict += 1;
    }
    if evict > 0 {
        messages.drain(..evict);
        debug!(evicted = evict, remaining_tokens = total, max_tokens, "history over budget");
    }
    evict
}

/// Caps the history at `capacity` entries, dropping the oldest non-system ones.
///
/// The newest entry is never dropped, so the cap may be exceeded when only
/// system entries precede it.
pub fn enforce_capacity(messages: &mut Vec<Message>, capacity: usize) -> usize {
    let mut removed = 0;
    while messages.len() > capacity {
        let older = &messages[..messages.len() - 1];
        match older.iter().position(|m| m.role != Role::System) {
            Some(idx) => {
                messages.remove(idx);
                removed += 1;
            }
            None => break,
        }
    }
    removed
}
