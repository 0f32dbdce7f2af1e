// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation shaping for Ollabridge.
//!
//! - [`clean`]: strips bot mentions and whitespace noise from inbound text
//! - [`budget`]: approximate token counting, front eviction, and capacity caps
//! - [`summarize`]: collapses long histories into a summary plus a short tail

pub mod budget;
pub mod clean;
pub mod summarize;

pub use budget::{enforce_budget, enforce_capacity, estimate_tokens, history_tokens};
pub use clean::clean_message;
pub use summarize::SummarizationPolicy;
