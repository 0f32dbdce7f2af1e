// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Ollabridge integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without Discord or Ollama.
//!
//! # Components
//!
//! - [`MockBackend`] - Mock inference backend with queued replies and a concurrency gauge
//! - [`MockChannel`] - Mock messaging channel with event injection and reply capture
//! - [`TestHarness`] - Temp data directory with stores, dispatcher, and both mocks

pub mod harness;
pub mod mock_backend;
pub mod mock_channel;

pub use harness::{inbound_message, TestHarness};
pub use mock_backend::{MockBackend, MockReply};
pub use mock_channel::{MockChannel, SentReply};
