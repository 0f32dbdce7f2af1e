// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed persistence for Ollabridge.
//!
//! Every persisted document is a JSON file under the data directory, guarded
//! by a sibling `.lock` marker file created exclusively for the duration of
//! each read or write. The marker makes the lock visible to every process
//! sharing the directory, not only to tasks inside this one.

pub mod config_store;
pub mod document;
pub mod history;
pub mod lock;
pub mod models;

pub use config_store::ConfigStore;
pub use history::ChannelHistoryStore;
pub use lock::{FileLock, LockGuard};
pub use models::*;
