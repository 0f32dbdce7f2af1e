// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every Ollabridge crate.
//!
//! The `Display` text of the policy variants (`ChatDisabled`, `ModelMissing`,
//! `QueueTimeout`, `PreferencesUnavailable`) is sent to users verbatim when a
//! message cycle fails, so it is written for people, not logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The primary error type used across adapter traits, storage, and the agent.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (invalid TOML, missing token, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage errors (file I/O, (de)serialization of persisted documents).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A lock file could not be created for a reason other than contention.
    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Messaging platform errors (gateway failure, send/edit rejected).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Inference backend errors. The message is human-readable.
    #[error("{message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A dispatched request was not admitted before its queue-wait deadline.
    #[error("Rate limit exceeded: request timed out while waiting in queue.")]
    QueueTimeout { waited: Duration },

    /// Chat was switched off for the server by an administrator.
    #[error("Admin(s) have disabled chat features.\n\nPlease contact your server's admin(s).")]
    ChatDisabled,

    /// No model resolved for the channel.
    #[error(
        "Failed to initialize a Model. Please set a model by running `/switch-model <model of choice>` or configure a channel model."
    )]
    ModelMissing,

    /// Preferences could not be read after all retry attempts.
    #[error("Could not retrieve {scope} Preferences, please try chatting again...")]
    PreferencesUnavailable { scope: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Wraps any error as a storage failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a provider error from a plain message.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a channel error from a plain message.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the same operation shortly after may succeed.
    ///
    /// Storage, lock, and preference failures come from files racing with
    /// their lazy creation; policy failures never change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Lock { .. } | Self::PreferencesUnavailable { .. }
        )
    }
}
