// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Ollabridge.
//!
//! Provides the error taxonomy, the conversation data model, and the adapter
//! traits that the Discord channel and the Ollama backend implement.

pub mod error;
pub mod text;
pub mod traits;
pub mod types;

pub use error::BridgeError;
pub use text::split_message;
pub use types::{
    AdapterType, Attachment, ChannelCapabilities, ChannelHistory, ChatRequest, ChatResponse,
    CommandInvocation, CommandKind, HealthStatus, InboundEvent, InboundMessage, Message,
    MessageId, Role,
};

pub use traits::{ChannelAdapter, ChatStream, InferenceBackend, PluginAdapter};
