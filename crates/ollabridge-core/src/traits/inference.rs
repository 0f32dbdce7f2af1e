// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inference backend trait for the local language-model server.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatRequest, ChatResponse};

/// Incremental response fragments from a streamed chat call.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, BridgeError>> + Send>>;

/// Sends chat requests to the inference server.
///
/// Failures carry a human-readable reason in [`BridgeError::Provider`].
#[async_trait]
pub trait InferenceBackend: PluginAdapter {
    /// Sends a chat request and waits for the whole response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, BridgeError>;

    /// Sends a chat request and returns the response as a stream of text fragments.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, BridgeError>;
}
