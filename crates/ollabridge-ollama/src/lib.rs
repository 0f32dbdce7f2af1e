// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollama inference backend for Ollabridge.
//!
//! Implements [`InferenceBackend`] over Ollama's native `/api/chat`
//! endpoint, both as a single response and as streamed NDJSON fragments.

pub mod client;
pub mod ndjson;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use ollabridge_config::model::OllamaConfig;
use ollabridge_core::BridgeError;
use ollabridge_core::traits::{ChatStream, InferenceBackend, PluginAdapter};
use ollabridge_core::types::{AdapterType, ChatRequest, ChatResponse, HealthStatus};
use tracing::{debug, info};

pub use client::OllamaClient;

use crate::types::{ChatBody, WireMessage};

/// Inference backend talking to a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: OllamaClient,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig) -> Result<Self, BridgeError> {
        let client = OllamaClient::new(
            config.base_url(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        info!(base_url = client.base_url(), "ollama backend initialized");
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: OllamaClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    fn to_body(request: &ChatRequest) -> ChatBody {
        ChatBody {
            model: request.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream: request.stream,
        }
    }
}

#[async_trait]
impl PluginAdapter for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inference
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        match self.client.list_models().await {
            Ok(models) if models.is_empty() => Ok(HealthStatus::Degraded(
                "Ollama is reachable but has no models installed".into(),
            )),
            Ok(models) => {
                debug!(count = models.len(), "ollama models available");
                Ok(HealthStatus::Healthy)
            }
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, BridgeError> {
        let chunk = self.client.chat(&Self::to_body(&request)).await?;
        let model = if chunk.model.is_empty() {
            request.model
        } else {
            chunk.model
        };
        Ok(ChatResponse {
            model,
            content: chunk.message.map(|m| m.content),
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, BridgeError> {
        self.client.chat_stream(&Self::to_body(&request)).await
    }
}
