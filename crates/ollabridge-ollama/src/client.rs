// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Ollama API.
//!
//! Provides [`OllamaClient`] which posts chat requests, turns streamed
//! responses into text fragments, and lists installed models.

use std::time::Duration;

use ollabridge_core::BridgeError;
use ollabridge_core::traits::ChatStream;
use tracing::debug;

use crate::ndjson;
use crate::types::{ChatBody, ChatChunk, ErrorBody, TagsResponse};

/// HTTP client for one Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:11434`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a non-streaming chat request and returns the whole response.
    pub async fn chat(&self, body: &ChatBody) -> Result<ChatChunk, BridgeError> {
        let mut body = body.clone();
        body.stream = false;

        let response = self.post_chat(&body).await?;
        let text = response.text().await.map_err(|e| BridgeError::Provider {
            message: format!("failed to read Ollama response: {e}"),
            source: Some(Box::new(e)),
        })?;
        let chunk: ChatChunk = serde_json::from_str(&text).map_err(|e| BridgeError::Provider {
            message: format!("failed to parse Ollama response: {e}"),
            source: Some(Box::new(e)),
        })?;
        match chunk.error {
            Some(error) => Err(BridgeError::provider(error)),
            None => Ok(chunk),
        }
    }

    /// Sends a streaming chat request and returns its text fragments.
    pub async fn chat_stream(&self, body: &ChatBody) -> Result<ChatStream, BridgeError> {
        let mut body = body.clone();
        body.stream = true;

        let response = self.post_chat(&body).await?;
        Ok(ndjson::fragment_stream(response))
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>, BridgeError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unreachable_server(&self.base_url, e))?;
        let response = check_status(response).await?;
        let tags: TagsResponse = response.json().await.map_err(|e| BridgeError::Provider {
            message: format!("failed to parse model list: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn post_chat(&self, body: &ChatBody) -> Result<reqwest::Response, BridgeError> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| unreachable_server(&self.base_url, e))?;

        debug!(
            status = %response.status(),
            model = %body.model,
            stream = body.stream,
            messages = body.messages.len(),
            "chat response received"
        );
        check_status(response).await
    }
}

fn unreachable_server(base_url: &str, e: reqwest::Error) -> BridgeError {
    BridgeError::Provider {
        message: format!("failed to reach Ollama at {base_url}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Passes successful responses through; otherwise surfaces Ollama's own
/// error text, which is what users see in the failure reply.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BridgeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => err.error,
        Err(_) => format!("Ollama returned {status}: {body}"),
    };
    Err(BridgeError::provider(message))
}
