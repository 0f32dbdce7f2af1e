// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock inference backend for deterministic testing.
//!
//! Replies are popped from a FIFO queue. When the queue is empty, a
//! default "mock response" text is returned.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::Mutex;

use ollabridge_core::traits::{ChatStream, InferenceBackend, PluginAdapter};
use ollabridge_core::types::{AdapterType, ChatRequest, ChatResponse, HealthStatus};
use ollabridge_core::BridgeError;

/// One scripted backend outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Text(String),
    /// The backend answers without any content.
    Empty,
    Error(String),
}

pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    latency: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Create a mock backend pre-loaded with text replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(responses.into_iter().map(MockReply::Text).collect()),
            ..Self::new()
        }
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn push_reply(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    pub async fn push_response(&self, text: impl Into<String>) {
        self.push_reply(MockReply::Text(text.into())).await;
    }

    pub async fn push_error(&self, message: impl Into<String>) {
        self.push_reply(MockReply::Error(message.into())).await;
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Highest number of calls observed in progress at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn next_reply(&self, request: ChatRequest) -> MockReply {
        self.requests.lock().await.push(request);

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::Text("mock response".to_string()))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockBackend {
    fn name(&self) -> &str {
        "mock-backend"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Inference
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, BridgeError> {
        let model = request.model.clone();
        match self.next_reply(request).await {
            MockReply::Text(text) => Ok(ChatResponse {
                model,
                content: Some(text),
            }),
            MockReply::Empty => Ok(ChatResponse {
                model,
                content: None,
            }),
            MockReply::Error(message) => Err(BridgeError::provider(message)),
        }
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, BridgeError> {
        match self.next_reply(request).await {
            MockReply::Text(text) => {
                // One fragment per word, keeping the separating spaces.
                let fragments: Vec<Result<String, BridgeError>> = text
                    .split_inclusive(' ')
                    .map(|piece| Ok(piece.to_string()))
                    .collect();
                Ok(Box::pin(stream::iter(fragments)))
            }
            MockReply::Empty => Ok(Box::pin(stream::empty())),
            MockReply::Error(message) => Err(BridgeError::provider(message)),
        }
    }
}
