// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound events
//! and captured replies, edits, and command responses for assertion in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use ollabridge_core::traits::{ChannelAdapter, PluginAdapter};
use ollabridge_core::types::{
    AdapterType, ChannelCapabilities, CommandInvocation, HealthStatus, InboundEvent,
    InboundMessage, MessageId,
};
use ollabridge_core::BridgeError;

/// Bot user id reported by a default mock channel.
pub const MOCK_BOT_ID: &str = "999";

/// A reply captured by the mock, with its latest text after edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub id: MessageId,
    pub channel_id: String,
    pub in_reply_to: MessageId,
    pub text: String,
    pub edits: usize,
}

pub struct MockChannel {
    bot_id: String,
    inbound: Mutex<VecDeque<InboundEvent>>,
    notify: Notify,
    closed: AtomicBool,
    replies: Mutex<Vec<SentReply>>,
    command_responses: Mutex<Vec<(String, String)>>,
    typing: Mutex<Vec<String>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::with_bot_id(MOCK_BOT_ID)
    }

    pub fn with_bot_id(bot_id: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            inbound: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            replies: Mutex::new(Vec::new()),
            command_responses: Mutex::new(Vec::new()),
            typing: Mutex::new(Vec::new()),
        }
    }

    /// Queue an event for the next `receive()`.
    pub async fn inject(&self, event: InboundEvent) {
        self.inbound.lock().await.push_back(event);
        self.notify.notify_one();
    }

    pub async fn inject_message(&self, message: InboundMessage) {
        self.inject(InboundEvent::Message(message)).await;
    }

    /// After the queue drains, `receive()` reports the channel as closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub async fn replies(&self) -> Vec<SentReply> {
        self.replies.lock().await.clone()
    }

    /// Final texts of every reply, in send order.
    pub async fn reply_texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .await
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }

    /// `(interaction id, text)` for each answered command.
    pub async fn command_responses(&self) -> Vec<(String, String)> {
        self.command_responses.lock().await.clone()
    }

    pub async fn typing_channels(&self) -> Vec<String> {
        self.typing.lock().await.clone()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        self.close();
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_edit: true,
            max_message_len: 2000,
        }
    }

    fn bot_user_id(&self) -> Option<String> {
        Some(self.bot_id.clone())
    }

    async fn connect(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn receive(&self) -> Result<InboundEvent, BridgeError> {
        loop {
            let notified = self.notify.notified();
            {
                let mut queue = self.inbound.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(BridgeError::channel("mock channel closed"));
            }
            notified.await;
        }
    }

    async fn reply(&self, original: &InboundMessage, text: &str) -> Result<MessageId, BridgeError> {
        let id = MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4()));
        self.replies.lock().await.push(SentReply {
            id: id.clone(),
            channel_id: original.channel_id.clone(),
            in_reply_to: original.id.clone(),
            text: text.to_string(),
            edits: 0,
        });
        Ok(id)
    }

    async fn edit(
        &self,
        _original: &InboundMessage,
        message_id: &MessageId,
        text: &str,
    ) -> Result<(), BridgeError> {
        let mut replies = self.replies.lock().await;
        let reply = replies
            .iter_mut()
            .find(|r| &r.id == message_id)
            .ok_or_else(|| BridgeError::channel(format!("unknown message {}", message_id.0)))?;
        reply.text = text.to_string();
        reply.edits += 1;
        Ok(())
    }

    async fn respond_command(
        &self,
        invocation: &CommandInvocation,
        text: &str,
    ) -> Result<(), BridgeError> {
        self.command_responses
            .lock()
            .await
            .push((invocation.interaction_id.clone(), text.to_string()));
        Ok(())
    }

    async fn send_typing(&self, channel_id: &str) -> Result<(), BridgeError> {
        self.typing.lock().await.push(channel_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::inbound_message;

    #[tokio::test]
    async fn receive_returns_injected_events_then_closes() {
        let channel = MockChannel::new();
        channel
            .inject_message(inbound_message("c1", "u1", "hello there", false))
            .await;
        channel.close();

        match channel.receive().await.unwrap() {
            InboundEvent::Message(m) => assert_eq!(m.text, "hello there"),
            other => panic!("expected message, got {other:?}"),
        }
        let err = channel.receive().await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn edits_replace_reply_text() {
        let channel = MockChannel::new();
        let original = inbound_message("c1", "u1", "question", true);
        let id = channel.reply(&original, "partial").await.unwrap();
        channel.edit(&original, &id, "partial and final").await.unwrap();

        let replies = channel.replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "partial and final");
        assert_eq!(replies[0].edits, 1);
        assert_eq!(replies[0].in_reply_to, original.id);
    }

    #[tokio::test]
    async fn editing_unknown_message_fails() {
        let channel = MockChannel::new();
        let original = inbound_message("c1", "u1", "question", true);
        let result = channel
            .edit(&original, &MessageId("nope".into()), "text")
            .await;
        assert!(result.is_err());
    }
}
