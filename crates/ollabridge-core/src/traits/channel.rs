// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for the messaging platform (Discord).

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelCapabilities, CommandInvocation, InboundEvent, InboundMessage, MessageId};

/// Bidirectional connection to a messaging platform.
///
/// Methods take `&self` so one adapter can be shared between the receive
/// loop and concurrently running message cycles.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Returns the capabilities supported by this channel.
    fn capabilities(&self) -> ChannelCapabilities;

    /// The bot's own user id, known once connected.
    fn bot_user_id(&self) -> Option<String>;

    /// Establishes the connection to the platform.
    async fn connect(&self) -> Result<(), BridgeError>;

    /// Receives the next inbound event.
    ///
    /// Returns a `Channel` error containing "closed" once no more events can arrive.
    async fn receive(&self) -> Result<InboundEvent, BridgeError>;

    /// Replies to `original` with `text`, returning the id of the (first) sent message.
    async fn reply(&self, original: &InboundMessage, text: &str) -> Result<MessageId, BridgeError>;

    /// Replaces the text of a message previously sent with [`reply`](Self::reply).
    async fn edit(
        &self,
        original: &InboundMessage,
        message_id: &MessageId,
        text: &str,
    ) -> Result<(), BridgeError>;

    /// Answers a command invocation (privately to the invoker where supported).
    async fn respond_command(
        &self,
        invocation: &CommandInvocation,
        text: &str,
    ) -> Result<(), BridgeError>;

    /// Shows a typing indicator in the channel. Optional.
    async fn send_typing(&self, _channel_id: &str) -> Result<(), BridgeError> {
        Ok(())
    }
}
