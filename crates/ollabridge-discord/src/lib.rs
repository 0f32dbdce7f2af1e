// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord channel adapter for Ollabridge.
//!
//! Implements [`ChannelAdapter`] over the Discord gateway via serenity:
//! guild and direct messages with mention detection and downloaded
//! attachments, replies that reference the original message, in-place
//! edits for streamed replies, and the administrative slash commands.

pub mod commands;
pub mod handler;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use ollabridge_config::model::DiscordConfig;
use ollabridge_core::traits::{ChannelAdapter, PluginAdapter};
use ollabridge_core::types::{
    AdapterType, ChannelCapabilities, CommandInvocation, HealthStatus, InboundEvent,
    InboundMessage, MessageId,
};
use ollabridge_core::{BridgeError, split_message};
use serenity::all::{
    ChannelId, Client, CreateMessage, EditMessage, GatewayIntents, Http, MessageId as DiscordId,
    ShardManager, UserId,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::handler::{Handler, PendingInteractions};

/// Discord's per-message character limit.
pub const MAX_MESSAGE_LEN: usize = 2000;

fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Discord channel adapter implementing [`ChannelAdapter`].
pub struct DiscordChannel {
    token: String,
    /// Taken by `connect`; the gateway handler owns the only sender after that.
    inbound_tx: Mutex<Option<mpsc::Sender<InboundEvent>>>,
    inbound_rx: Mutex<mpsc::Receiver<InboundEvent>>,
    http: OnceLock<Arc<Http>>,
    shard_manager: OnceLock<Arc<ShardManager>>,
    gateway: Mutex<Option<JoinHandle<()>>>,
    bot_id: Arc<OnceLock<UserId>>,
    pending: PendingInteractions,
}

impl DiscordChannel {
    /// Creates a new Discord channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &DiscordConfig) -> Result<Self, BridgeError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            BridgeError::Config("discord.bot_token is required to run the bot".into())
        })?;
        if token.trim().is_empty() {
            return Err(BridgeError::Config("discord.bot_token cannot be empty".into()));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        Ok(Self {
            token: token.trim().to_string(),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            inbound_rx: Mutex::new(inbound_rx),
            http: OnceLock::new(),
            shard_manager: OnceLock::new(),
            gateway: Mutex::new(None),
            bot_id: Arc::new(OnceLock::new()),
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn http(&self) -> Result<&Http, BridgeError> {
        self.http
            .get()
            .map(Arc::as_ref)
            .ok_or_else(|| BridgeError::channel("discord channel is not connected"))
    }
}

fn parse_channel_id(raw: &str) -> Result<ChannelId, BridgeError> {
    parse_snowflake(raw).map(ChannelId::new)
}

fn parse_message_id(raw: &str) -> Result<DiscordId, BridgeError> {
    parse_snowflake(raw).map(DiscordId::new)
}

fn parse_snowflake(raw: &str) -> Result<u64, BridgeError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| BridgeError::channel(format!("invalid discord id `{raw}`")))
}

fn api_error(action: &str, e: serenity::Error) -> BridgeError {
    BridgeError::Channel {
        message: format!("failed to {action}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        let Ok(http) = self.http() else {
            return Ok(HealthStatus::Unhealthy("not connected".into()));
        };
        match http.get_current_user().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("Discord unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        debug!("discord channel shutting down");
        if let Some(manager) = self.shard_manager.get() {
            manager.shutdown_all().await;
        }
        if let Some(handle) = self.gateway.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for DiscordChannel {
    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            supports_edit: true,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }

    fn bot_user_id(&self) -> Option<String> {
        self.bot_id.get().map(|id| id.to_string())
    }

    async fn connect(&self) -> Result<(), BridgeError> {
        let Some(tx) = self.inbound_tx.lock().await.take() else {
            return Ok(()); // Already connected
        };

        let handler = Handler::new(tx, Arc::clone(&self.bot_id), Arc::clone(&self.pending));
        let mut client = Client::builder(&self.token, intents())
            .event_handler(handler)
            .await
            .map_err(|e| api_error("build discord client", e))?;

        let _ = self.http.set(Arc::clone(&client.http));
        let _ = self.shard_manager.set(Arc::clone(&client.shard_manager));

        info!("connecting to discord gateway");
        let handle = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "discord gateway stopped");
            }
        });
        *self.gateway.lock().await = Some(handle);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundEvent, BridgeError> {
        self.inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| BridgeError::channel("discord gateway closed"))
    }

    async fn reply(&self, original: &InboundMessage, text: &str) -> Result<MessageId, BridgeError> {
        let http = self.http()?;
        let channel = parse_channel_id(&original.channel_id)?;
        let reference = parse_message_id(&original.id.0)?;

        let mut first = None;
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let builder = CreateMessage::new()
                .content(chunk)
                .reference_message((channel, reference));
            let sent = channel
                .send_message(http, builder)
                .await
                .map_err(|e| api_error("send reply", e))?;
            first.get_or_insert(sent.id);
        }

        first
            .map(|id| MessageId(id.to_string()))
            .ok_or_else(|| BridgeError::channel("refusing to send an empty message"))
    }

    async fn edit(
        &self,
        original: &InboundMessage,
        message_id: &MessageId,
        text: &str,
    ) -> Result<(), BridgeError> {
        let http = self.http()?;
        let channel = parse_channel_id(&original.channel_id)?;
        let target = parse_message_id(&message_id.0)?;
        channel
            .edit_message(http, target, EditMessage::new().content(text))
            .await
            .map(|_| ())
            .map_err(|e| api_error("edit reply", e))
    }

    async fn respond_command(
        &self,
        invocation: &CommandInvocation,
        text: &str,
    ) -> Result<(), BridgeError> {
        let http = self.http()?;
        let command = self
            .pending
            .lock()
            .await
            .remove(&invocation.interaction_id)
            .ok_or_else(|| {
                BridgeError::channel(format!(
                    "no pending interaction {}",
                    invocation.interaction_id
                ))
            })?;
        handler::answer(http, &command, text)
            .await
            .map_err(|e| api_error("answer command", e))
    }

    async fn send_typing(&self, channel_id: &str) -> Result<(), BridgeError> {
        let http = self.http()?;
        parse_channel_id(channel_id)?
            .broadcast_typing(http)
            .await
            .map_err(|e| api_error("send typing indicator", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> DiscordConfig {
        DiscordConfig {
            bot_token: token.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(
            DiscordChannel::new(&config(None)),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            DiscordChannel::new(&config(Some("  "))),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn reports_platform_limits() {
        let channel = DiscordChannel::new(&config(Some("token"))).unwrap();
        let caps = channel.capabilities();
        assert!(caps.supports_edit);
        assert_eq!(caps.max_message_len, 2000);
        assert_eq!(channel.bot_user_id(), None);
    }

    #[test]
    fn snowflakes_must_be_nonzero_integers() {
        assert_eq!(parse_snowflake("123456789").unwrap(), 123_456_789);
        assert!(parse_snowflake("0").is_err());
        assert!(parse_snowflake("abc").is_err());
        assert!(parse_snowflake("").is_err());
    }

    #[tokio::test]
    async fn sending_before_connect_fails() {
        let channel = DiscordChannel::new(&config(Some("token"))).unwrap();
        let err = channel.send_typing("42").await.unwrap_err();
        assert!(err.to_string().contains("not connected"));
        assert_eq!(
            channel.health_check().await.unwrap(),
            HealthStatus::Unhealthy("not connected".into())
        );
    }
}
