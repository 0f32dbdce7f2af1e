// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway event handler: converts Discord events into [`InboundEvent`]s.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use ollabridge_core::types::{
    Attachment, CommandInvocation, InboundEvent, InboundMessage, MessageId,
};
use serenity::all::{
    ActivityData, Channel, Command, CommandInteraction, Context, CreateInteractionResponse,
    CreateInteractionResponseMessage, EventHandler, Interaction, Message, OnlineStatus, Ready,
    UserId,
};
use serenity::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::commands;

/// Presence shown while connected.
pub const PRESENCE: &str = "Powered by Ollama";

/// Interactions awaiting an answer, keyed by interaction id.
pub type PendingInteractions = Arc<Mutex<HashMap<String, CommandInteraction>>>;

pub struct Handler {
    tx: mpsc::Sender<InboundEvent>,
    bot_id: Arc<OnceLock<UserId>>,
    pending: PendingInteractions,
}

impl Handler {
    pub fn new(
        tx: mpsc::Sender<InboundEvent>,
        bot_id: Arc<OnceLock<UserId>>,
        pending: PendingInteractions,
    ) -> Self {
        Self {
            tx,
            bot_id,
            pending,
        }
    }

    async fn forward(&self, event: InboundEvent) {
        if self.tx.send(event).await.is_err() {
            warn!("inbound channel closed, dropping event");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let _ = self.bot_id.set(ready.user.id);
        ctx.set_presence(Some(ActivityData::custom(PRESENCE)), OnlineStatus::Online);

        match Command::set_global_commands(&ctx.http, commands::definitions()).await {
            Ok(registered) => debug!(count = registered.len(), "slash commands registered"),
            Err(e) => error!(error = %e, "failed to register slash commands"),
        }
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord gateway ready"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let mentions_bot = self
            .bot_id
            .get()
            .is_some_and(|id| msg.mentions_user_id(*id));

        let channel_name = match msg.channel_id.to_channel(&ctx).await {
            Ok(Channel::Guild(channel)) => Some(channel.name),
            _ => None,
        };

        let inbound = InboundMessage {
            id: MessageId(msg.id.to_string()),
            author_id: msg.author.id.to_string(),
            author_name: msg.author.name.clone(),
            channel_id: msg.channel_id.to_string(),
            channel_name,
            guild_id: msg.guild_id.map(|id| id.to_string()),
            text: msg.content.clone(),
            mentions_bot,
            attachments: download_attachments(&msg).await,
        };
        self.forward(InboundEvent::Message(inbound)).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        debug!(
            command = %command.data.name,
            user = %command.user.name,
            "slash command received"
        );

        let options = commands::options_from(&command.data);
        let kind = match commands::parse_command(&command.data.name, &options) {
            Ok(kind) => kind,
            Err(reason) => {
                if let Err(e) = answer(&ctx, &command, &reason).await {
                    warn!(error = %e, "failed to answer invalid command");
                }
                return;
            }
        };

        let member = command.member.as_deref();
        let invocation = CommandInvocation {
            interaction_id: command.id.to_string(),
            guild_id: command.guild_id.map(|id| id.to_string()),
            channel_id: command.channel_id.to_string(),
            invoker_id: command.user.id.to_string(),
            invoker_roles: member
                .map(|m| m.roles.iter().map(|r| r.to_string()).collect())
                .unwrap_or_default(),
            invoker_is_admin: member
                .and_then(|m| m.permissions)
                .is_some_and(|p| p.administrator()),
            kind,
        };

        self.pending
            .lock()
            .await
            .insert(invocation.interaction_id.clone(), command);
        self.forward(InboundEvent::Command(invocation)).await;
    }
}

/// Sends `text` as a private (ephemeral) answer to `command`.
pub async fn answer(
    cache_http: impl serenity::all::CacheHttp,
    command: &CommandInteraction,
    text: &str,
) -> serenity::Result<()> {
    let message = CreateInteractionResponseMessage::new()
        .content(text)
        .ephemeral(true);
    command
        .create_response(cache_http, CreateInteractionResponse::Message(message))
        .await
}

/// Downloads text and image attachments; others are skipped.
async fn download_attachments(msg: &Message) -> Vec<Attachment> {
    let mut out = Vec::new();
    for attachment in &msg.attachments {
        let mut converted = Attachment {
            filename: attachment.filename.clone(),
            content_type: attachment.content_type.clone(),
            data: Vec::new(),
        };
        if !converted.is_text_file() && !converted.is_image() {
            debug!(filename = %attachment.filename, "skipping unsupported attachment");
            continue;
        }
        match attachment.download().await {
            Ok(data) => {
                converted.data = data;
                out.push(converted);
            }
            Err(e) => warn!(filename = %attachment.filename, error = %e, "attachment download failed"),
        }
    }
    out
}
