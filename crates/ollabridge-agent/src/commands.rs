// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative commands: permission gates plus config store updates.

use std::collections::BTreeMap;

use ollabridge_core::BridgeError;
use ollabridge_core::types::{CommandInvocation, CommandKind};
use ollabridge_storage::{ChannelHistoryStore, ChannelOptions, ConfigStore, ServerOptions};
use tracing::info;

/// Executes command invocations against the stores.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    configs: ConfigStore,
    history: ChannelHistoryStore,
}

impl CommandExecutor {
    pub fn new(configs: ConfigStore, history: ChannelHistoryStore) -> Self {
        Self { configs, history }
    }

    /// Runs `invocation` and returns the text to show the invoker.
    ///
    /// Permission denials are answers, not errors; only storage failures
    /// are returned as `Err`.
    pub async fn execute(&self, invocation: &CommandInvocation) -> Result<String, BridgeError> {
        let name = invocation.kind.name();

        if invocation.kind.is_admin_only() && !invocation.invoker_is_admin {
            return Ok(format!(
                "{name} is an admin command. Please contact an admin to use this command for you."
            ));
        }

        if let Some(guild_id) = &invocation.guild_id {
            let required = self
                .configs
                .get::<ServerOptions>(guild_id)
                .await?
                .and_then(|record| record.options.command_roles)
                .and_then(|mut roles| roles.remove(name))
                .unwrap_or_default();
            let allowed = required.is_empty()
                || required
                    .iter()
                    .any(|role| invocation.invoker_roles.contains(role));
            if !allowed {
                return Ok("You do not have the required role for this command.".to_string());
            }
        }

        let reply = match &invocation.kind {
            CommandKind::ToggleChat { enabled } => {
                let Some(guild_id) = &invocation.guild_id else {
                    return Ok(server_only(name));
                };
                self.configs
                    .update(
                        guild_id,
                        ServerOptions {
                            toggle_chat: Some(*enabled),
                            ..Default::default()
                        },
                    )
                    .await?;
                format!(
                    "Chat is now **{}**.",
                    if *enabled { "enabled" } else { "disabled" }
                )
            }
            CommandKind::ModifyCapacity { capacity } => {
                self.update_channel(
                    invocation,
                    ChannelOptions {
                        modify_capacity: Some(*capacity),
                        ..Default::default()
                    },
                )
                .await?;
                format!("Max message history for this channel is now set to `{capacity}`")
            }
            CommandKind::MessageStream { enabled } => {
                self.update_channel(
                    invocation,
                    ChannelOptions {
                        message_stream: Some(*enabled),
                        ..Default::default()
                    },
                )
                .await?;
                format!("Message streaming for this channel is now set to: `{enabled}`")
            }
            CommandKind::SwitchModel { model } => {
                let model = model.trim();
                if model.is_empty() {
                    return Ok("Please provide a model name.".to_string());
                }
                self.update_channel(
                    invocation,
                    ChannelOptions {
                        switch_model: Some(model.to_string()),
                        ..Default::default()
                    },
                )
                .await?;
                format!("This channel now uses the model `{model}`.")
            }
            CommandKind::SetSystemPrompt { prompt } => {
                let Some(guild_id) = &invocation.guild_id else {
                    return Ok(server_only(name));
                };
                self.configs
                    .update(
                        guild_id,
                        ServerOptions {
                            system_prompt: Some(prompt.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
                "Server system prompt was set. New channels will inherit this prompt.".to_string()
            }
            CommandKind::SetCommandRoles { command, roles } => {
                let Some(guild_id) = &invocation.guild_id else {
                    return Ok(server_only(name));
                };
                if !CommandKind::NAMES.contains(&command.as_str()) {
                    return Ok(format!("Unknown command `{command}`."));
                }
                self.configs
                    .update(
                        guild_id,
                        ServerOptions {
                            command_roles: Some(BTreeMap::from([(command.clone(), roles.clone())])),
                            ..Default::default()
                        },
                    )
                    .await?;
                if roles.is_empty() {
                    format!("`{command}` is no longer restricted by role.")
                } else {
                    format!("`{command}` is now restricted to {} role(s).", roles.len())
                }
            }
            CommandKind::ClearUserChannelHistory => {
                let removed = self
                    .history
                    .clear_user_messages(&invocation.channel_id, &invocation.invoker_id)
                    .await?;
                if removed {
                    "Your messages were removed from this channel's history.".to_string()
                } else {
                    "There were no messages of yours to remove in this channel.".to_string()
                }
            }
        };

        info!(
            command = name,
            invoker = %invocation.invoker_id,
            channel_id = %invocation.channel_id,
            "command executed"
        );
        Ok(reply)
    }

    async fn update_channel(
        &self,
        invocation: &CommandInvocation,
        patch: ChannelOptions,
    ) -> Result<(), BridgeError> {
        self.configs
            .update(&invocation.channel_id, patch)
            .await
            .map(|_| ())
    }
}

fn server_only(name: &str) -> String {
    format!("{name} can only be used in a server.")
}
