// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation, event, and adapter types used across the Ollabridge workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Author id recorded on synthetic system entries when no bot identity is known.
pub const SYSTEM_AUTHOR: &str = "system";

/// Author id recorded on assistant entries.
pub const ASSISTANT_AUTHOR: &str = "assistant";

/// Content prefix marking an assistant entry as a conversation summary.
pub const SUMMARY_PREFIX: &str = "SUMMARY: ";

/// Platform identifier for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Speaker of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn in a channel conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Base64-encoded images attached to this turn, in attachment order.
    #[serde(default)]
    pub images: Vec<String>,
    /// Author of the turn. Older history files call this `userId`.
    #[serde(default = "default_author", alias = "userId")]
    pub author_id: String,
}

fn default_author() -> String {
    SYSTEM_AUTHOR.to_string()
}

impl Message {
    pub fn system(content: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
            author_id: author_id.into(),
        }
    }

    pub fn user(content: impl Into<String>, images: Vec<String>, author_id: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images,
            author_id: author_id.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
            author_id: ASSISTANT_AUTHOR.to_string(),
        }
    }

    /// Builds the assistant entry that replaces summarized history.
    pub fn summary(summary_text: &str) -> Self {
        Self::assistant(format!("{SUMMARY_PREFIX}{summary_text}"))
    }

    /// Whether this entry is a summary produced by compression.
    pub fn is_summary(&self) -> bool {
        self.role == Role::Assistant && self.content.starts_with(SUMMARY_PREFIX)
    }
}

/// The durable record for one channel's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelHistory {
    /// Channel id.
    pub id: String,
    /// Display name of the channel, empty when unknown.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ChannelHistory {
    pub fn empty(channel_id: impl Into<String>) -> Self {
        Self {
            id: channel_id.into(),
            name: String::new(),
            messages: Vec::new(),
        }
    }
}

/// A file attached to an inbound message, already downloaded by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

impl Attachment {
    fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Plain-text files are inlined into the message text.
    pub fn is_text_file(&self) -> bool {
        self.extension().as_deref() == Some("txt")
    }

    /// Images are forwarded to the model as encoded image references.
    pub fn is_image(&self) -> bool {
        if let Some(ct) = &self.content_type {
            if ct.starts_with("image/") {
                return true;
            }
        }
        self.extension()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// A message event delivered by the messaging platform.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: MessageId,
    pub author_id: String,
    /// Human-readable author tag, used only in logs.
    pub author_name: String,
    pub channel_id: String,
    pub channel_name: Option<String>,
    /// Server (guild) id. `None` for direct messages.
    pub guild_id: Option<String>,
    pub text: String,
    /// Whether the bot user is among the message's mentions.
    pub mentions_bot: bool,
    pub attachments: Vec<Attachment>,
}

/// Administrative commands accepted from the platform's command surface.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum CommandKind {
    /// Server-wide chat on/off switch.
    ToggleChat { enabled: bool },
    /// Per-channel message-count capacity.
    ModifyCapacity { capacity: u32 },
    /// Per-channel streaming preference.
    MessageStream { enabled: bool },
    /// Server-wide system prompt inherited by new channels.
    SetSystemPrompt { prompt: String },
    /// Per-channel model.
    SwitchModel { model: String },
    /// Restrict a command to the listed role ids (empty list lifts the restriction).
    SetCommandRoles { command: String, roles: Vec<String> },
    /// Remove the invoker's messages from the channel history.
    ClearUserChannelHistory,
}

impl CommandKind {
    /// The slash-command name, e.g. `toggle-chat`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Every command name, in registration order.
    pub const NAMES: [&'static str; 7] = [
        "toggle-chat",
        "modify-capacity",
        "message-stream",
        "set-system-prompt",
        "switch-model",
        "set-command-roles",
        "clear-user-channel-history",
    ];

    /// Commands restricted to server administrators.
    pub const ADMIN_NAMES: [&'static str; 3] =
        ["toggle-chat", "set-system-prompt", "set-command-roles"];

    pub fn is_admin_only(&self) -> bool {
        Self::ADMIN_NAMES.contains(&self.name())
    }
}

/// A command invocation delivered by the messaging platform.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    /// Platform interaction id, used to answer the invocation.
    pub interaction_id: String,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub invoker_id: String,
    pub invoker_roles: Vec<String>,
    /// Whether the invoker holds the platform's administrator permission.
    pub invoker_is_admin: bool,
    pub kind: CommandKind,
}

/// Anything a channel adapter can deliver to the agent.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(InboundMessage),
    Command(CommandInvocation),
}

/// Capabilities reported by a channel adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCapabilities {
    /// Sent messages can be edited in place (needed for streamed replies).
    pub supports_edit: bool,
    /// Maximum characters per outbound message.
    pub max_message_len: usize,
}

/// A chat request to the inference backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

/// A complete (non-streamed) chat response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub model: String,
    /// `None` when the backend produced no message at all.
    pub content: Option<String>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Inference,
}
