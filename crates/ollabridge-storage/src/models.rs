// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed per-scope configuration documents and the precedence merge.
//!
//! A document on disk looks like `{ "name": "...", "options": { ... } }`
//! with camelCase option keys. Every option is optional so that a document
//! only records what was explicitly set for its scope.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use ollabridge_core::types::{ChannelHistory, Message};

/// Which namespace a config document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Server,
    Channel,
}

impl ScopeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Server => "Server",
            Self::Channel => "Channel",
        }
    }

    fn file_suffix(self) -> &'static str {
        match self {
            Self::Server => "server-config.json",
            Self::Channel => "channel-config.json",
        }
    }
}

/// A configuration namespace: one server (guild) or one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub kind: ScopeKind,
    pub id: String,
}

impl Scope {
    pub fn server(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Server,
            id: id.into(),
        }
    }

    pub fn channel(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Channel,
            id: id.into(),
        }
    }

    /// File name of this scope's document inside the data directory.
    pub fn file_name(&self) -> String {
        format!("{}-{}", self.id, self.kind.file_suffix())
    }
}

/// Options stored for one kind of scope.
pub trait ScopeOptions:
    Serialize + DeserializeOwned + Default + Clone + PartialEq + Send + Sync + 'static
{
    const KIND: ScopeKind;
    const RECORD_NAME: &'static str;

    /// Overwrites only the keys that `patch` sets.
    fn merge(&mut self, patch: Self);
}

/// Server-wide options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle_chat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Command name -> role ids allowed to run it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_roles: Option<BTreeMap<String, Vec<String>>>,
}

impl ScopeOptions for ServerOptions {
    const KIND: ScopeKind = ScopeKind::Server;
    const RECORD_NAME: &'static str = "Server Configurations";

    fn merge(&mut self, patch: Self) {
        if patch.toggle_chat.is_some() {
            self.toggle_chat = patch.toggle_chat;
        }
        if patch.system_prompt.is_some() {
            self.system_prompt = patch.system_prompt;
        }
        if let Some(patch_roles) = patch.command_roles {
            // Role gates merge per command so setting one leaves the others.
            let roles = self.command_roles.get_or_insert_with(BTreeMap::new);
            for (command, allowed) in patch_roles {
                if allowed.is_empty() {
                    roles.remove(&command);
                } else {
                    roles.insert(command, allowed);
                }
            }
        }
    }
}

/// Per-channel options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<u32>,
}

impl ScopeOptions for ChannelOptions {
    const KIND: ScopeKind = ScopeKind::Channel;
    const RECORD_NAME: &'static str = "Channel Configurations";

    fn merge(&mut self, patch: Self) {
        let Self {
            message_stream,
            modify_capacity,
            switch_model,
            system_prompt,
            max_messages,
        } = patch;
        if message_stream.is_some() {
            self.message_stream = message_stream;
        }
        if modify_capacity.is_some() {
            self.modify_capacity = modify_capacity;
        }
        if switch_model.is_some() {
            self.switch_model = switch_model;
        }
        if system_prompt.is_some() {
            self.system_prompt = system_prompt;
        }
        if max_messages.is_some() {
            self.max_messages = max_messages;
        }
    }
}

/// A persisted config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord<O> {
    pub name: String,
    #[serde(default)]
    pub options: O,
}

impl<O: ScopeOptions> ConfigRecord<O> {
    pub fn new(options: O) -> Self {
        Self {
            name: O::RECORD_NAME.to_string(),
            options,
        }
    }
}

/// Process-wide fallbacks, the lowest precedence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDefaults {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

/// Effective configuration for one channel after layering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    pub chat_enabled: bool,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub stream: bool,
    /// Maximum number of history entries kept for the channel.
    pub capacity: Option<usize>,
    pub command_roles: BTreeMap<String, Vec<String>>,
}

/// Layers channel over server over defaults.
///
/// Empty strings count as unset so a cleared model or prompt falls
/// through to the next layer.
pub fn resolve(
    defaults: &ConfigDefaults,
    server: &ServerOptions,
    channel: &ChannelOptions,
) -> ResolvedConfig {
    fn non_empty(value: &Option<String>) -> Option<String> {
        value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
    }

    ResolvedConfig {
        chat_enabled: server.toggle_chat.unwrap_or(true),
        model: non_empty(&channel.switch_model).or_else(|| non_empty(&defaults.model)),
        system_prompt: non_empty(&channel.system_prompt)
            .or_else(|| non_empty(&server.system_prompt))
            .or_else(|| non_empty(&defaults.system_prompt)),
        stream: channel.message_stream.unwrap_or(false),
        capacity: channel
            .modify_capacity
            .or(channel.max_messages)
            .map(|c| c as usize),
        command_roles: server.command_roles.clone().unwrap_or_default(),
    }
}
