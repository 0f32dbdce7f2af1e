// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-message context lifecycle.
//!
//! Every inbound message walks the same state machine:
//!
//! ```text
//! INTAKE -> BUDGET_ENFORCEMENT -> addressed to bot?
//!     no  -> PERSIST_AND_STOP
//!     yes -> CONFIG_RESOLUTION -> SYSTEM_PROMPT_SEED -> SUMMARIZATION_CHECK
//!            -> DISPATCH -> PERSIST_RESULT
//! ```
//!
//! Any failure after INTAKE moves to ROLLBACK_AND_PERSIST: the pending user
//! turn is removed, the remaining history is persisted, and the failure
//! reason is replied to the user.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ollabridge_config::BridgeConfig;
use ollabridge_context::{SummarizationPolicy, clean_message, enforce_budget, enforce_capacity};
use ollabridge_core::traits::{ChannelAdapter, InferenceBackend};
use ollabridge_core::types::{
    Attachment, ChatRequest, InboundMessage, Message, Role, SYSTEM_AUTHOR,
};
use ollabridge_core::{BridgeError, split_message};
use ollabridge_dispatch::RequestDispatcher;
use ollabridge_storage::{ChannelHistoryStore, ConfigStore, ResolvedConfig};
use strum::Display;
use tracing::{debug, info, warn};

use crate::respond::relay_stream;

/// States of one message cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CycleState {
    Intake,
    BudgetEnforcement,
    PersistAndStop,
    ConfigResolution,
    SystemPromptSeed,
    SummarizationCheck,
    Dispatch,
    PersistResult,
    RollbackAndPersist,
}

/// Why a message was dropped without touching history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnMessage,
    TooShort,
}

/// How a message cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Ignored(IgnoreReason),
    /// Stored without a reply because the bot was not mentioned.
    Stored,
    /// The backend answered with `text`, which was sent and persisted.
    Replied { text: String },
    /// `text` was delivered but saving the history failed, so the channel
    /// keeps its previous history. The user was told.
    Unsaved { text: String, reason: String },
    /// The backend produced nothing; history was left untouched.
    NoReply,
    /// The cycle failed and was rolled back; `reason` was sent to the user.
    Failed { reason: String },
}

/// Tunables for the lifecycle, normally taken from [`BridgeConfig`].
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub max_context_tokens: usize,
    pub min_message_chars: usize,
    pub stream_edit_interval: Duration,
    pub preference_attempts: u32,
    pub preference_retry_delay: Duration,
}

impl LifecycleSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            max_context_tokens: config.agent.max_context_tokens,
            min_message_chars: config.agent.min_message_chars,
            stream_edit_interval: config.discord.stream_edit_interval(),
            preference_attempts: config.preferences.max_attempts.max(1),
            preference_retry_delay: config.preferences.retry_delay(),
        }
    }
}

/// Formats a failure reason the way it is shown to users.
pub fn error_reply(reason: &str) -> String {
    format!("**Error Occurred:**\n\n**Reason:** {reason}")
}

/// Runs message cycles against shared stores, dispatcher, and adapters.
pub struct ContextLifecycle {
    history: ChannelHistoryStore,
    configs: ConfigStore,
    dispatcher: RequestDispatcher,
    backend: Arc<dyn InferenceBackend>,
    channel: Arc<dyn ChannelAdapter>,
    summarizer: SummarizationPolicy,
    settings: LifecycleSettings,
}

impl ContextLifecycle {
    pub fn new(
        history: ChannelHistoryStore,
        configs: ConfigStore,
        dispatcher: RequestDispatcher,
        backend: Arc<dyn InferenceBackend>,
        channel: Arc<dyn ChannelAdapter>,
        summarizer: SummarizationPolicy,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            history,
            configs,
            dispatcher,
            backend,
            channel,
            summarizer,
            settings,
        }
    }

    /// Processes one inbound message to completion.
    ///
    /// Only a failure to load the channel history is returned as an error;
    /// later failures are rolled back and reported through the channel.
    pub async fn handle_message(
        &self,
        message: &InboundMessage,
    ) -> Result<CycleOutcome, BridgeError> {
        let bot_id = self.channel.bot_user_id();
        if bot_id.as_deref() == Some(message.author_id.as_str()) {
            return Ok(CycleOutcome::Ignored(IgnoreReason::OwnMessage));
        }

        // INTAKE
        self.trace(message, CycleState::Intake);
        let cleaned = clean_message(&message.text, bot_id.as_deref());
        if cleaned.chars().count() < self.settings.min_message_chars {
            debug!(
                channel_id = %message.channel_id,
                author = %message.author_name,
                "message too short after cleaning, ignored"
            );
            return Ok(CycleOutcome::Ignored(IgnoreReason::TooShort));
        }
        let (content, images) = attachment_payload(cleaned, &message.attachments);

        let mut history = self.history.load(&message.channel_id).await?;
        if history.name.is_empty() {
            if let Some(name) = &message.channel_name {
                history.name = name.clone();
            }
        }

        // BUDGET_ENFORCEMENT
        self.trace(message, CycleState::BudgetEnforcement);
        enforce_budget(&mut history.messages, self.settings.max_context_tokens);
        history
            .messages
            .push(Message::user(content, images, message.author_id.clone()));

        if !message.mentions_bot {
            self.trace(message, CycleState::PersistAndStop);
            self.history.save(&history).await?;
            return Ok(CycleOutcome::Stored);
        }

        let mut working = std::mem::take(&mut history.messages);
        match self.respond(message, bot_id.as_deref(), &mut working).await {
            Ok(Some(text)) => {
                self.trace(message, CycleState::PersistResult);
                working.push(Message::assistant(text.clone()));
                history.messages = working;
                match self.history.save(&history).await {
                    Ok(()) => Ok(CycleOutcome::Replied { text }),
                    Err(e) => {
                        let reason = format!("the reply could not be saved to channel history: {e}");
                        warn!(channel_id = %message.channel_id, error = %e, "failed to persist reply");
                        if let Err(reply_err) = self.channel.reply(message, &error_reply(&reason)).await {
                            warn!(channel_id = %message.channel_id, error = %reply_err, "failed to report error");
                        }
                        Ok(CycleOutcome::Unsaved { text, reason })
                    }
                }
            }
            Ok(None) => {
                debug!(channel_id = %message.channel_id, "backend returned no content, nothing persisted");
                Ok(CycleOutcome::NoReply)
            }
            Err(e) => {
                self.trace(message, CycleState::RollbackAndPersist);
                let reason = e.to_string();
                warn!(
                    channel_id = %message.channel_id,
                    error = %reason,
                    "message cycle failed, rolling back"
                );
                remove_pending_turn(&mut working, &message.author_id);
                history.messages = working;
                if let Err(persist_err) = self.history.save(&history).await {
                    warn!(channel_id = %message.channel_id, error = %persist_err, "failed to persist rollback");
                }
                if let Err(reply_err) = self.channel.reply(message, &error_reply(&reason)).await {
                    warn!(channel_id = %message.channel_id, error = %reply_err, "failed to report error");
                }
                Ok(CycleOutcome::Failed { reason })
            }
        }
    }

    /// The addressed half of the cycle. `working` ends with the new user turn.
    ///
    /// Returns `Ok(None)` after removing the user turn when the backend
    /// produced no content.
    async fn respond(
        &self,
        message: &InboundMessage,
        bot_id: Option<&str>,
        working: &mut Vec<Message>,
    ) -> Result<Option<String>, BridgeError> {
        // CONFIG_RESOLUTION
        self.trace(message, CycleState::ConfigResolution);
        let resolved = self.resolve_with_retry(message).await?;
        if !resolved.chat_enabled {
            return Err(BridgeError::ChatDisabled);
        }

        // SYSTEM_PROMPT_SEED
        self.trace(message, CycleState::SystemPromptSeed);
        if let Some(prompt) = &resolved.system_prompt {
            let seeded = working.first().is_some_and(|m| m.role == Role::System);
            if !seeded {
                working.insert(
                    0,
                    Message::system(prompt.clone(), bot_id.unwrap_or(SYSTEM_AUTHOR)),
                );
            }
        }
        if let Some(capacity) = resolved.capacity {
            enforce_capacity(working, capacity);
        }

        let model = resolved.model.clone().ok_or(BridgeError::ModelMissing)?;

        // SUMMARIZATION_CHECK
        self.trace(message, CycleState::SummarizationCheck);
        let compacted = self
            .summarizer
            .summarize(working, &model, Arc::clone(&self.backend), &self.dispatcher)
            .await?;
        if let Some(compacted) = compacted {
            *working = compacted;
        }

        // DISPATCH
        self.trace(message, CycleState::Dispatch);
        if let Err(e) = self.channel.send_typing(&message.channel_id).await {
            debug!(error = %e, "typing indicator failed");
        }
        let reply = self.dispatch(message, &model, &resolved, working.clone()).await?;

        match reply {
            Some(text) if !text.trim().is_empty() => {
                info!(
                    channel_id = %message.channel_id,
                    model = %model,
                    reply_chars = text.chars().count(),
                    "reply sent"
                );
                Ok(Some(text))
            }
            _ => {
                remove_pending_turn(working, &message.author_id);
                Ok(None)
            }
        }
    }

    async fn dispatch(
        &self,
        message: &InboundMessage,
        model: &str,
        resolved: &ResolvedConfig,
        messages: Vec<Message>,
    ) -> Result<Option<String>, BridgeError> {
        let stream = resolved.stream && self.channel.capabilities().supports_edit;
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            stream,
        };
        let backend = Arc::clone(&self.backend);

        if stream {
            let channel = Arc::clone(&self.channel);
            let original = message.clone();
            let interval = self.settings.stream_edit_interval;
            return self
                .dispatcher
                .submit(async move {
                    let fragments = backend.chat_stream(request).await?;
                    relay_stream(channel, original, fragments, interval).await
                })
                .await;
        }

        let response = self
            .dispatcher
            .submit(async move { backend.chat(request).await })
            .await?;
        let Some(text) = response.content.filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };
        let limit = self.channel.capabilities().max_message_len;
        for chunk in split_message(&text, limit) {
            self.channel.reply(message, &chunk).await?;
        }
        Ok(Some(text))
    }

    async fn resolve_with_retry(
        &self,
        message: &InboundMessage,
    ) -> Result<ResolvedConfig, BridgeError> {
        // Direct messages have no server; the channel stands in for it.
        let server_id = message
            .guild_id
            .as_deref()
            .unwrap_or(message.channel_id.as_str());

        let attempts = self.settings.preference_attempts;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .configs
                .resolve_channel_config(server_id, &message.channel_id)
                .await
            {
                Ok(resolved) => return Ok(resolved),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        attempt,
                        channel_id = %message.channel_id,
                        error = %e,
                        "preference lookup failed, retrying"
                    );
                    tokio::time::sleep(self.settings.preference_retry_delay).await;
                }
                Err(e) if e.is_transient() => {
                    warn!(channel_id = %message.channel_id, error = %e, "preference lookup exhausted retries");
                    return Err(BridgeError::PreferencesUnavailable {
                        scope: "Channel".to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn trace(&self, message: &InboundMessage, state: CycleState) {
        debug!(
            channel_id = %message.channel_id,
            message_id = %message.id.0,
            state = %state,
            "lifecycle transition"
        );
    }
}

/// Inlines `.txt` attachments into the text and encodes images.
fn attachment_payload(mut text: String, attachments: &[Attachment]) -> (String, Vec<String>) {
    let mut images = Vec::new();
    for attachment in attachments {
        if attachment.is_text_file() {
            text.push(' ');
            text.push_str(&String::from_utf8_lossy(&attachment.data));
        } else if attachment.is_image() {
            images.push(BASE64.encode(&attachment.data));
        }
    }
    (text, images)
}

/// Removes the newest user turn by `author_id`.
fn remove_pending_turn(messages: &mut Vec<Message>, author_id: &str) {
    if let Some(idx) = messages
        .iter()
        .rposition(|m| m.role == Role::User && m.author_id == author_id)
    {
        messages.remove(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str, content_type: Option<&str>, data: &[u8]) -> Attachment {
        Attachment {
            filename: name.to_string(),
            content_type: content_type.map(str::to_string),
            data: data.to_vec(),
        }
    }

    #[test]
    fn states_display_snake_case() {
        assert_eq!(CycleState::BudgetEnforcement.to_string(), "budget_enforcement");
        assert_eq!(CycleState::RollbackAndPersist.to_string(), "rollback_and_persist");
    }

    #[test]
    fn error_reply_format() {
        assert_eq!(
            error_reply("boom"),
            "**Error Occurred:**\n\n**Reason:** boom"
        );
    }

    #[test]
    fn text_attachments_are_inlined_and_images_encoded() {
        let (text, images) = attachment_payload(
            "read this".to_string(),
            &[
                attachment("notes.txt", Some("text/plain"), b"file body"),
                attachment("cat.png", Some("image/png"), b"png"),
                attachment("dog.jpg", None, b"jpg"),
                attachment("archive.zip", Some("application/zip"), b"zip"),
            ],
        );
        assert_eq!(text, "read this file body");
        assert_eq!(images, vec![BASE64.encode(b"png"), BASE64.encode(b"jpg")]);
    }

    #[test]
    fn pending_turn_removal_targets_newest_by_author() {
        let mut messages = vec![
            Message::user("first", vec![], "a"),
            Message::assistant("reply"),
            Message::user("second", vec![], "a"),
            Message::user("other", vec![], "b"),
        ];
        remove_pending_turn(&mut messages, "a");
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "reply", "other"]);
    }
}
