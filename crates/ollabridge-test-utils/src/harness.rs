// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration tests.
//!
//! `TestHarness` owns a temp data directory and wires both stores, a
//! dispatcher, and the mock adapters from one [`BridgeConfig`] tuned for
//! fast tests (short lock and retry delays, no stream throttling).

use std::sync::Arc;
use std::time::Duration;

use ollabridge_config::BridgeConfig;
use ollabridge_core::types::{InboundMessage, MessageId};
use ollabridge_core::BridgeError;
use ollabridge_dispatch::RequestDispatcher;
use ollabridge_storage::{ChannelHistoryStore, ConfigDefaults, ConfigStore, FileLock};
use tempfile::TempDir;

use crate::mock_backend::MockBackend;
use crate::mock_channel::MockChannel;

/// Guild id used by [`inbound_message`].
pub const TEST_GUILD: &str = "guild-1";

/// Builds a guild text message from `author_id` in `channel_id`.
pub fn inbound_message(
    channel_id: &str,
    author_id: &str,
    text: &str,
    mentions_bot: bool,
) -> InboundMessage {
    InboundMessage {
        id: MessageId(format!("in-{}", uuid::Uuid::new_v4())),
        author_id: author_id.to_string(),
        author_name: format!("user-{author_id}"),
        channel_id: channel_id.to_string(),
        channel_name: Some(format!("chan-{channel_id}")),
        guild_id: Some(TEST_GUILD.to_string()),
        text: text.to_string(),
        mentions_bot,
        attachments: Vec::new(),
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    system_prompt: Option<Option<String>>,
    concurrency: usize,
    backend_latency: Duration,
    max_context_tokens: Option<usize>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            system_prompt: None,
            concurrency: 2,
            backend_latency: Duration::ZERO,
            max_context_tokens: None,
        }
    }

    /// Set mock backend responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Set the process-wide system prompt; `None` disables seeding.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_backend_latency(mut self, latency: Duration) -> Self {
        self.backend_latency = latency;
        self
    }

    pub fn with_max_context_tokens(mut self, max: usize) -> Self {
        self.max_context_tokens = Some(max);
        self
    }

    pub fn build(self) -> Result<TestHarness, BridgeError> {
        let dir = TempDir::new().map_err(BridgeError::storage)?;

        let mut config = BridgeConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.storage.lock_retry_ms = 2;
        config.preferences.retry_delay_ms = 5;
        config.discord.stream_edit_interval_ms = 0;
        config.dispatch.concurrency = self.concurrency;
        if let Some(prompt) = self.system_prompt {
            config.agent.system_prompt = prompt;
        }
        if let Some(max) = self.max_context_tokens {
            config.agent.max_context_tokens = max;
        }

        let lock = FileLock::new(config.storage.lock_retry());
        let history = ChannelHistoryStore::new(dir.path(), lock);
        let configs = ConfigStore::new(
            dir.path(),
            lock,
            ConfigDefaults {
                model: Some(config.agent.default_model.clone()),
                system_prompt: config.agent.system_prompt.clone(),
            },
        );
        let dispatcher =
            RequestDispatcher::new(config.dispatch.concurrency, config.dispatch.queue_timeout());

        let backend = Arc::new(
            MockBackend::with_responses(self.responses).with_latency(self.backend_latency),
        );
        let channel = Arc::new(MockChannel::new());

        Ok(TestHarness {
            _dir: dir,
            config,
            history,
            configs,
            dispatcher,
            backend,
            channel,
        })
    }
}

/// A complete set of collaborators rooted in a temp directory.
pub struct TestHarness {
    _dir: TempDir,
    pub config: BridgeConfig,
    pub history: ChannelHistoryStore,
    pub configs: ConfigStore,
    pub dispatcher: RequestDispatcher,
    pub backend: Arc<MockBackend>,
    pub channel: Arc<MockChannel>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }
}
