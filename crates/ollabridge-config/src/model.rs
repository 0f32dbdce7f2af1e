// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default system prompt seeded into new servers and channels.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a discord assistant bot. Be helpful, informative, and engaging. Do not engage in any illegal, harmful, or inappropriate activities.";

/// Top-level process configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Bot identity and conversation defaults.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Discord gateway settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Ollama inference server settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Where channel histories and scope configs are persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Inference admission control.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Retry policy for server/channel preference lookups.
    #[serde(default)]
    pub preferences: PreferencesConfig,

    /// History summarization policy.
    #[serde(default)]
    pub summary: SummaryConfig,
}

/// Bot identity and process-wide conversation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the bot, used in logs.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Model used when neither the server nor the channel picks one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// System prompt seeded into servers and channels on first contact.
    /// An empty string disables seeding.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,

    /// Estimated-token ceiling for the accumulated channel history.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Messages shorter than this (after cleaning) are ignored.
    #[serde(default = "default_min_message_chars")]
    pub min_message_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            default_model: default_model(),
            system_prompt: default_system_prompt(),
            max_context_tokens: default_max_context_tokens(),
            min_message_chars: default_min_message_chars(),
        }
    }
}

fn default_agent_name() -> String {
    "ollabridge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_system_prompt() -> Option<String> {
    Some(DEFAULT_SYSTEM_PROMPT.to_string())
}

fn default_max_context_tokens() -> usize {
    4096
}

fn default_min_message_chars() -> usize {
    5
}

/// Discord gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    /// Bot token. Required by `serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Minimum delay between edits of a streamed reply.
    #[serde(default = "default_stream_edit_interval_ms")]
    pub stream_edit_interval_ms: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            stream_edit_interval_ms: default_stream_edit_interval_ms(),
        }
    }
}

impl DiscordConfig {
    pub fn stream_edit_interval(&self) -> Duration {
        Duration::from_millis(self.stream_edit_interval_ms)
    }
}

fn default_stream_edit_interval_ms() -> u64 {
    1000
}

/// Ollama server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_host")]
    pub host: String,

    #[serde(default = "default_ollama_port")]
    pub port: u16,

    /// HTTP timeout for a single chat round-trip.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            port: default_ollama_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl OllamaConfig {
    /// Base URL of the Ollama HTTP API, e.g. `http://127.0.0.1:11434`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn default_ollama_host() -> String {
    "127.0.0.1".to_string()
}

fn default_ollama_port() -> u16 {
    11434
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding `*-config.json` and `*-channel-context.json` documents.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Backoff between attempts to create a contended lock file.
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lock_retry_ms: default_lock_retry_ms(),
        }
    }
}

impl StorageConfig {
    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_lock_retry_ms() -> u64 {
    50
}

/// Inference admission control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum number of inference calls running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum time a request may wait in the queue before being rejected.
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queue_timeout_ms: default_queue_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_queue_timeout_ms() -> u64 {
    10_000
}

/// Retry policy for preference lookups.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PreferencesConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl PreferencesConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

/// History summarization policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    /// Summarize once the history holds more than this many entries.
    #[serde(default = "default_trigger_len")]
    pub trigger_len: usize,

    /// Non-summary entries kept verbatim after summarizing.
    #[serde(default = "default_retained_tail")]
    pub retained_tail: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            trigger_len: default_trigger_len(),
            retained_tail: default_retained_tail(),
        }
    }
}

fn default_trigger_len() -> usize {
    5
}

fn default_retained_tail() -> usize {
    3
}
