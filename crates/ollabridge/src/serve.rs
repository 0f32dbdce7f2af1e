// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ollabridge serve` command implementation.
//!
//! Builds the stores, the request dispatcher, the Ollama backend, and the
//! Discord channel from one [`BridgeConfig`], then runs the agent loop
//! until a shutdown signal arrives or the gateway closes.

use std::sync::Arc;

use ollabridge_agent::shutdown;
use ollabridge_agent::{AgentLoop, CommandExecutor, ContextLifecycle, LifecycleSettings};
use ollabridge_config::BridgeConfig;
use ollabridge_context::SummarizationPolicy;
use ollabridge_core::BridgeError;
use ollabridge_core::traits::{ChannelAdapter, InferenceBackend, PluginAdapter};
use ollabridge_core::types::HealthStatus;
use ollabridge_discord::DiscordChannel;
use ollabridge_dispatch::RequestDispatcher;
use ollabridge_ollama::OllamaBackend;
use ollabridge_storage::{ChannelHistoryStore, ConfigDefaults, ConfigStore, FileLock};
use tracing::{info, warn};

/// Process-wide fallbacks for unset preferences.
///
/// A blank configured prompt disables system-prompt seeding.
pub fn config_defaults(config: &BridgeConfig) -> ConfigDefaults {
    ConfigDefaults {
        model: Some(config.agent.default_model.trim().to_string()).filter(|m| !m.is_empty()),
        system_prompt: config
            .agent
            .system_prompt
            .clone()
            .filter(|p| !p.trim().is_empty()),
    }
}

/// Runs the `ollabridge serve` command.
pub async fn run_serve(config: BridgeConfig) -> Result<(), BridgeError> {
    init_tracing(&config.agent.log_level);
    info!(name = %config.agent.name, "starting ollabridge serve");

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .map_err(BridgeError::storage)?;

    let lock = FileLock::new(config.storage.lock_retry());
    let history = ChannelHistoryStore::new(&config.storage.data_dir, lock);
    let configs = ConfigStore::new(&config.storage.data_dir, lock, config_defaults(&config));
    info!(data_dir = %config.storage.data_dir.display(), "stores initialized");

    let dispatcher = RequestDispatcher::new(
        config.dispatch.concurrency,
        config.dispatch.queue_timeout(),
    );

    let backend = Arc::new(OllamaBackend::new(&config.ollama)?);
    match backend.health_check().await? {
        HealthStatus::Healthy => info!("ollama server reachable"),
        HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
            // The bot still starts; cycles report the failure to users.
            warn!(reason = %reason, "ollama server not ready");
        }
    }

    let channel = Arc::new(DiscordChannel::new(&config.discord)?);
    channel.connect().await?;

    let backend: Arc<dyn InferenceBackend> = backend;
    let channel: Arc<dyn ChannelAdapter> = channel;

    let lifecycle = ContextLifecycle::new(
        history.clone(),
        configs.clone(),
        dispatcher,
        backend,
        Arc::clone(&channel),
        SummarizationPolicy::new(config.summary.trigger_len, config.summary.retained_tail),
        LifecycleSettings::from_config(&config),
    );
    let commands = CommandExecutor::new(configs, history);

    let cancel = shutdown::install_signal_handler();
    let mut agent_loop = AgentLoop::new(channel, Arc::new(lifecycle), Arc::new(commands));
    agent_loop.run(cancel).await?;

    info!("ollabridge serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ollabridge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
