// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::BridgeConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.dispatch.concurrency == 0 {
        fail("dispatch.concurrency must be at least 1".to_string());
    }

    if config.dispatch.queue_timeout_ms == 0 {
        fail("dispatch.queue_timeout_ms must be greater than 0".to_string());
    }

    if config.agent.max_context_tokens == 0 {
        fail("agent.max_context_tokens must be greater than 0".to_string());
    }

    if config.agent.default_model.trim().is_empty() {
        fail("agent.default_model must not be empty".to_string());
    }

    if config.preferences.max_attempts == 0 {
        fail("preferences.max_attempts must be at least 1".to_string());
    }

    if config.storage.data_dir.as_os_str().is_empty() {
        fail("storage.data_dir must not be empty".to_string());
    }

    if config.summary.retained_tail == 0 {
        fail("summary.retained_tail must be at least 1".to_string());
    }

    if config.summary.trigger_len <= config.summary.retained_tail {
        fail(format!(
            "summary.trigger_len ({}) must be greater than summary.retained_tail ({})",
            config.summary.trigger_len, config.summary.retained_tail
        ));
    }

    if config.ollama.host.trim().is_empty() {
        fail("ollama.host must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
