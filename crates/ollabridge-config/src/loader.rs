// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ollabridge.toml` > `~/.config/ollabridge/ollabridge.toml`
//! > `/etc/ollabridge/ollabridge.toml` with environment variable overrides via the
//! `OLLABRIDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use tracing::debug;

use crate::model::BridgeConfig;

/// Config file name searched in each hierarchy level.
pub const CONFIG_FILE_NAME: &str = "ollabridge.toml";

/// System-wide config path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/ollabridge/ollabridge.toml";

/// Sections that env var names are mapped onto, in match order.
const ENV_SECTIONS: &[&str] = &[
    "agent",
    "discord",
    "ollama",
    "storage",
    "dispatch",
    "preferences",
    "summary",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ollabridge/ollabridge.toml`
/// 3. `~/.config/ollabridge/ollabridge.toml`
/// 4. `./ollabridge.toml`
/// 5. `OLLABRIDGE_*` environment variables
pub fn load_config() -> Result<BridgeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading before extraction.
pub fn build_figment() -> Figment {
    let user = dirs::config_dir()
        .map(|d| d.join("ollabridge").join(CONFIG_FILE_NAME))
        .unwrap_or_default();
    let files = [
        PathBuf::from(SYSTEM_CONFIG_PATH),
        user,
        PathBuf::from(CONFIG_FILE_NAME),
    ];

    let mut figment = Figment::new().merge(Serialized::defaults(BridgeConfig::default()));
    for file in &files {
        if file.is_file() {
            debug!(path = %file.display(), "merging config file");
        }
        figment = figment.merge(Toml::file(file));
    }
    figment.merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `OLLABRIDGE_DISCORD_BOT_TOKEN` must become `discord.bot_token`,
/// not `discord.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("OLLABRIDGE_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name onto a dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
