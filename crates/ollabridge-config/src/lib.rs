// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process configuration for Ollabridge.
//!
//! Settings come from compiled defaults, up to three `ollabridge.toml` files
//! and `OLLABRIDGE_*` variables. Unknown keys are rejected and reported with
//! a suggestion when one is close.
//!
//! # Usage
//!
//! ```no_run
//! use ollabridge_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("default model: {}", config.agent.default_model);
//! ```

use std::path::{Path, PathBuf};

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::BridgeConfig;

/// Loads from the standard locations and validates.
pub fn load_and_validate() -> Result<BridgeConfig, Vec<ConfigError>> {
    checked(loader::load_config(), standard_sources)
}

/// Parses and validates a TOML document without consulting the filesystem.
pub fn load_and_validate_str(toml_content: &str) -> Result<BridgeConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Loads an explicit file (plus `OLLABRIDGE_*` overrides) and validates.
pub fn load_and_validate_path(path: &Path) -> Result<BridgeConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Validates a loaded config, or explains a failed load. Sources are only
/// read when there is an error to point into.
fn checked(
    loaded: Result<BridgeConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<BridgeConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

fn read_source(path: &Path) -> Option<(String, String)> {
    let content = std::fs::read_to_string(path).ok()?;
    Some((path.display().to_string(), content))
}

/// Every config file that `load_config` may have merged, keyed the way
/// figment reports its origin.
fn standard_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|dir| dir.join(loader::CONFIG_FILE_NAME))
        .unwrap_or_else(|_| PathBuf::from(loader::CONFIG_FILE_NAME));
    let user = dirs::config_dir().map(|dir| dir.join("ollabridge").join(loader::CONFIG_FILE_NAME));

    [Some(local), user, Some(PathBuf::from(loader::SYSTEM_CONFIG_PATH))]
        .into_iter()
        .flatten()
        .filter_map(|path| read_source(&path))
        .collect()
}
