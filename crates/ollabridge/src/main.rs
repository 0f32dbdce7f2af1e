// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ollabridge - a Discord chat bot backed by a local Ollama server.
//!
//! This is the binary entry point.

mod check;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ollabridge_config::{BridgeConfig, ConfigError};

/// Ollabridge - a Discord chat bot backed by a local Ollama server.
#[derive(Parser, Debug)]
#[command(name = "ollabridge", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to Discord and serve chat requests.
    Serve,
    /// Validate configuration and probe the Ollama server.
    Check {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load(path: Option<&PathBuf>) -> Result<BridgeConfig, Vec<ConfigError>> {
    match path {
        Some(path) => ollabridge_config::load_and_validate_path(path),
        None => ollabridge_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            ollabridge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Check { plain }) => check::run_check(&config, plain).await,
        None => {
            println!("ollabridge: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
