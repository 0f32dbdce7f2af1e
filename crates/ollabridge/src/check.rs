// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ollabridge check` command implementation.
//!
//! Runs quick checks against the configuration, the data directory, and the
//! Ollama server so problems show up before `serve` is started.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use ollabridge_config::BridgeConfig;
use ollabridge_core::BridgeError;
use ollabridge_ollama::OllamaClient;

/// Status of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `ollabridge check` command. Fails when any check fails.
pub async fn run_check(config: &BridgeConfig, plain: bool) -> Result<(), BridgeError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = collect(config).await;

    println!();
    println!("  ollabridge check");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render(result, use_color));
    }
    println!();

    let failed = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    let warned = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warn)
        .count();
    if failed + warned == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {failed} failed, {warned} warning(s).");
    }
    println!();

    if failed > 0 {
        return Err(BridgeError::Internal(format!("{failed} check(s) failed")));
    }
    Ok(())
}

pub async fn collect(config: &BridgeConfig) -> Vec<CheckResult> {
    let mut results = vec![
        check_discord_token(config),
        check_data_dir(&config.storage.data_dir).await,
    ];
    results.extend(check_ollama(config).await);
    results
}

fn check_discord_token(config: &BridgeConfig) -> CheckResult {
    let start = Instant::now();
    match config.discord.bot_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => {
            CheckResult::new("Discord token", CheckStatus::Pass, "set", start)
        }
        _ => CheckResult::new(
            "Discord token",
            CheckStatus::Fail,
            "discord.bot_token is not set (required by serve)",
            start,
        ),
    }
}

async fn check_data_dir(dir: &Path) -> CheckResult {
    let start = Instant::now();
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        return CheckResult::new(
            "Data directory",
            CheckStatus::Fail,
            format!("cannot create {}: {e}", dir.display()),
            start,
        );
    }

    let probe = dir.join(format!(".ollabridge-probe-{}", std::process::id()));
    let outcome = match tokio::fs::write(&probe, b"probe").await {
        Ok(()) => CheckResult::new(
            "Data directory",
            CheckStatus::Pass,
            format!("{} is writable", dir.display()),
            start,
        ),
        Err(e) => CheckResult::new(
            "Data directory",
            CheckStatus::Fail,
            format!("{} is not writable: {e}", dir.display()),
            start,
        ),
    };
    let _ = tokio::fs::remove_file(&probe).await;
    outcome
}

async fn check_ollama(config: &BridgeConfig) -> Vec<CheckResult> {
    let start = Instant::now();
    let client = match OllamaClient::new(config.ollama.base_url(), Duration::from_secs(5)) {
        Ok(client) => client,
        Err(e) => return vec![CheckResult::new("Ollama", CheckStatus::Fail, e.to_string(), start)],
    };

    let models = match client.list_models().await {
        Ok(models) => models,
        Err(e) => return vec![CheckResult::new("Ollama", CheckStatus::Fail, e.to_string(), start)],
    };
    let reachable = CheckResult::new(
        "Ollama",
        CheckStatus::Pass,
        format!("{} reachable, {} model(s)", client.base_url(), models.len()),
        start,
    );

    let start = Instant::now();
    let wanted = config.agent.default_model.as_str();
    let installed = models
        .iter()
        .any(|name| name == wanted || name.strip_suffix(":latest") == Some(wanted));
    let model = if installed {
        CheckResult::new("Default model", CheckStatus::Pass, format!("{wanted} installed"), start)
    } else {
        CheckResult::new(
            "Default model",
            CheckStatus::Warn,
            format!("{wanted} not installed (run `ollama pull {wanted}`)"),
            start,
        )
    };
    vec![reachable, model]
}

fn render(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal().to_string()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow().to_string()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red().to_string()),
        };
        format!("    {symbol} {:<16} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<16} {} ({duration_ms}ms)", result.name, result.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, dir: &Path) -> BridgeConfig {
        let address = server.address();
        let mut config = BridgeConfig::default();
        config.ollama.host = address.ip().to_string();
        config.ollama.port = address.port();
        config.storage.data_dir = dir.to_path_buf();
        config.discord.bot_token = Some("token".into());
        config
    }

    async fn mount_tags(server: &MockServer, names: &[&str]) {
        let models: Vec<_> = names
            .iter()
            .map(|n| serde_json::json!({"name": n}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": models})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn all_checks_pass_with_installed_model() {
        let server = MockServer::start().await;
        mount_tags(&server, &["llama3.2:latest"]).await;
        let dir = tempfile::tempdir().unwrap();

        let results = collect(&config_for(&server, dir.path())).await;
        assert_eq!(results.len(), 4);
        assert!(
            results.iter().all(|r| r.status == CheckStatus::Pass),
            "{results:?}"
        );
    }

    #[tokio::test]
    async fn missing_model_is_a_warning() {
        let server = MockServer::start().await;
        mount_tags(&server, &["qwen2:7b"]).await;
        let dir = tempfile::tempdir().unwrap();

        let results = collect(&config_for(&server, dir.path())).await;
        let model = results.iter().find(|r| r.name == "Default model").unwrap();
        assert_eq!(model.status, CheckStatus::Warn);
        assert!(model.message.contains("ollama pull llama3.2"));
    }

    #[tokio::test]
    async fn missing_token_fails() {
        let server = MockServer::start().await;
        mount_tags(&server, &["llama3.2"]).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(&server, dir.path());
        config.discord.bot_token = None;

        let results = collect(&config).await;
        let token = results.iter().find(|r| r.name == "Discord token").unwrap();
        assert_eq!(token.status, CheckStatus::Fail);
        assert!(run_check(&config, true).await.is_err());
    }

    #[test]
    fn plain_rendering_uses_tags() {
        let result = CheckResult {
            name: "Ollama",
            status: CheckStatus::Warn,
            message: "slow".into(),
            duration: Duration::from_millis(3),
        };
        let line = render(&result, false);
        assert!(line.contains("[WARN]"));
        assert!(line.contains("slow (3ms)"));
    }
}
