// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash-command definitions and conversion of invocations into
//! [`CommandKind`] values.

use ollabridge_core::types::CommandKind;
use serenity::all::{
    CommandData, CommandDataOptionValue, CommandOptionType, CreateCommand, CreateCommandOption,
    Permissions,
};

/// A slash-command option value, detached from the gateway model.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
}

/// The registered command set, in [`CommandKind::NAMES`] order.
pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("toggle-chat")
            .description("Toggle all chat features. Administrator only.")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Boolean,
                    "enabled",
                    "true = enabled, false = disabled",
                )
                .required(true),
            ),
        CreateCommand::new("modify-capacity")
            .description("Maximum number of messages the bot keeps for context in this channel.")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "context-capacity",
                    "number of messages to remember",
                )
                .required(true),
            ),
        CreateCommand::new("message-stream")
            .description("Stream replies as they are generated. Can be slow due to Discord limits.")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Boolean,
                    "stream",
                    "enable or disable message streaming",
                )
                .required(true),
            ),
        CreateCommand::new("set-system-prompt")
            .description("Set the system prompt applied to new channels. Administrator only.")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "prompt",
                    "system prompt text for new channels",
                )
                .required(true),
            ),
        CreateCommand::new("switch-model")
            .description("Switch the model used in this channel.")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "model",
                    "name of an installed Ollama model",
                )
                .required(true),
            ),
        CreateCommand::new("set-command-roles")
            .description("Restrict a command to members holding one of the given roles. Administrator only.")
            .add_option(command_choice_option())
            .add_option(CreateCommandOption::new(
                CommandOptionType::String,
                "roles",
                "role mentions or ids; leave empty to lift the restriction",
            )),
        CreateCommand::new("clear-user-channel-history")
            .description("Remove your messages from this channel's history."),
    ]
    .into_iter()
    .zip(CommandKind::NAMES)
    .map(|(command, name)| {
        if CommandKind::ADMIN_NAMES.contains(&name) {
            command.default_member_permissions(Permissions::ADMINISTRATOR)
        } else {
            command
        }
    })
    .collect()
}

fn command_choice_option() -> CreateCommandOption {
    let mut option = CreateCommandOption::new(
        CommandOptionType::String,
        "command",
        "command to restrict",
    )
    .required(true);
    for name in CommandKind::NAMES {
        option = option.add_string_choice(name, name);
    }
    option
}

/// Flattens the top-level options of an invocation.
pub fn options_from(data: &CommandData) -> Vec<(String, OptionValue)> {
    data.options
        .iter()
        .filter_map(|option| {
            let value = match &option.value {
                CommandDataOptionValue::Boolean(b) => OptionValue::Bool(*b),
                CommandDataOptionValue::Integer(i) => OptionValue::Int(*i),
                CommandDataOptionValue::Number(n) => OptionValue::Number(*n),
                CommandDataOptionValue::String(s) => OptionValue::Text(s.clone()),
                _ => return None,
            };
            Some((option.name.clone(), value))
        })
        .collect()
}

/// Builds the command for `name` from its options.
///
/// The error text is shown to the invoker as-is.
pub fn parse_command(name: &str, options: &[(String, OptionValue)]) -> Result<CommandKind, String> {
    let find = |key: &str| options.iter().find(|(k, _)| k == key).map(|(_, v)| v);

    match name {
        "toggle-chat" => Ok(CommandKind::ToggleChat {
            enabled: bool_option(find("enabled"), "enabled")?,
        }),
        "message-stream" => Ok(CommandKind::MessageStream {
            enabled: bool_option(find("stream"), "stream")?,
        }),
        "modify-capacity" => {
            let raw = match find("context-capacity") {
                Some(OptionValue::Int(i)) => *i as f64,
                Some(OptionValue::Number(n)) => *n,
                _ => return Err(missing("context-capacity")),
            };
            if raw < 1.0 || raw > f64::from(u32::MAX) {
                return Err("Capacity must be a positive number of messages.".to_string());
            }
            Ok(CommandKind::ModifyCapacity {
                capacity: raw as u32,
            })
        }
        "set-system-prompt" => Ok(CommandKind::SetSystemPrompt {
            prompt: text_option(find("prompt"), "prompt")?,
        }),
        "switch-model" => {
            let model = text_option(find("model"), "model")?;
            if model.trim().is_empty() {
                return Err("Please name a model.".to_string());
            }
            Ok(CommandKind::SwitchModel {
                model: model.trim().to_string(),
            })
        }
        "set-command-roles" => {
            let command = text_option(find("command"), "command")?;
            let roles = match find("roles") {
                Some(OptionValue::Text(text)) => parse_role_ids(text),
                _ => Vec::new(),
            };
            Ok(CommandKind::SetCommandRoles { command, roles })
        }
        "clear-user-channel-history" => Ok(CommandKind::ClearUserChannelHistory),
        other => Err(format!("Unknown command `{other}`.")),
    }
}

/// Extracts role ids from mentions (`<@&123>`) or bare ids.
pub fn parse_role_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();
    ids.dedup();
    ids
}

fn bool_option(value: Option<&OptionValue>, name: &str) -> Result<bool, String> {
    match value {
        Some(OptionValue::Bool(b)) => Ok(*b),
        _ => Err(missing(name)),
    }
}

fn text_option(value: Option<&OptionValue>, name: &str) -> Result<String, String> {
    match value {
        Some(OptionValue::Text(s)) => Ok(s.clone()),
        _ => Err(missing(name)),
    }
}

fn missing(name: &str) -> String {
    format!("Missing or invalid option `{name}`.")
}
