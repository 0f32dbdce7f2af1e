// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::LazyLock;

use regex::Regex;

/// User mentions, with or without the nickname marker, plus the spaces
/// that follow them on the same line.
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@!?(\d+)>[ \t]*").unwrap());

/// Removes mentions of `bot_id` and trims the ends.
///
/// Line breaks and indentation inside the message are kept.
pub fn clean_message(text: &str, bot_id: Option<&str>) -> String {
    let stripped = match bot_id {
        Some(id) if !id.is_empty() => MENTION.replace_all(text, |caps: &regex::Captures<'_>| {
            if &caps[1] == id {
                String::new()
            } else {
                caps[0].to_string()
            }
        }),
        _ => std::borrow::Cow::Borrowed(text),
    };
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_both_mention_forms() {
        let cleaned = clean_message("<@123> hello <@!123>  there", Some("123"));
        assert_eq!(cleaned, "hello there");
    }

    #[test]
    fn keeps_other_users_mentions() {
        let cleaned = clean_message("<@123> ask <@999>", Some("123"));
        assert_eq!(cleaned, "ask <@999>");
    }

    #[test]
    fn keeps_line_breaks_and_indentation() {
        assert_eq!(clean_message("  a\n\n\tb  ", None), "a\n\n\tb");
        let code = "<@7> fix this:\n```\nfn main() {\n    run();\n}\n```";
        assert_eq!(
            clean_message(code, Some("7")),
            "fix this:\n```\nfn main() {\n    run();\n}\n```"
        );
    }

    #[test]
    fn mention_only_message_becomes_empty() {
        assert_eq!(clean_message("<@42>", Some("42")), "");
    }
}
