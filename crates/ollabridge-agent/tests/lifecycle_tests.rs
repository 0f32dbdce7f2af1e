// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end message cycle tests against mock adapters and temp storage.

use std::time::Duration;

use ollabridge_agent::lifecycle::IgnoreReason;
use ollabridge_agent::{ContextLifecycle, CycleOutcome, LifecycleSettings};
use ollabridge_context::SummarizationPolicy;
use ollabridge_core::types::{Message, Role};
use ollabridge_storage::{
    ChannelOptions, ConfigDefaults, ConfigStore, FileLock, ServerOptions,
};
use ollabridge_test_utils::{MockReply, TestHarness, inbound_message};
use ollabridge_test_utils::harness::TEST_GUILD;
use ollabridge_test_utils::mock_channel::MOCK_BOT_ID;

fn lifecycle_with(harness: &TestHarness, configs: ConfigStore) -> ContextLifecycle {
    ContextLifecycle::new(
        harness.history.clone(),
        configs,
        harness.dispatcher.clone(),
        harness.backend.clone(),
        harness.channel.clone(),
        SummarizationPolicy::new(
            harness.config.summary.trigger_len,
            harness.config.summary.retained_tail,
        ),
        LifecycleSettings::from_config(&harness.config),
    )
}

fn lifecycle(harness: &TestHarness) -> ContextLifecycle {
    lifecycle_with(harness, harness.configs.clone())
}

fn mention(text: &str) -> String {
    format!("<@{MOCK_BOT_ID}> {text}")
}

#[tokio::test]
async fn short_message_is_a_silent_no_op() {
    let harness = TestHarness::builder().build().unwrap();
    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("hey"), true))
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Ignored(IgnoreReason::TooShort));
    assert!(!harness.history.path_for("c1").exists());
    assert_eq!(harness.backend.request_count().await, 0);
    assert!(harness.channel.replies().await.is_empty());
}

#[tokio::test]
async fn bot_own_messages_are_ignored() {
    let harness = TestHarness::builder().build().unwrap();
    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", MOCK_BOT_ID, "talking to myself", false))
        .await
        .unwrap();
    assert_eq!(outcome, CycleOutcome::Ignored(IgnoreReason::OwnMessage));
}

#[tokio::test]
async fn unaddressed_message_is_stored_without_inference() {
    let harness = TestHarness::builder().build().unwrap();
    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", "just chatting here", false))
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Stored);
    let stored = harness.history.load("c1").await.unwrap();
    assert_eq!(stored.name, "chan-c1");
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].content, "just chatting here");
    assert_eq!(harness.backend.request_count().await, 0);
}

#[tokio::test]
async fn multi_line_messages_keep_their_line_breaks() {
    let harness = TestHarness::builder().build().unwrap();
    let text = "steps:\n1. build\n2. deploy";
    lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", text, false))
        .await
        .unwrap();

    let stored = harness.history.get_history("c1").await.unwrap();
    assert_eq!(stored[0].content, text);
}

#[tokio::test]
async fn addressed_message_gets_reply_and_persists() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Hi! How can I help?".into()])
        .build()
        .unwrap();

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("hello there"), true))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Replied {
            text: "Hi! How can I help?".into()
        }
    );
    assert_eq!(
        harness.channel.reply_texts().await,
        vec!["Hi! How can I help?".to_string()]
    );

    let requests = harness.backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "llama3.2");
    assert!(!requests[0].stream);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].messages[0].author_id, MOCK_BOT_ID);
    assert_eq!(requests[0].messages[1].content, "hello there");

    let stored = harness.history.get_history("c1").await.unwrap();
    let roles: Vec<Role> = stored.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(stored[2].content, "Hi! How can I help?");
}

#[tokio::test]
async fn disabled_chat_rolls_back_the_user_turn() {
    let harness = TestHarness::builder().build().unwrap();
    harness
        .history
        .write_history("c1", vec![Message::user("earlier message", vec![], "u2")])
        .await
        .unwrap();
    harness
        .configs
        .update(
            TEST_GUILD,
            ServerOptions {
                toggle_chat: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("are you there?"), true))
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Failed { reason } => assert!(reason.contains("disabled")),
        other => panic!("expected failure, got {other:?}"),
    }
    let stored = harness.history.get_history("c1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "earlier message");
    assert_eq!(harness.backend.request_count().await, 0);

    let replies = harness.channel.reply_texts().await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].starts_with("**Error Occurred:**\n\n**Reason:** "));
    assert!(replies[0].contains("disabled"));
}

#[tokio::test]
async fn backend_failure_is_reported_verbatim() {
    let harness = TestHarness::builder().build().unwrap();
    harness.backend.push_error("model 'ghost' not found").await;

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("summon the ghost"), true))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Failed {
            reason: "model 'ghost' not found".into()
        }
    );
    let stored = harness.history.get_history("c1").await.unwrap();
    assert!(stored.iter().all(|m| m.role != Role::User));
    assert_eq!(
        harness.channel.reply_texts().await,
        vec!["**Error Occurred:**\n\n**Reason:** model 'ghost' not found".to_string()]
    );
}

#[tokio::test]
async fn empty_backend_result_changes_nothing() {
    let harness = TestHarness::builder().build().unwrap();
    let before = vec![Message::user("older text", vec![], "u2")];
    harness
        .history
        .write_history("c1", before.clone())
        .await
        .unwrap();
    harness.backend.push_reply(MockReply::Empty).await;

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("say nothing"), true))
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::NoReply);
    assert_eq!(harness.history.get_history("c1").await.unwrap(), before);
    assert!(harness.channel.replies().await.is_empty());
}

#[tokio::test]
async fn missing_model_names_the_command() {
    let harness = TestHarness::builder().build().unwrap();
    let configs = ConfigStore::new(
        harness.config.storage.data_dir.clone(),
        FileLock::default(),
        ConfigDefaults {
            model: None,
            system_prompt: None,
        },
    );

    let outcome = lifecycle_with(&harness, configs)
        .handle_message(&inbound_message("c1", "u1", &mention("which model?"), true))
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Failed { reason } => assert!(reason.contains("/switch-model")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(harness.backend.request_count().await, 0);
}

#[tokio::test]
async fn five_entries_do_not_summarize() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["plain answer".into()])
        .build()
        .unwrap();
    harness
        .history
        .write_history(
            "c1",
            vec![
                Message::system("seeded prompt", MOCK_BOT_ID),
                Message::user("question one", vec![], "u1"),
                Message::assistant("answer one"),
                Message::user("question two", vec![], "u1"),
            ],
        )
        .await
        .unwrap();

    lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("question three"), true))
        .await
        .unwrap();

    let requests = harness.backend.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages.len(), 5);
    assert_eq!(harness.history.get_history("c1").await.unwrap().len(), 6);
}

#[tokio::test]
async fn six_entries_summarize_through_the_backend() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["- user asks many questions".into(), "final answer".into()])
        .build()
        .unwrap();
    harness
        .history
        .write_history(
            "c1",
            vec![
                Message::system("seeded prompt", MOCK_BOT_ID),
                Message::user("question one", vec![], "u1"),
                Message::assistant("answer one"),
                Message::user("question two", vec![], "u1"),
                Message::assistant("answer two"),
            ],
        )
        .await
        .unwrap();

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("question three"), true))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Replied {
            text: "final answer".into()
        }
    );

    let requests = harness.backend.requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].messages[1].content.contains("question one"));

    let chat = &requests[1].messages;
    assert_eq!(chat.len(), 5);
    assert_eq!(chat[0].content, "seeded prompt");
    assert_eq!(chat[1].content, "SUMMARY: - user asks many questions");
    assert_eq!(chat[2].content, "question two");
    assert_eq!(chat[3].content, "answer two");
    assert_eq!(chat[4].content, "question three");

    let stored = harness.history.get_history("c1").await.unwrap();
    assert_eq!(stored.len(), 6);
    assert!(stored[1].is_summary());
    assert_eq!(stored[5].content, "final answer");
    assert_eq!(harness.dispatcher.snapshot().completed, 2);
}

#[tokio::test]
async fn failed_summary_keeps_prior_history() {
    let harness = TestHarness::builder().build().unwrap();
    let before = vec![
        Message::system("seeded prompt", MOCK_BOT_ID),
        Message::user("question one", vec![], "u1"),
        Message::assistant("answer one"),
        Message::user("question two", vec![], "u1"),
        Message::assistant("answer two"),
    ];
    harness
        .history
        .write_history("c1", before.clone())
        .await
        .unwrap();
    harness.backend.push_error("summarizer down").await;

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("question three"), true))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Failed {
            reason: "summarizer down".into()
        }
    );
    assert_eq!(harness.history.get_history("c1").await.unwrap(), before);
    assert_eq!(harness.backend.request_count().await, 1);
}

#[tokio::test]
async fn unsaved_reply_is_reported() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["delivered anyway".into()])
        .with_backend_latency(Duration::from_millis(200))
        .build()
        .unwrap();
    let path = harness.history.path_for("c1");

    // A directory in place of the history file makes the final rename fail.
    let blocker = path.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tokio::fs::remove_file(&blocker).await;
        tokio::fs::create_dir_all(&blocker).await.unwrap();
    });

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("remember this"), true))
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Unsaved { text, reason } => {
            assert_eq!(text, "delivered anyway");
            assert!(reason.contains("could not be saved"));
        }
        other => panic!("expected an unsaved reply, got {other:?}"),
    }
    let replies = harness.channel.reply_texts().await;
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], "delivered anyway");
    assert!(replies[1].starts_with("**Error Occurred:**"));
}

#[tokio::test]
async fn budget_evicts_oldest_entries_first() {
    let harness = TestHarness::builder()
        .with_max_context_tokens(6)
        .build()
        .unwrap();
    harness
        .history
        .write_history(
            "c1",
            vec![
                Message::user("one two three", vec![], "u1"),
                Message::user("four five six", vec![], "u1"),
                Message::user("seven eight nine", vec![], "u1"),
            ],
        )
        .await
        .unwrap();

    lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", "ten eleven twelve", false))
        .await
        .unwrap();

    let contents: Vec<String> = harness
        .history
        .get_history("c1")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(
        contents,
        vec!["four five six", "seven eight nine", "ten eleven twelve"]
    );
}

#[tokio::test]
async fn channel_capacity_caps_working_history() {
    let harness = TestHarness::builder().build().unwrap();
    harness
        .history
        .write_history(
            "c1",
            vec![
                Message::user("first message", vec![], "u1"),
                Message::user("second message", vec![], "u1"),
                Message::user("third message", vec![], "u1"),
            ],
        )
        .await
        .unwrap();
    harness
        .configs
        .update(
            "c1",
            ChannelOptions {
                modify_capacity: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("fourth message"), true))
        .await
        .unwrap();

    let requests = harness.backend.requests().await;
    let sent: Vec<&str> = requests[0]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(sent.len(), 3);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(&sent[1..], &["third message", "fourth message"]);
}

#[tokio::test]
async fn streaming_channel_edits_a_single_reply() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["streamed reply text".into()])
        .build()
        .unwrap();
    harness
        .configs
        .update(
            "c1",
            ChannelOptions {
                message_stream: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("stream please"), true))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Replied {
            text: "streamed reply text".into()
        }
    );
    assert!(harness.backend.requests().await[0].stream);
    let replies = harness.channel.replies().await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, "streamed reply text");
}

#[tokio::test]
async fn unreadable_preferences_exhaust_retries() {
    let harness = TestHarness::builder().build().unwrap();
    let server_path = harness
        .configs
        .path_for(&ollabridge_storage::Scope::server(TEST_GUILD));
    std::fs::create_dir_all(&server_path).unwrap();

    let outcome = lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("anyone home?"), true))
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Failed { reason } => {
            assert!(reason.contains("Could not retrieve"), "got: {reason}")
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(harness.backend.request_count().await, 0);
}

#[tokio::test]
async fn system_prompt_can_be_disabled() {
    let harness = TestHarness::builder()
        .with_system_prompt(None)
        .build()
        .unwrap();
    lifecycle(&harness)
        .handle_message(&inbound_message("c1", "u1", &mention("no prompt please"), true))
        .await
        .unwrap();

    let requests = harness.backend.requests().await;
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].role, Role::User);
}
