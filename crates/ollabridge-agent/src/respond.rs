// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streams backend fragments into a reply that is edited in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use ollabridge_core::traits::{ChannelAdapter, ChatStream};
use ollabridge_core::types::{InboundMessage, MessageId};
use ollabridge_core::{BridgeError, split_message};
use tracing::debug;

/// Sends the first non-blank fragment as a reply, then edits it as more
/// text arrives, at most once per `interval`. The final text always lands
/// in a last edit; overflow past the channel's length limit is sent as
/// follow-up replies.
///
/// Returns the full text, or `None` when the stream produced only blanks.
pub async fn relay_stream(
    channel: Arc<dyn ChannelAdapter>,
    original: InboundMessage,
    mut fragments: ChatStream,
    interval: Duration,
) -> Result<Option<String>, BridgeError> {
    let limit = channel.capabilities().max_message_len;
    let mut full = String::new();
    let mut sent: Option<MessageId> = None;
    let mut shown = String::new();
    let mut last_update = Instant::now();
    let mut edits = 0usize;

    while let Some(fragment) = fragments.next().await {
        full.push_str(&fragment?);
        if full.trim().is_empty() {
            continue;
        }

        let preview = first_chunk(&full, limit);
        match &sent {
            None => {
                sent = Some(channel.reply(&original, &preview).await?);
                shown = preview;
                last_update = Instant::now();
            }
            Some(id) if last_update.elapsed() >= interval && preview != shown => {
                channel.edit(&original, id, &preview).await?;
                shown = preview;
                last_update = Instant::now();
                edits += 1;
            }
            Some(_) => {}
        }
    }

    let Some(id) = sent else {
        return Ok(None);
    };

    let mut chunks = split_message(&full, limit).into_iter();
    if let Some(head) = chunks.next() {
        if head != shown {
            channel.edit(&original, &id, &head).await?;
            edits += 1;
        }
    }
    for overflow in chunks {
        channel.reply(&original, &overflow).await?;
    }

    debug!(
        channel_id = %original.channel_id,
        chars = full.chars().count(),
        edits,
        "stream relayed"
    );
    Ok(Some(full))
}

fn first_chunk(text: &str, limit: usize) -> String {
    split_message(text, limit)
        .into_iter()
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use ollabridge_test_utils::{MockChannel, inbound_message};

    fn fragments(parts: &[&str]) -> ChatStream {
        let items: Vec<Result<String, BridgeError>> =
            parts.iter().map(|p| Ok(p.to_string())).collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn final_edit_carries_full_text() {
        let channel = Arc::new(MockChannel::new());
        let original = inbound_message("c1", "u1", "hi there bot", true);

        let text = relay_stream(
            channel.clone(),
            original,
            fragments(&["Hello", " streamed", " world"]),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        assert_eq!(text.as_deref(), Some("Hello streamed world"));
        let replies = channel.replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].text, "Hello streamed world");
        // Throttled: only the final edit happened.
        assert_eq!(replies[0].edits, 1);
    }

    #[tokio::test]
    async fn unthrottled_stream_edits_per_fragment() {
        let channel = Arc::new(MockChannel::new());
        let original = inbound_message("c1", "u1", "hi there bot", true);

        relay_stream(
            channel.clone(),
            original,
            fragments(&["a", "b", "c"]),
            Duration::ZERO,
        )
        .await
        .unwrap();

        let replies = channel.replies().await;
        assert_eq!(replies[0].text, "abc");
        assert_eq!(replies[0].edits, 2);
    }

    #[tokio::test]
    async fn blank_stream_sends_nothing() {
        let channel = Arc::new(MockChannel::new());
        let original = inbound_message("c1", "u1", "hi there bot", true);
        let text = relay_stream(channel.clone(), original, fragments(&[" ", ""]), Duration::ZERO)
            .await
            .unwrap();
        assert!(text.is_none());
        assert!(channel.replies().await.is_empty());
    }

    #[tokio::test]
    async fn stream_error_propagates() {
        let channel = Arc::new(MockChannel::new());
        let original = inbound_message("c1", "u1", "hi there bot", true);
        let items: Vec<Result<String, BridgeError>> =
            vec![Ok("partial".into()), Err(BridgeError::provider("connection reset"))];
        let err = relay_stream(channel, original, Box::pin(stream::iter(items)), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }
}
