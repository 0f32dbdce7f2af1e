// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel history store: one `{channel}-channel-context.json` per channel.

use std::path::{Path, PathBuf};

use ollabridge_core::types::{ChannelHistory, Message};
use ollabridge_core::BridgeError;
use tracing::{debug, info, warn};

use crate::document::{read_json, write_json_atomic, ReadOutcome};
use crate::lock::FileLock;

/// Durable per-channel conversation history.
#[derive(Debug, Clone)]
pub struct ChannelHistoryStore {
    data_dir: PathBuf,
    lock: FileLock,
}

impl ChannelHistoryStore {
    pub fn new(data_dir: impl Into<PathBuf>, lock: FileLock) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock,
        }
    }

    pub fn path_for(&self, channel_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("{channel_id}-channel-context.json"))
    }

    /// Loads the full document, creating an empty one on first access.
    pub async fn load(&self, channel_id: &str) -> Result<ChannelHistory, BridgeError> {
        let path = self.path_for(channel_id);
        let _guard = self.lock.acquire(&path).await?;
        self.load_locked(channel_id, &path).await
    }

    /// Ordered messages for a channel; empty for an unknown channel.
    pub async fn get_history(&self, channel_id: &str) -> Result<Vec<Message>, BridgeError> {
        Ok(self.load(channel_id).await?.messages)
    }

    /// Replaces the persisted messages exactly, keeping the channel name.
    pub async fn write_history(
        &self,
        channel_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), BridgeError> {
        let path = self.path_for(channel_id);
        let _guard = self.lock.acquire(&path).await?;
        let mut history = self.load_locked(channel_id, &path).await?;
        history.messages = messages;
        write_json_atomic(&path, &history).await?;
        debug!(channel_id, len = history.messages.len(), "history written");
        Ok(())
    }

    /// Overwrites the whole document, name included.
    pub async fn save(&self, history: &ChannelHistory) -> Result<(), BridgeError> {
        let path = self.path_for(&history.id);
        let _guard = self.lock.acquire(&path).await?;
        write_json_atomic(&path, history).await?;
        debug!(channel_id = %history.id, len = history.messages.len(), "history saved");
        Ok(())
    }

    /// Appends one message under a single lock hold and returns the result.
    pub async fn append_message(
        &self,
        channel_id: &str,
        message: Message,
    ) -> Result<Vec<Message>, BridgeError> {
        let path = self.path_for(channel_id);
        let _guard = self.lock.acquire(&path).await?;
        let mut history = self.load_locked(channel_id, &path).await?;
        history.messages.push(message);
        write_json_atomic(&path, &history).await?;
        Ok(history.messages)
    }

    /// Removes every message authored by `user_id`. Returns whether any were removed.
    pub async fn clear_user_messages(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<bool, BridgeError> {
        let path = self.path_for(channel_id);
        let _guard = self.lock.acquire(&path).await?;
        let mut history = self.load_locked(channel_id, &path).await?;

        let before = history.messages.len();
        history.messages.retain(|m| m.author_id != user_id);
        let removed = before - history.messages.len();
        if removed == 0 {
            return Ok(false);
        }

        write_json_atomic(&path, &history).await?;
        info!(channel_id, user_id, removed, "cleared user messages");
        Ok(true)
    }

    /// Reads the document; the caller holds the lock for `path`.
    async fn load_locked(
        &self,
        channel_id: &str,
        path: &Path,
    ) -> Result<ChannelHistory, BridgeError> {
        match read_json::<ChannelHistory>(path).await? {
            ReadOutcome::Found(history) => Ok(history),
            ReadOutcome::Missing => {
                let history = ChannelHistory::empty(channel_id);
                write_json_atomic(path, &history).await?;
                debug!(channel_id, "created empty channel history");
                Ok(history)
            }
            ReadOutcome::Malformed(e) => {
                warn!(
                    channel_id,
                    path = %path.display(),
                    error = %e,
                    "malformed channel history read as empty"
                );
                Ok(ChannelHistory::empty(channel_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ollabridge_core::types::Role;
    use std::time::Duration;

    fn store(dir: &Path) -> ChannelHistoryStore {
        ChannelHistoryStore::new(dir, FileLock::new(Duration::from_millis(2)))
    }

    #[tokio::test]
    async fn first_access_creates_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let messages = store.get_history("100").await.unwrap();
        assert!(messages.is_empty());
        assert!(store.path_for("100").exists());
    }

    #[tokio::test]
    async fn write_history_keeps_channel_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut history = ChannelHistory::empty("7");
        history.name = "general".into();
        store.save(&history).await.unwrap();

        store
            .write_history("7", vec![Message::user("hello there", vec![], "u1")])
            .await
            .unwrap();

        let loaded = store.load("7").await.unwrap();
        assert_eq!(loaded.name, "general");
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn clear_user_messages_reports_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .write_history(
                "7",
                vec![
                    Message::user("from a", vec![], "a"),
                    Message::assistant("reply"),
                    Message::user("from b", vec![], "b"),
                ],
            )
            .await
            .unwrap();

        assert!(store.clear_user_messages("7", "a").await.unwrap());
        assert!(!store.clear_user_messages("7", "a").await.unwrap());

        let remaining = store.get_history("7").await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|m| m.author_id != "a"));
    }

    #[tokio::test]
    async fn malformed_file_reads_empty_without_clobbering() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.path_for("8");
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(store.get_history("8").await.unwrap().is_empty());
        let raw = tokio::fs::read(&path).await.unwrap();
        assert_eq!(raw, b"not json");
    }
}
