// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent key-value config store, one JSON document per scope.

use std::path::{Path, PathBuf};

use ollabridge_core::BridgeError;
use tracing::{debug, warn};

use crate::document::{read_json, write_json_atomic, ReadOutcome};
use crate::lock::FileLock;
use crate::models::{
    resolve, ChannelOptions, ConfigDefaults, ConfigRecord, ResolvedConfig, Scope, ScopeOptions,
    ServerOptions,
};

/// Reads and partially updates per-scope config documents.
///
/// Every access to a document holds that document's file lock, so two
/// updates to the same scope never interleave while updates to different
/// scopes proceed in parallel.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    data_dir: PathBuf,
    lock: FileLock,
    defaults: ConfigDefaults,
}

impl ConfigStore {
    pub fn new(data_dir: impl Into<PathBuf>, lock: FileLock, defaults: ConfigDefaults) -> Self {
        Self {
            data_dir: data_dir.into(),
            lock,
            defaults,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn defaults(&self) -> &ConfigDefaults {
        &self.defaults
    }

    pub fn path_for(&self, scope: &Scope) -> PathBuf {
        self.data_dir.join(scope.file_name())
    }

    /// Returns the stored record, or `None` when it is missing or unreadable.
    pub async fn get<O: ScopeOptions>(
        &self,
        id: &str,
    ) -> Result<Option<ConfigRecord<O>>, BridgeError> {
        let path = self.path_for(&Scope {
            kind: O::KIND,
            id: id.to_string(),
        });
        let _guard = self.lock.acquire(&path).await?;
        Ok(read_record(&path).await)
    }

    /// Creates the record with `patch`, or merges `patch` into the stored one.
    ///
    /// Returns the record as persisted. Nothing is written when the merge
    /// leaves the stored record unchanged.
    pub async fn update<O: ScopeOptions>(
        &self,
        id: &str,
        patch: O,
    ) -> Result<ConfigRecord<O>, BridgeError> {
        let path = self.path_for(&Scope {
            kind: O::KIND,
            id: id.to_string(),
        });
        let _guard = self.lock.acquire(&path).await?;

        let existing = read_record::<O>(&path).await;
        let mut record = existing
            .clone()
            .unwrap_or_else(|| ConfigRecord::new(O::default()));
        record.options.merge(patch);

        if existing.as_ref() == Some(&record) {
            return Ok(record);
        }

        write_json_atomic(&path, &record).await?;
        debug!(
            scope = O::KIND.label(),
            id,
            created = existing.is_none(),
            "config record written"
        );
        Ok(record)
    }

    /// Resolves the effective configuration for a channel.
    ///
    /// Missing server and channel records are created on first use with
    /// the process defaults; the channel record inherits the server's
    /// system prompt at creation. Once both records exist and are complete
    /// this performs no writes.
    pub async fn resolve_channel_config(
        &self,
        server_id: &str,
        channel_id: &str,
    ) -> Result<ResolvedConfig, BridgeError> {
        let server = match self.get::<ServerOptions>(server_id).await? {
            Some(record) => record.options,
            None => {
                let seed = ServerOptions {
                    toggle_chat: Some(true),
                    system_prompt: self.defaults.system_prompt.clone(),
                    command_roles: None,
                };
                self.update(server_id, seed).await?.options
            }
        };

        let inherited_prompt = server
            .system_prompt
            .clone()
            .or_else(|| self.defaults.system_prompt.clone());

        let channel = match self.get::<ChannelOptions>(channel_id).await? {
            Some(record) => {
                let mut fill = ChannelOptions::default();
                if record.options.system_prompt.is_none() {
                    fill.system_prompt = inherited_prompt;
                }
                if record.options.switch_model.is_none() {
                    fill.switch_model = self.defaults.model.clone();
                }
                if fill == ChannelOptions::default() {
                    record.options
                } else {
                    self.update(channel_id, fill).await?.options
                }
            }
            None => {
                let seed = ChannelOptions {
                    switch_model: self.defaults.model.clone(),
                    system_prompt: inherited_prompt,
                    ..Default::default()
                };
                self.update(channel_id, seed).await?.options
            }
        };

        Ok(resolve(&self.defaults, &server, &channel))
    }
}

async fn read_record<O: ScopeOptions>(path: &Path) -> Option<ConfigRecord<O>> {
    match read_json::<ConfigRecord<O>>(path).await {
        Ok(ReadOutcome::Found(record)) => Some(record),
        Ok(ReadOutcome::Missing) => None,
        Ok(ReadOutcome::Malformed(e)) => {
            warn!(path = %path.display(), error = %e, "malformed config record treated as absent");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config record unreadable, treated as absent");
            None
        }
    }
}
