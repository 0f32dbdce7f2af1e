// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON document I/O shared by the stores. Callers hold the path's lock.

use std::io::ErrorKind;
use std::path::Path;

use ollabridge_core::BridgeError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Outcome of reading a document from disk.
#[derive(Debug)]
pub enum ReadOutcome<T> {
    Found(T),
    Missing,
    /// The file exists but does not parse.
    Malformed(serde_json::Error),
}

impl<T> ReadOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }
}

pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<ReadOutcome<T>, BridgeError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
        Err(e) => return Err(BridgeError::storage(e)),
    };
    Ok(match serde_json::from_slice(&bytes) {
        Ok(value) => ReadOutcome::Found(value),
        Err(e) => ReadOutcome::Malformed(e),
    })
}

/// Serializes `value` and replaces `path` with it in one rename.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), BridgeError> {
    let body = serde_json::to_vec_pretty(value).map_err(BridgeError::storage)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.json");
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::storage)?;
        }
    }

    tokio::fs::write(&tmp, &body)
        .await
        .map_err(BridgeError::storage)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(BridgeError::storage(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let outcome: ReadOutcome<serde_json::Value> =
            read_json(&dir.path().join("nope.json")).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Missing));
    }

    #[tokio::test]
    async fn garbage_reads_as_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let outcome: ReadOutcome<serde_json::Value> = read_json(&path).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Malformed(_)));
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_json_atomic(&path, &serde_json::json!({"a": 1}))
            .await
            .unwrap();
        write_json_atomic(&path, &serde_json::json!({"a": 2}))
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let value: serde_json::Value = read_json(&path).await.unwrap().found().unwrap();
        assert_eq!(value["a"], 2);
    }
}
