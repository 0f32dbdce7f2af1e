// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exclusive marker-file locks keyed by storage path.
//!
//! Acquiring the lock for `data/42-channel-context.json` means creating
//! `data/42-channel-context.json.lock` with `create_new`. Contention is
//! resolved by sleeping for the retry interval and trying again, without
//! limit. A holder that crashes leaves the marker behind; nothing here
//! breaks stale locks.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ollabridge_core::BridgeError;
use tracing::{debug, warn};

/// Default backoff between acquisition attempts.
pub const DEFAULT_LOCK_RETRY: Duration = Duration::from_millis(50);

/// Acquires marker-file locks with a fixed retry interval.
#[derive(Debug, Clone, Copy)]
pub struct FileLock {
    retry: Duration,
}

impl Default for FileLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_RETRY)
    }
}

impl FileLock {
    pub fn new(retry: Duration) -> Self {
        Self { retry }
    }

    /// Path of the marker file guarding `path`.
    pub fn marker_path(path: &Path) -> PathBuf {
        let mut marker = OsString::from(path.as_os_str());
        marker.push(".lock");
        PathBuf::from(marker)
    }

    /// Waits until the lock for `path` is held by the caller.
    ///
    /// Only errors other than contention (permissions, missing volume)
    /// surface as [`BridgeError::Lock`].
    pub async fn acquire(&self, path: &Path) -> Result<LockGuard, BridgeError> {
        let marker = Self::marker_path(path);
        if let Some(parent) = marker.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| BridgeError::Lock {
                        path: marker.clone(),
                        source,
                    })?;
            }
        }

        let started = Instant::now();
        let mut attempts: u64 = 0;
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&marker)
                .await
            {
                Ok(_) => {
                    if attempts > 0 {
                        debug!(
                            path = %marker.display(),
                            attempts,
                            waited_ms = started.elapsed().as_millis() as u64,
                            "lock acquired after contention"
                        );
                    }
                    return Ok(LockGuard { marker });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempts += 1;
                    if attempts % 200 == 0 {
                        warn!(
                            path = %marker.display(),
                            waited_ms = started.elapsed().as_millis() as u64,
                            "still waiting for lock; a stale marker may need manual removal"
                        );
                    }
                    tokio::time::sleep(self.retry).await;
                }
                Err(source) => {
                    return Err(BridgeError::Lock {
                        path: marker,
                        source,
                    });
                }
            }
        }
    }
}

/// Holds a marker-file lock; dropping it deletes the marker.
#[derive(Debug)]
pub struct LockGuard {
    marker: PathBuf,
}

impl LockGuard {
    pub fn marker(&self) -> &Path {
        &self.marker
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.marker) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.marker.display(), error = %e, "failed to release lock");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn marker_path_appends_suffix() {
        let marker = FileLock::marker_path(Path::new("data/1-channel-context.json"));
        assert_eq!(marker, PathBuf::from("data/1-channel-context.json.lock"));
    }

    #[tokio::test]
    async fn guard_removes_marker_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.json");
        let lock = FileLock::default();

        let guard = lock.acquire(&target).await.unwrap();
        assert!(guard.marker().exists());
        let marker = guard.marker().to_path_buf();
        drop(guard);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/doc.json");
        let guard = FileLock::default().acquire(&target).await.unwrap();
        assert!(guard.marker().exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn holders_never_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let target = Arc::new(dir.path().join("shared.json"));
        let lock = FileLock::new(Duration::from_millis(2));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let target = Arc::clone(&target);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = lock.acquire(&target).await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_paths_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileLock::default();
        let a = lock.acquire(&dir.path().join("a.json")).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_millis(500),
            lock.acquire(&dir.path().join("b.json")),
        )
        .await
        .expect("second path should not wait")
        .unwrap();
        drop(a);
        drop(b);
    }
}
