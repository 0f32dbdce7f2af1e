// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission control for inference calls.
//!
//! A [`RequestDispatcher`] admits at most `limit` tasks at a time. Waiting
//! tasks are admitted strictly in submission order. Each submission carries
//! a queue-wait deadline: a task still waiting when its deadline passes is
//! removed from the queue and never runs. Once admitted, a task runs to
//! completion regardless of how long it takes.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ollabridge_core::BridgeError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Default number of concurrently admitted tasks.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Default maximum time a task may wait for admission.
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub limit: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub timed_out: u64,
}

#[derive(Debug)]
struct Inner {
    // Tokio's semaphore queues waiters FIFO; dropping a pending acquire
    // removes the waiter.
    permits: Arc<Semaphore>,
    limit: usize,
    queue_timeout: Duration,
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    completed: AtomicU64,
    timed_out: AtomicU64,
}

/// Cloneable handle to one shared dispatcher.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    inner: Arc<Inner>,
}

impl Default for RequestDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, DEFAULT_QUEUE_TIMEOUT)
    }
}

impl RequestDispatcher {
    /// A `limit` of zero is raised to one.
    pub fn new(limit: usize, queue_timeout: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(limit)),
                limit,
                queue_timeout,
                queued: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
                timed_out: AtomicU64::new(0),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn queue_timeout(&self) -> Duration {
        self.inner.queue_timeout
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            limit: self.inner.limit,
            queued: self.queued(),
            in_flight: self.in_flight(),
            completed: self.inner.completed.load(Ordering::SeqCst),
            timed_out: self.inner.timed_out.load(Ordering::SeqCst),
        }
    }

    /// Submits `task` with the dispatcher's default queue timeout.
    pub async fn submit<F, T>(&self, task: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>> + Send + 'static,
        T: Send + 'static,
    {
        self.submit_with_timeout(self.inner.queue_timeout, task).await
    }

    /// Queues `task` and resolves with its output once it has run.
    ///
    /// `task` is not polled until admitted. If admission does not happen
    /// within `timeout` the task is dropped unpolled and
    /// [`BridgeError::QueueTimeout`] is returned. An admitted task runs on
    /// its own tokio task, so it completes even if the caller goes away.
    pub async fn submit_with_timeout<F, T>(&self, timeout: Duration, task: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>> + Send + 'static,
        T: Send + 'static,
    {
        let enqueued_at = Instant::now();
        let waiting = QueuedMark::new(&self.inner);

        let permit = match tokio::time::timeout(
            timeout,
            Arc::clone(&self.inner.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(BridgeError::Internal("dispatcher closed".to_string()));
            }
            Err(_elapsed) => {
                drop(waiting);
                self.inner.timed_out.fetch_add(1, Ordering::SeqCst);
                let waited = enqueued_at.elapsed();
                warn!(
                    waited_ms = waited.as_millis() as u64,
                    queued = self.queued(),
                    in_flight = self.in_flight(),
                    "request timed out waiting for admission"
                );
                return Err(BridgeError::QueueTimeout { waited });
            }
        };
        drop(waiting);

        let in_flight = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            waited_ms = enqueued_at.elapsed().as_millis() as u64,
            in_flight,
            queued = self.queued(),
            "request admitted"
        );

        let running = RunningMark {
            inner: Arc::clone(&self.inner),
            _permit: permit,
        };
        let handle = tokio::spawn(async move {
            let _running = running;
            task.await
        });

        handle
            .await
            .map_err(|e| BridgeError::Internal(format!("dispatched task failed: {e}")))?
    }
}

/// Counts a submission as queued until it is admitted or abandoned.
struct QueuedMark<'a> {
    inner: &'a Inner,
}

impl<'a> QueuedMark<'a> {
    fn new(inner: &'a Inner) -> Self {
        inner.queued.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for QueuedMark<'_> {
    fn drop(&mut self) {
        self.inner.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Holds an admission slot. Dropping it, even while unwinding from a
/// panicking task, settles the counters and then releases the permit.
struct RunningMark {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for RunningMark {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.completed.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_limit_is_raised_to_one() {
        let dispatcher = RequestDispatcher::new(0, Duration::from_millis(10));
        assert_eq!(dispatcher.limit(), 1);
    }

    #[tokio::test]
    async fn panicking_task_releases_its_slot_and_counter() {
        let dispatcher = RequestDispatcher::new(1, Duration::from_millis(500));
        let err = dispatcher
            .submit(async {
                if true {
                    panic!("backend bug");
                }
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Internal(_)));
        assert_eq!(dispatcher.in_flight(), 0);

        let value = dispatcher.submit(async { Ok("next") }).await.unwrap();
        assert_eq!(value, "next");
        assert_eq!(dispatcher.snapshot().in_flight, 0);
    }

    #[tokio::test]
    async fn returns_task_output() {
        let dispatcher = RequestDispatcher::default();
        let value = dispatcher.submit(async { Ok(41 + 1) }).await.unwrap();
        assert_eq!(value, 42);
        let snap = dispatcher.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.queued, 0);
    }

    #[tokio::test]
    async fn task_errors_propagate_and_free_the_slot() {
        let dispatcher = RequestDispatcher::new(1, Duration::from_millis(500));
        let err = dispatcher
            .submit(async { Err::<(), _>(BridgeError::provider("model exploded")) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "model exploded");
        assert_eq!(dispatcher.in_flight(), 0);
        dispatcher.submit(async { Ok(()) }).await.unwrap();
    }
}
