// SPDX-FileCopyrightText: 2026 Ollabridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent loop and message lifecycle for Ollabridge.
//!
//! The [`AgentLoop`] is the central coordinator that:
//! - Receives events from a channel adapter
//! - Runs one [`ContextLifecycle`] cycle per message, serialized per channel
//! - Executes administrative commands
//! - Handles graceful shutdown

pub mod commands;
pub mod lifecycle;
pub mod respond;
pub mod shutdown;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ollabridge_core::BridgeError;
use ollabridge_core::traits::ChannelAdapter;
use ollabridge_core::types::{CommandInvocation, InboundEvent, InboundMessage};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use commands::CommandExecutor;
pub use lifecycle::{ContextLifecycle, CycleOutcome, CycleState, LifecycleSettings, error_reply};

/// How long shutdown waits for in-flight cycles.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a channel worker may sit without queued messages before it is
/// retired.
pub const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

struct Worker {
    sender: mpsc::UnboundedSender<InboundMessage>,
    /// Messages sent to the worker whose cycle has not finished yet.
    pending: Arc<AtomicUsize>,
    last_used: Instant,
}

/// Receives channel events and fans them out to per-channel workers.
///
/// Each channel gets one worker task that runs its cycles one at a time in
/// arrival order; workers for different channels run concurrently, bounded
/// by the shared dispatcher. A worker with nothing pending for longer than
/// the idle timeout is retired; the next message for its channel starts a
/// new one.
pub struct AgentLoop {
    channel: Arc<dyn ChannelAdapter>,
    lifecycle: Arc<ContextLifecycle>,
    commands: Arc<CommandExecutor>,
    workers: HashMap<String, Worker>,
    tasks: JoinSet<()>,
    drain_timeout: Duration,
    idle_timeout: Duration,
    retired: usize,
}

impl AgentLoop {
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        lifecycle: Arc<ContextLifecycle>,
        commands: Arc<CommandExecutor>,
    ) -> Self {
        info!(adapter = channel.name(), "agent loop initialized");
        Self {
            channel,
            lifecycle,
            commands,
            workers: HashMap::new(),
            tasks: JoinSet::new(),
            drain_timeout: DRAIN_TIMEOUT,
            idle_timeout: WORKER_IDLE_TIMEOUT,
            retired: 0,
        }
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Channels that currently have a worker.
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Workers retired for idleness since the loop was created.
    pub fn retired_workers(&self) -> usize {
        self.retired
    }

    /// Runs until the token is cancelled or the channel closes, then drains.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), BridgeError> {
        info!("agent loop running");
        let mut sweep = tokio::time::interval((self.idle_timeout / 2).max(Duration::from_millis(10)));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.channel.receive() => {
                    match event {
                        Ok(InboundEvent::Message(message)) => self.route_message(message),
                        Ok(InboundEvent::Command(invocation)) => self.spawn_command(invocation),
                        Err(e) => {
                            // If the channel is closed, break out of the loop.
                            if e.to_string().contains("closed") {
                                info!("channel closed, stopping agent loop");
                                break;
                            }
                            error!(error = %e, "channel receive error");
                        }
                    }
                }
                _ = sweep.tick() => self.retire_idle_workers(),
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping agent loop");
                    break;
                }
            }
            self.reap_finished();
        }

        // Closing the senders lets each worker finish its queue and exit.
        self.workers.clear();
        shutdown::drain_tasks(&mut self.tasks, self.drain_timeout).await;

        if let Err(e) = self.channel.shutdown().await {
            warn!(error = %e, "channel shutdown failed");
        }
        info!("agent loop stopped");
        Ok(())
    }

    fn route_message(&mut self, message: InboundMessage) {
        let channel_id = message.channel_id.clone();
        let message = match self.workers.get_mut(&channel_id) {
            Some(worker) => {
                worker.pending.fetch_add(1, Ordering::AcqRel);
                worker.last_used = Instant::now();
                match worker.sender.send(message) {
                    Ok(()) => return,
                    // Worker exited; start a fresh one below.
                    Err(mpsc::error::SendError(message)) => {
                        worker.pending.fetch_sub(1, Ordering::AcqRel);
                        message
                    }
                }
            }
            None => message,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(1));
        let _ = sender.send(message);
        self.workers.insert(
            channel_id.clone(),
            Worker {
                sender,
                pending: Arc::clone(&pending),
                last_used: Instant::now(),
            },
        );

        let lifecycle = Arc::clone(&self.lifecycle);
        self.tasks
            .spawn(channel_worker(channel_id, lifecycle, receiver, pending));
    }

    /// Drops the sender of every worker that has been idle long enough.
    ///
    /// Only this loop sends to workers, so once `pending` is zero and the
    /// sender is gone, nothing more can reach the old worker and ordering
    /// for its channel carries over to the next one.
    fn retire_idle_workers(&mut self) {
        let idle_timeout = self.idle_timeout;
        let before = self.workers.len();
        self.workers.retain(|channel_id, worker| {
            let idle = worker.pending.load(Ordering::Acquire) == 0
                && worker.last_used.elapsed() >= idle_timeout;
            if idle {
                debug!(channel_id = %channel_id, "retiring idle channel worker");
            }
            !idle
        });
        self.retired += before - self.workers.len();
    }

    fn spawn_command(&mut self, invocation: CommandInvocation) {
        let commands = Arc::clone(&self.commands);
        let channel = Arc::clone(&self.channel);
        self.tasks.spawn(async move {
            let text = match commands.execute(&invocation).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(command = invocation.kind.name(), error = %e, "command failed");
                    error_reply(&e.to_string())
                }
            };
            if let Err(e) = channel.respond_command(&invocation, &text).await {
                warn!(command = invocation.kind.name(), error = %e, "failed to answer command");
            }
        });
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "cycle task panicked");
            }
        }
    }
}

async fn channel_worker(
    channel_id: String,
    lifecycle: Arc<ContextLifecycle>,
    mut receiver: mpsc::UnboundedReceiver<InboundMessage>,
    pending: Arc<AtomicUsize>,
) {
    debug!(channel_id = %channel_id, "channel worker started");
    while let Some(message) = receiver.recv().await {
        match lifecycle.handle_message(&message).await {
            Ok(outcome) => debug!(channel_id = %channel_id, ?outcome, "cycle finished"),
            Err(e) => error!(channel_id = %channel_id, error = %e, "cycle aborted during intake"),
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }
    debug!(channel_id = %channel_id, "channel worker stopped");
}
