//! Shared daemon skeleton
//!
//! Every long-running component (fetcher, integrator, discoverer, shipper)
//! is a [`Daemon`]: a named periodic tick. [`DaemonHandle::start`] spawns
//! the loop as a background task; [`DaemonHandle::stop`] signals shutdown
//! and waits for the task to observe it.
//!
//! The loop re-reads the interval on every iteration, so interval changes
//! take effect no later than the next tick. Cancellation is only observed
//! between ticks; a tick that has started runs to completion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A periodic background task.
#[async_trait]
pub trait Daemon: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Current tick period. Read before every wait.
    fn interval(&self) -> Duration;

    /// One unit of work. Errors are handled inside; a tick never aborts
    /// the loop.
    async fn tick(&self);
}

/// Handle to a spawned daemon loop.
pub struct DaemonHandle {
    name: &'static str,
    shutdown: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DaemonHandle {
    /// Launch the daemon's loop as a background task. Non-blocking.
    pub fn start(daemon: Arc<dyn Daemon>) -> Self {
        let (shutdown, rx) = broadcast::channel(1);
        let name = daemon.name();
        let task = tokio::spawn(run_loop(daemon, rx));

        Self {
            name,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    /// Signal cancellation and wait for the loop to return. Idempotent;
    /// later calls return immediately.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(());

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                // A panic inside a tick is contained by the task; surface
                // it here instead of taking the process down.
                tracing::error!(daemon = self.name, error = %e, "daemon task terminated abnormally");
            }
        }
    }

    /// Name of the daemon this handle controls.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

async fn run_loop(daemon: Arc<dyn Daemon>, mut shutdown: broadcast::Receiver<()>) {
    tracing::info!(daemon = daemon.name(), "daemon started");

    loop {
        tokio::select! {
            result = shutdown.recv() => {
                match result {
                    Ok(()) | Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!(daemon = daemon.name(), missed = n, "shutdown receiver lagged");
                    }
                }
            }

            _ = tokio::time::sleep(daemon.interval()) => {
                daemon.tick().await;
            }
        }
    }

    tracing::info!(daemon = daemon.name(), "daemon stopped");
}
