//! Shutdown coordination for the gateway's background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Broadcast coordinator every background task subscribes to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Tasks still holding a receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait for `tasks` to finish, aborting whatever is left after `deadline`.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>, deadline: Duration) {
        let count = tasks.len();
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let joined = async {
            for task in tasks {
                if let Err(e) = task.await {
                    if !e.is_cancelled() {
                        tracing::error!(error = %e, "Background task failed during shutdown");
                    }
                }
            }
        };

        match tokio::time::timeout(deadline, joined).await {
            Ok(()) => tracing::info!(tasks = count, "Background tasks stopped"),
            Err(_) => {
                tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Shutdown deadline reached, aborting remaining tasks");
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
