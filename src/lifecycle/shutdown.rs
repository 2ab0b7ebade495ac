//! Shutdown coordination for the server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
/// Subscribers created after the stop will not see the message, so check
/// [`Shutdown::is_stopped`] after subscribing.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    stopped: Arc<AtomicBool>,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            stopped: Arc::new(AtomicBool::new(false)),
            deadline: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop now. Returns false if already stopped.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!("Shutdown triggered");
        let _ = self.tx.send(());
        true
    }

    /// Schedule a stop after `delay`. An earlier pending deadline is kept.
    /// Must be called within a Tokio runtime.
    pub fn stop_after(&self, delay: Duration) -> Instant {
        let requested = Instant::now() + delay;
        let deadline = {
            let mut pending = self
                .deadline
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match *pending {
                Some(existing) if existing <= requested => return existing,
                _ => {
                    *pending = Some(requested);
                    requested
                }
            }
        };

        tracing::warn!(delay_secs = delay.as_secs(), "Server will stop");
        let shutdown = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            shutdown.stop();
        });
        deadline
    }

    /// The earliest scheduled stop, if any.
    pub fn pending_deadline(&self) -> Option<Instant> {
        *self
            .deadline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once the stop has happened.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        if self.is_stopped() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_is_idempotent_and_broadcast() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        assert!(shutdown.stop());
        assert!(!shutdown.stop());
        assert!(shutdown.is_stopped());
        rx.recv().await.unwrap();
        shutdown.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_stop_fires_at_deadline() {
        let shutdown = Shutdown::new();
        shutdown.stop_after(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(!shutdown.is_stopped());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(shutdown.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_deadline_wins() {
        let shutdown = Shutdown::new();
        let first = shutdown.stop_after(Duration::from_secs(5));
        let second = shutdown.stop_after(Duration::from_secs(30));
        assert_eq!(first, second);

        let third = shutdown.stop_after(Duration::from_secs(1));
        assert!(third < first);
        assert_eq!(shutdown.pending_deadline(), Some(third));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(shutdown.is_stopped());
    }
}
