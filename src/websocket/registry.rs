//! Registry of open chat peers and broadcast fan-out.
//!
//! # Design Decisions
//! - Each peer owns a bounded outbound queue drained by its writer task,
//!   so a slow peer never blocks the broadcaster
//! - A peer whose queue is full or gone is removed; nobody else is affected

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::net::ConnectionId;
use crate::observability::metrics;

/// Frames a peer may have waiting before it is considered stalled.
pub const DEFAULT_QUEUE_FRAMES: usize = 1024;

/// Encoded frames queued for one peer.
pub type PeerReceiver = mpsc::Receiver<Bytes>;

#[derive(Debug, Clone)]
pub struct BroadcastRegistry {
    peers: Arc<DashMap<ConnectionId, mpsc::Sender<Bytes>>>,
    queue_frames: usize,
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_FRAMES)
    }
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose peers may each have `queue_frames` frames waiting.
    pub fn with_capacity(queue_frames: usize) -> Self {
        Self {
            peers: Arc::new(DashMap::new()),
            queue_frames: queue_frames.max(1),
        }
    }

    /// Add a peer and return the queue its writer should drain.
    pub fn register(&self, id: ConnectionId) -> PeerReceiver {
        let (tx, rx) = mpsc::channel(self.queue_frames);
        self.peers.insert(id, tx);
        metrics::record_ws_clients(self.peers.len());
        tracing::info!(connection_id = %id, peers = self.peers.len(), "Chat peer joined");
        rx
    }

    /// Remove a peer. Idempotent.
    pub fn unregister(&self, id: ConnectionId) {
        if self.peers.remove(&id).is_some() {
            metrics::record_ws_clients(self.peers.len());
            tracing::info!(connection_id = %id, peers = self.peers.len(), "Chat peer left");
        }
    }

    /// Queue `frame` for a single peer.
    pub fn send_to(&self, id: ConnectionId, frame: Bytes) -> bool {
        let result = match self.peers.get(&id) {
            Some(tx) => tx.try_send(frame),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                self.evict(id, &e);
                false
            }
        }
    }

    /// Queue `frame` for every peer, skipping `except` when given.
    /// Returns how many peers it was queued for.
    pub fn broadcast(&self, frame: Bytes, except: Option<ConnectionId>) -> usize {
        let mut delivered = 0;
        let mut failed = Vec::new();
        for entry in self.peers.iter() {
            if Some(*entry.key()) == except {
                continue;
            }
            match entry.value().try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => failed.push((*entry.key(), e)),
            }
        }
        // Map guards are released above; unregister takes a write lock.
        for (id, e) in failed {
            self.evict(id, &e);
        }
        metrics::record_ws_broadcast(delivered);
        delivered
    }

    fn evict(&self, id: ConnectionId, cause: &TrySendError<Bytes>) {
        match cause {
            TrySendError::Full(_) => {
                tracing::warn!(connection_id = %id, queued = self.queue_frames, "Dropping stalled chat peer")
            }
            TrySendError::Closed(_) => {
                tracing::warn!(connection_id = %id, "Dropping unreachable chat peer")
            }
        }
        self.unregister(id);
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
