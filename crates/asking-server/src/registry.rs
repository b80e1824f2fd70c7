//! Live connections and fan-out.
//!
//! Each connection is an outbound `mpsc` channel drained by that
//! connection's own task. Sends never wait: a channel that is full or
//! closed is treated as a dead connection and dropped from the registry,
//! which also closes it from the connection task's point of view.

use crate::protocol::Frame;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Opaque handle for a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Registry of connected clients.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<Frame>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel and returns its handle.
    pub async fn register(&self, outbound: mpsc::Sender<Frame>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections.write().await.insert(id, outbound);
        debug!("Registered {}", id);
        id
    }

    /// Removes a channel. Returns whether it was still registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(&id).is_some();
        if removed {
            debug!("Unregistered {}", id);
        }
        removed
    }

    /// Delivers a frame to one connection.
    ///
    /// A failed delivery unregisters the connection.
    pub async fn send_to(&self, id: ConnectionId, frame: Frame) -> bool {
        let result = match self.connections.read().await.get(&id) {
            Some(tx) => tx.try_send(frame),
            None => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                self.drop_faulted(vec![(id, fault_reason(&e))]).await;
                false
            }
        }
    }

    /// Delivers a frame to every connection.
    ///
    /// Returns how many connections accepted it. Connections that could
    /// not take the frame are removed.
    pub async fn broadcast_all(&self, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut faulted = Vec::new();

        {
            let connections = self.connections.read().await;
            for (id, tx) in connections.iter() {
                match tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => faulted.push((*id, fault_reason(&e))),
                }
            }
        }

        if !faulted.is_empty() {
            self.drop_faulted(faulted).await;
        }

        delivered
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    async fn drop_faulted(&self, faulted: Vec<(ConnectionId, &'static str)>) {
        let mut connections = self.connections.write().await;
        for (id, reason) in faulted {
            if connections.remove(&id).is_some() {
                warn!("Dropping {}: {}", id, reason);
            }
        }
    }
}

fn fault_reason<T>(err: &TrySendError<T>) -> &'static str {
    match err {
        TrySendError::Full(_) => "outbound buffer full",
        TrySendError::Closed(_) => "connection closed",
    }
}
