//! Connection hub: fans match deltas out to every open WebSocket.

use shared::MatchDelta;
use tokio::sync::broadcast;

/// Slow receivers that fall behind skip messages (RecvError::Lagged).
const CHANNEL_CAPACITY: usize = 256;

/// Registry of connected viewers. Cloneable — stored in AppState. Each
/// socket task holds its own receiver; dropping the receiver is the
/// unregister, so a dead connection can never stall the others.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<MatchDelta>,
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Register a connection.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchDelta> {
        self.tx.subscribe()
    }

    /// Send a delta to every registered connection, best effort.
    pub fn broadcast(&self, delta: MatchDelta) {
        // send() errors when no receivers are registered — that's fine.
        let _ = self.tx.send(delta);
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
