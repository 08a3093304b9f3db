//! WebSocket transport for Diffduel.
//!
//! Accepts connections and hands out split read/write halves: the gateway's
//! per-connection reader loop owns the receiving half while a writer task
//! drains outbound broadcasts into the sending half, so a slow send never
//! blocks event intake.

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{
    ConnectionReceiver, ConnectionSender, WebSocketConnection,
    WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection. Doubles as the identity a room is
/// keyed under (a room's id is its creator's connection id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
