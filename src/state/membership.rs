//! Registry of live push-channel connections and the room each one joined.

use dashmap::DashMap;
use uuid::Uuid;

/// Identifier handed out for each registered connection.
pub type ConnectionId = Uuid;

/// Party room and participant a connection identified as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub party_code: String,
    pub participant_id: Uuid,
}

/// Process-wide map of connection -> membership.
#[derive(Debug, Default)]
pub struct MembershipRegistry {
    connections: DashMap<ConnectionId, Membership>,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly identified connection and return its id.
    pub fn register(&self, membership: Membership) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(id, membership);
        id
    }

    /// Forget a connection, returning what it was registered as.
    pub fn deregister(&self, id: ConnectionId) -> Option<Membership> {
        self.connections.remove(&id).map(|(_, membership)| membership)
    }

    /// Open connections across all rooms.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
