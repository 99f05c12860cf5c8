use dashmap::DashMap;

use crate::state::room::PlayerSession;

/// Holding area for connections that have submitted a name but are not yet
/// assigned to a room.
///
/// Name submission and readiness arrive as two independent messages, so a
/// player can disconnect between the two; entries are dropped on promotion
/// into a room or on disconnect, whichever comes first.
#[derive(Default)]
pub struct Lobby {
    pending: DashMap<String, PlayerSession>,
}

impl Lobby {
    /// Create an empty lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or update the name submitted by a connection.
    pub fn submit_name(&self, connection_id: &str, name: String) {
        self.pending
            .entry(connection_id.to_string())
            .and_modify(|player| player.name = name.clone())
            .or_insert_with(|| PlayerSession::new(connection_id.to_string(), name));
    }

    /// Pending session for a connection, if it has submitted a name.
    pub fn get(&self, connection_id: &str) -> Option<PlayerSession> {
        self.pending.get(connection_id).map(|entry| entry.value().clone())
    }

    /// Drop a connection's pending entry, returning it if present.
    pub fn remove(&self, connection_id: &str) -> Option<PlayerSession> {
        self.pending.remove(connection_id).map(|(_, player)| player)
    }

    /// Number of connections waiting for room assignment.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no connection is waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_submission_upserts_the_pending_entry() {
        let lobby = Lobby::new();
        assert!(lobby.get("c1").is_none());

        lobby.submit_name("c1", "alice".into());
        assert_eq!(lobby.get("c1").unwrap().name, "alice");

        // Resubmitting updates the name in place.
        lobby.submit_name("c1", "alicia".into());
        assert_eq!(lobby.get("c1").unwrap().name, "alicia");
        assert_eq!(lobby.len(), 1);
    }

    #[test]
    fn promotion_removes_the_entry() {
        let lobby = Lobby::new();
        lobby.submit_name("c1", "alice".into());
        let player = lobby.remove("c1").unwrap();
        assert_eq!(player.name, "alice");
        assert!(lobby.is_empty());
        assert!(lobby.remove("c1").is_none());
    }
}
