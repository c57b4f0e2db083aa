use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound side of one open socket.
struct Connection {
    tx: mpsc::UnboundedSender<Message>,
    player_id: Option<String>,
}

/// Open sockets of one room. Owned by the room's coordinator task, so no locking.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<Uuid, Connection>,
}

impl ConnectionRegistry {
    /// Track a new anonymous connection.
    pub fn insert(&mut self, id: Uuid, tx: mpsc::UnboundedSender<Message>) {
        self.connections.insert(id, Connection { tx, player_id: None });
    }

    /// Forget a connection, returning the player it was bound to.
    pub fn remove(&mut self, id: &Uuid) -> Option<String> {
        self.connections.remove(id).and_then(|conn| conn.player_id)
    }

    /// Tag a connection with the player that joined through it, returning the
    /// player it was bound to before.
    pub fn bind(&mut self, id: &Uuid, player_id: String) -> Option<String> {
        self.connections
            .get_mut(id)
            .and_then(|conn| conn.player_id.replace(player_id))
    }

    /// Make a connection anonymous again, returning the player it was bound to.
    pub fn unbind(&mut self, id: &Uuid) -> Option<String> {
        self.connections
            .get_mut(id)
            .and_then(|conn| conn.player_id.take())
    }

    /// Player bound to a connection.
    pub fn player_of(&self, id: &Uuid) -> Option<&str> {
        self.connections
            .get(id)
            .and_then(|conn| conn.player_id.as_deref())
    }

    /// Whether any connection is still bound to `player_id`.
    pub fn is_player_online(&self, player_id: &str) -> bool {
        self.connections
            .values()
            .any(|conn| conn.player_id.as_deref() == Some(player_id))
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no socket is open.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queue a text frame on a single connection. Returns `false` if it is gone.
    pub fn send_to(&self, id: &Uuid, text: &str) -> bool {
        self.connections
            .get(id)
            .is_some_and(|conn| conn.tx.send(Message::Text(text.into())).is_ok())
    }

    /// Queue a text frame on every bound connection.
    ///
    /// Connections whose writer is gone are dropped; the players left without any
    /// connection are returned so the caller can mark them disconnected.
    pub fn broadcast(&mut self, text: &str) -> Vec<String> {
        let failed: Vec<Uuid> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.player_id.is_some())
            .filter(|(_, conn)| conn.tx.send(Message::Text(text.into())).is_err())
            .map(|(id, _)| *id)
            .collect();

        let mut orphaned = Vec::new();
        for id in failed {
            if let Some(player_id) = self.remove(&id) {
                if !self.is_player_online(&player_id) && !orphaned.contains(&player_id) {
                    orphaned.push(player_id);
                }
            }
        }
        orphaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_string(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn broadcast_reaches_only_bound_connections() {
        let mut registry = ConnectionRegistry::default();
        let (bound_tx, mut bound_rx) = mpsc::unbounded_channel();
        let (anon_tx, mut anon_rx) = mpsc::unbounded_channel();
        let bound = Uuid::new_v4();
        registry.insert(bound, bound_tx);
        registry.insert(Uuid::new_v4(), anon_tx);
        registry.bind(&bound, "p1".into());

        assert!(registry.broadcast("hello").is_empty());
        assert_eq!(text(bound_rx.try_recv().unwrap()), "hello");
        assert!(anon_rx.try_recv().is_err());
    }

    #[test]
    fn failed_send_drops_connection_and_reports_orphans() {
        let mut registry = ConnectionRegistry::default();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        let (live_tx, _live_rx) = mpsc::unbounded_channel();
        let (dup_tx, dup_rx) = mpsc::unbounded_channel();
        drop(dup_rx);

        let dead = Uuid::new_v4();
        let live = Uuid::new_v4();
        let dup = Uuid::new_v4();
        registry.insert(dead, dead_tx);
        registry.insert(live, live_tx);
        registry.insert(dup, dup_tx);
        registry.bind(&dead, "gone".into());
        registry.bind(&live, "twice".into());
        registry.bind(&dup, "twice".into());

        let orphaned = registry.broadcast("x");
        assert_eq!(orphaned, vec!["gone".to_string()]);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_player_online("twice"));
    }

    #[test]
    fn rebinding_reports_the_previous_player() {
        let mut registry = ConnectionRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        registry.insert(id, tx);

        assert!(registry.bind(&id, "a".into()).is_none());
        assert_eq!(registry.bind(&id, "b".into()).as_deref(), Some("a"));
        assert!(!registry.is_player_online("a"));
        assert_eq!(registry.player_of(&id), Some("b"));
        assert!(registry.bind(&Uuid::new_v4(), "c".into()).is_none());
    }

    #[test]
    fn unbind_keeps_the_socket_open() {
        let mut registry = ConnectionRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        registry.insert(id, tx);
        registry.bind(&id, "p1".into());

        assert_eq!(registry.unbind(&id).as_deref(), Some("p1"));
        assert!(registry.player_of(&id).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&id).is_none());
        assert!(registry.is_empty());
    }
}
