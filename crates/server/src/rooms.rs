use dashmap::DashMap;
use shared::ServerEvent;
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Maps classroom codes to the chat connections currently joined to them.
///
/// Owned by [`crate::state::AppState`] and injected into the WebSocket
/// handler; nothing else holds room membership. Connections are identified
/// by a server-assigned id and reached through their outbound channel, so a
/// broadcast is a fan-out over channel sends rather than direct socket
/// writes.
pub struct RoomRegistry {
    /// Connection id -> sender feeding that connection's writer task.
    senders: DashMap<Uuid, mpsc::Sender<ServerEvent>>,
    /// Classroom code -> ids of connections joined to its room.
    rooms: DashMap<String, HashSet<Uuid>>,
    /// Connection id -> the room it is currently in, if any.
    joined: DashMap<Uuid, String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
            rooms: DashMap::new(),
            joined: DashMap::new(),
        }
    }

    /// Track a new connection. It starts outside any room.
    pub fn register(&self, connection_id: Uuid, sender: mpsc::Sender<ServerEvent>) {
        self.senders.insert(connection_id, sender);
        tracing::info!("Chat client connected: {}", connection_id);
    }

    /// Forget a connection entirely, leaving its room if it was in one.
    pub fn unregister(&self, connection_id: &Uuid) {
        self.leave(connection_id);
        self.senders.remove(connection_id);
        tracing::info!("Chat client disconnected: {}", connection_id);
    }

    /// Put a connection into the room for `code`. A connection is in at
    /// most one room, so any previous membership is dropped first. No
    /// check against the classroom registry: any connection may join any
    /// code.
    pub fn join(&self, connection_id: Uuid, code: &str) {
        self.leave(&connection_id);
        self.rooms
            .entry(code.to_string())
            .or_default()
            .insert(connection_id);
        self.joined.insert(connection_id, code.to_string());
        tracing::debug!("Connection {} joined room {}", connection_id, code);
    }

    fn leave(&self, connection_id: &Uuid) {
        if let Some((_, code)) = self.joined.remove(connection_id) {
            let now_empty = match self.rooms.get_mut(&code) {
                Some(mut members) => {
                    members.remove(connection_id);
                    members.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.rooms.remove_if(&code, |_, members| members.is_empty());
            }
        }
    }

    /// Fan an event out to every connection in the room for `code`.
    /// Best-effort: a closed channel drops that member's delivery and the
    /// rest still receive the event. Returns how many sends succeeded.
    pub async fn broadcast(&self, code: &str, event: ServerEvent) -> usize {
        let member_ids: Vec<Uuid> = match self.rooms.get(code) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let senders: Vec<mpsc::Sender<ServerEvent>> = member_ids
            .iter()
            .filter_map(|id| self.senders.get(id).map(|s| s.value().clone()))
            .collect();

        let mut delivered = 0;
        for sender in senders {
            if sender.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send an event to a single connection. Used for per-connection
    /// errors rather than room traffic.
    pub async fn send_to(&self, connection_id: &Uuid, event: ServerEvent) -> bool {
        let sender = match self.senders.get(connection_id) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        sender.send(event).await.is_ok()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
