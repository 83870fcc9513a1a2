//! Volatile room membership for live connections.
//!
//! A connection is in at most one room at a time; joining another room
//! replaces the previous membership. Nothing here is persisted.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Room every client can join without any prior setup.
pub const DEFAULT_ROOM: &str = "public";

struct Connection {
    sender: mpsc::UnboundedSender<String>,
    room: Option<String>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl Inner {
    fn remove_membership(&mut self, id: ConnectionId, room: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live connection. Events broadcast to its room arrive on
    /// the returned receiver as serialized frames.
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::now_v7();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .write()
            .await
            .connections
            .insert(id, Connection { sender, room: None });
        (id, receiver)
    }

    /// Puts `id` in `room`, leaving whatever room it was in before.
    /// Returns false for a connection that is not registered.
    pub async fn join(&self, id: ConnectionId, room: &str) -> bool {
        let mut inner = self.inner.write().await;

        let previous = match inner.connections.get_mut(&id) {
            Some(conn) if conn.room.as_deref() == Some(room) => return true,
            Some(conn) => conn.room.replace(room.to_owned()),
            None => return false,
        };
        if let Some(previous) = previous {
            inner.remove_membership(id, &previous);
        }

        inner.rooms.entry(room.to_owned()).or_default().insert(id);
        true
    }

    /// Drops the connection and every membership it held.
    pub async fn leave_all(&self, id: ConnectionId) {
        let mut inner = self.inner.write().await;
        if let Some(conn) = inner.connections.remove(&id) {
            if let Some(room) = conn.room {
                inner.remove_membership(id, &room);
            }
        }
    }

    pub async fn members_of(&self, room: &str) -> HashSet<ConnectionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn room_of(&self, id: ConnectionId) -> Option<String> {
        self.inner
            .read()
            .await
            .connections
            .get(&id)
            .and_then(|conn| conn.room.clone())
    }

    /// Number of members per non-empty room.
    pub async fn room_counts(&self) -> HashMap<String, usize> {
        self.inner
            .read()
            .await
            .rooms
            .iter()
            .map(|(room, members)| (room.clone(), members.len()))
            .collect()
    }

    /// Queues `frame` for every member of `room` and returns how many
    /// queues accepted it. No acknowledgement, no retry.
    pub async fn broadcast(&self, room: &str, frame: &str) -> usize {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return 0;
        };

        members
            .iter()
            .filter_map(|id| inner.connections.get(id))
            .filter(|conn| conn.sender.send(frame.to_owned()).is_ok())
            .count()
    }
}
