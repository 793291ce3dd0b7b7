//! Live connections and their room memberships.
//!
//! DESIGN
//! ======
//! One record per connected websocket: the authenticated user, the set of
//! joined rooms, and the outbound queue feeding that socket. Membership is
//! process-local and never persisted; a restart starts from nothing.
//!
//! The registry is an explicit object cloned into `AppState`, so tests can
//! run any number of isolated instances side by side. Every operation runs to
//! completion under the lock without awaiting I/O, so `members_of` always
//! reflects joins, leaves and unregisters that finished before it was called.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::message::{ErrorCode, ServerMessage};

/// Identifier assigned to each accepted connection.
pub type ConnectionId = Uuid;

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("already in room: {0}")]
    AlreadyInRoom(String),
    #[error("not in room: {0}")]
    NotInRoom(String),
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

impl ErrorCode for RegistryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyInRoom(_) => "E_ALREADY_IN_ROOM",
            Self::NotInRoom(_) => "E_NOT_IN_ROOM",
            Self::UnknownConnection(_) => "E_UNKNOWN_CONNECTION",
        }
    }
}

struct Connection {
    user_id: String,
    rooms: HashSet<String>,
    outbox: Outbox,
}

/// Snapshot of one registered connection, used for fan-out.
#[derive(Debug, Clone)]
pub struct Member {
    pub conn_id: ConnectionId,
    pub user_id: String,
    outbox: Outbox,
}

impl Member {
    /// Queue a message for this member. Returns `false` if the connection
    /// is already gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.outbox.send(msg).is_ok()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with no joined rooms.
    pub async fn register(&self, conn_id: ConnectionId, user_id: &str, outbox: Outbox) {
        let mut connections = self.connections.write().await;
        connections.insert(conn_id, Connection { user_id: user_id.to_owned(), rooms: HashSet::new(), outbox });
    }

    /// Remove a connection entirely. Returns the rooms it was still joined
    /// to, or `None` if it was never registered.
    pub async fn unregister(&self, conn_id: ConnectionId) -> Option<Vec<String>> {
        let mut connections = self.connections.write().await;
        let conn = connections.remove(&conn_id)?;
        let mut rooms: Vec<String> = conn.rooms.into_iter().collect();
        rooms.sort();
        Some(rooms)
    }

    /// Add `room_id` to the connection's joined set. Returns the user the
    /// connection registered as.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInRoom` if it is already joined, `UnknownConnection`
    /// if the connection is not registered.
    pub async fn join_room(&self, conn_id: ConnectionId, room_id: &str) -> Result<String, RegistryError> {
        let mut connections = self.connections.write().await;
        let conn = connections
            .get_mut(&conn_id)
            .ok_or(RegistryError::UnknownConnection(conn_id))?;
        if !conn.rooms.insert(room_id.to_owned()) {
            return Err(RegistryError::AlreadyInRoom(room_id.to_owned()));
        }
        Ok(conn.user_id.clone())
    }

    /// Remove `room_id` from the connection's joined set. Returns the user
    /// the connection registered as.
    ///
    /// # Errors
    ///
    /// Returns `NotInRoom` if it was not joined, `UnknownConnection` if the
    /// connection is not registered.
    pub async fn leave_room(&self, conn_id: ConnectionId, room_id: &str) -> Result<String, RegistryError> {
        let mut connections = self.connections.write().await;
        let conn = connections
            .get_mut(&conn_id)
            .ok_or(RegistryError::UnknownConnection(conn_id))?;
        if !conn.rooms.remove(room_id) {
            return Err(RegistryError::NotInRoom(room_id.to_owned()));
        }
        Ok(conn.user_id.clone())
    }

    /// The registered user of a connection that has joined `room_id`.
    ///
    /// # Errors
    ///
    /// Returns `NotInRoom` for a connection outside the room (or unknown).
    pub async fn require_joined(&self, conn_id: ConnectionId, room_id: &str) -> Result<String, RegistryError> {
        let connections = self.connections.read().await;
        match connections.get(&conn_id) {
            Some(conn) if conn.rooms.contains(room_id) => Ok(conn.user_id.clone()),
            _ => Err(RegistryError::NotInRoom(room_id.to_owned())),
        }
    }

    /// Every registered connection currently joined to `room_id`.
    pub async fn members_of(&self, room_id: &str) -> Vec<Member> {
        let connections = self.connections.read().await;
        connections
            .iter()
            .filter(|(_, conn)| conn.rooms.contains(room_id))
            .map(|(conn_id, conn)| Member { conn_id: *conn_id, user_id: conn.user_id.clone(), outbox: conn.outbox.clone() })
            .collect()
    }

    /// Queue a private message for one connection. Returns `false` if the
    /// connection is unknown or its socket has gone away.
    pub async fn send_to(&self, conn_id: ConnectionId, msg: ServerMessage) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(&conn_id)
            .is_some_and(|conn| conn.outbox.send(msg).is_ok())
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
