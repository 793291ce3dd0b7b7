//! Room relay: the message-handling state machine.
//!
//! DESIGN
//! ======
//! Per connection and room the only states are NotJoined and Joined. Every
//! operation except `join_room` requires Joined; a message for a room the
//! sender has not joined gets a private `NotInRoom` error and nothing else.
//!
//! Handlers validate, mutate the shape store, and return an `Outcome`. The
//! apply step owns all outbound concerns: a private reply to the sender, or a
//! fan-out to every member of the room (sender included).
//!
//! ORDERING
//! ========
//! Messages run one at a time under `sequencer`, from membership check
//! through persistence and fan-out. Two edits of the same shape are therefore
//! persisted and broadcast in arrival order, and no other message's effects
//! land between an edit's store write and its broadcast. Fan-out iterates a
//! membership snapshot taken after the store write; a member that joins later
//! picks up current state through its own `load_shapes`.
//!
//! ERROR HANDLING
//! ==============
//! All errors here are recoverable: the sender gets an `error` reply and the
//! connection stays usable. Create/update broadcast only after the store
//! write succeeds. Delete broadcasts even when the author filter matched no
//! row; clients may briefly hide a shape that `load_shapes` still returns.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::message::{ClientMessage, ErrorCode, MalformedMessage, ServerMessage, now_timestamp, parse_client_message};
use crate::registry::{ConnectionId, ConnectionRegistry, Outbox, RegistryError};
use crate::store::{ShapeRow, ShapeStore, StoreError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Malformed(#[from] MalformedMessage),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(e) => e.error_code(),
            Self::Registry(e) => e.error_code(),
            Self::Persistence(e) => e.error_code(),
        }
    }
}

/// What a handler wants delivered. Handlers never send directly.
#[derive(Debug)]
enum Outcome {
    /// Send to the originating connection only.
    Reply(ServerMessage),
    /// Send to every current member of the room, sender included.
    Broadcast { room_id: String, message: ServerMessage },
}

pub struct Relay {
    registry: ConnectionRegistry,
    store: Arc<dyn ShapeStore>,
    sequencer: Mutex<()>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl Relay {
    #[must_use]
    pub fn new(registry: ConnectionRegistry, store: Arc<dyn ShapeStore>) -> Self {
        Self { registry, store, sequencer: Mutex::new(()) }
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a freshly authenticated connection with no joined rooms.
    pub async fn connect(&self, conn_id: ConnectionId, user_id: &str, outbox: Outbox) {
        self.registry.register(conn_id, user_id, outbox).await;
        let connections = self.registry.len().await;
        info!(%conn_id, %user_id, connections, "relay: connection registered");
    }

    /// Drop a connection. Leaves every joined room implicitly.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        match self.registry.unregister(conn_id).await {
            Some(rooms) => info!(%conn_id, ?rooms, "relay: connection unregistered"),
            None => debug!(%conn_id, "relay: disconnect for unknown connection"),
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

impl Relay {
    /// Parse one inbound text message and handle it to completion.
    ///
    /// The sender's identity is the one the connection registered with.
    pub async fn handle_text(&self, conn_id: ConnectionId, text: &str) {
        let _turn = self.sequencer.lock().await;

        let result = match parse_client_message(text) {
            Ok(msg) => {
                debug!(%conn_id, kind = msg.kind(), room_id = msg.room_id(), "relay: recv");
                self.dispatch(conn_id, msg).await
            }
            Err(e) => Err(RelayError::from(e)),
        };
        self.apply(conn_id, result).await;
    }

    /// Handle one inbound binary frame. Frames must carry UTF-8 JSON.
    pub async fn handle_binary(&self, conn_id: ConnectionId, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(conn_id, text).await,
            Err(e) => {
                let _turn = self.sequencer.lock().await;
                let err = MalformedMessage(format!("binary frame is not UTF-8: {e}"));
                self.apply(conn_id, Err(err.into())).await;
            }
        }
    }

    async fn dispatch(&self, conn_id: ConnectionId, msg: ClientMessage) -> Result<Outcome, RelayError> {
        match msg {
            ClientMessage::JoinRoom { room_id } => {
                let user_id = self.registry.join_room(conn_id, &room_id).await?;
                info!(%conn_id, %user_id, %room_id, "relay: joined room");
                Ok(Outcome::Reply(ServerMessage::JoinRoomSuccess { room_id }))
            }
            ClientMessage::LeaveRoom { room_id } => {
                let user_id = self.registry.leave_room(conn_id, &room_id).await?;
                info!(%conn_id, %user_id, %room_id, "relay: left room");
                Ok(Outcome::Reply(ServerMessage::LeaveRoomSuccess { room_id }))
            }
            ClientMessage::ShapeCreate { room_id, shape } => {
                let sender_id = self.registry.require_joined(conn_id, &room_id).await?;
                self.store
                    .upsert(ShapeRow::from_shape(&room_id, &shape, &sender_id))
                    .await?;
                let message = ServerMessage::ShapeCreate {
                    room_id: room_id.clone(),
                    shape,
                    sender_id,
                    timestamp: now_timestamp(),
                };
                Ok(Outcome::Broadcast { room_id, message })
            }
            ClientMessage::ShapeUpdate { room_id, shape } => {
                let sender_id = self.registry.require_joined(conn_id, &room_id).await?;
                self.store
                    .upsert(ShapeRow::from_shape(&room_id, &shape, &sender_id))
                    .await?;
                let message = ServerMessage::ShapeUpdate {
                    room_id: room_id.clone(),
                    shape,
                    sender_id,
                    timestamp: now_timestamp(),
                };
                Ok(Outcome::Broadcast { room_id, message })
            }
            ClientMessage::ShapeDelete { room_id, shape_id } => {
                let sender_id = self.registry.require_joined(conn_id, &room_id).await?;
                let removed = self
                    .store
                    .delete_shape(&room_id, &shape_id, Some(&sender_id))
                    .await?;
                if removed == 0 {
                    debug!(%conn_id, %room_id, %shape_id, "relay: delete matched no shape authored by sender");
                }
                let message = ServerMessage::ShapeDelete {
                    room_id: room_id.clone(),
                    shape_id,
                    sender_id,
                    timestamp: now_timestamp(),
                };
                Ok(Outcome::Broadcast { room_id, message })
            }
            ClientMessage::ClearAllShapes { room_id } => {
                let sender_id = self.registry.require_joined(conn_id, &room_id).await?;
                let removed = self.store.delete_all(&room_id).await?;
                info!(%conn_id, %room_id, removed, "relay: cleared room");
                let message = ServerMessage::ClearAllShapes {
                    room_id: room_id.clone(),
                    sender_id,
                    timestamp: now_timestamp(),
                };
                Ok(Outcome::Broadcast { room_id, message })
            }
            ClientMessage::LoadShapes { room_id } => {
                self.registry.require_joined(conn_id, &room_id).await?;
                let rows = self.store.list(&room_id).await?;
                let mut shapes = Vec::with_capacity(rows.len());
                for row in rows {
                    let shape_id = row.shape_id.clone();
                    match row.into_shape() {
                        Ok(shape) => shapes.push(shape),
                        Err(e) => warn!(%room_id, %shape_id, error = %e, "relay: skipping unreadable stored shape"),
                    }
                }
                Ok(Outcome::Reply(ServerMessage::ShapesLoaded { room_id, shapes, timestamp: now_timestamp() }))
            }
        }
    }

    /// Deliver a handler result. Errors become a private `error` reply.
    async fn apply(&self, conn_id: ConnectionId, result: Result<Outcome, RelayError>) {
        match result {
            Ok(Outcome::Reply(message)) => {
                if !self.registry.send_to(conn_id, message).await {
                    debug!(%conn_id, "relay: reply dropped, connection gone");
                }
            }
            Ok(Outcome::Broadcast { room_id, message }) => {
                self.broadcast(&room_id, &message).await;
            }
            Err(e) => {
                warn!(%conn_id, code = e.error_code(), error = %e, "relay: error reply");
                if !self
                    .registry
                    .send_to(conn_id, ServerMessage::error_from(&e))
                    .await
                {
                    debug!(%conn_id, "relay: error reply dropped, connection gone");
                }
            }
        }
    }

    /// Send to every member of `room_id`. A dead member never stops delivery
    /// to the rest.
    async fn broadcast(&self, room_id: &str, message: &ServerMessage) {
        let members = self.registry.members_of(room_id).await;
        let mut delivered = 0usize;
        for member in &members {
            if member.send(message.clone()) {
                delivered += 1;
            } else {
                debug!(conn_id = %member.conn_id, user_id = %member.user_id, %room_id, "relay: broadcast skipped closed connection");
            }
        }
        debug!(%room_id, kind = message.kind(), members = members.len(), delivered, "relay: broadcast");
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
