//! Wire protocol spoken between clients and the relay.
//!
//! ARCHITECTURE
//! ============
//! Every exchange is one JSON object per websocket text message, tagged by
//! `type`. Clients send `ClientMessage`s; the relay answers with
//! `ServerMessage`s, either privately to the sender or broadcast to every
//! member of a room (sender included; clients drop their own echo by
//! comparing `senderId`).
//!
//! DESIGN
//! ======
//! - Field names are camelCase on the wire (`roomId`, `shapeId`, `senderId`).
//! - Errors carry a human-readable `message` and a grepable `code`.
//! - Timestamps are server-assigned RFC 3339 strings in UTC.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::shape::Shape;

// =============================================================================
// INBOUND
// =============================================================================

/// A request from a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    ShapeCreate { room_id: String, shape: Shape },
    ShapeUpdate { room_id: String, shape: Shape },
    ShapeDelete { room_id: String, shape_id: String },
    ClearAllShapes { room_id: String },
    LoadShapes { room_id: String },
}

impl ClientMessage {
    /// The room this message targets.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom { room_id }
            | Self::LeaveRoom { room_id }
            | Self::ShapeCreate { room_id, .. }
            | Self::ShapeUpdate { room_id, .. }
            | Self::ShapeDelete { room_id, .. }
            | Self::ClearAllShapes { room_id }
            | Self::LoadShapes { room_id } => room_id,
        }
    }

    /// Wire name of the message kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::ShapeCreate { .. } => "shape_create",
            Self::ShapeUpdate { .. } => "shape_update",
            Self::ShapeDelete { .. } => "shape_delete",
            Self::ClearAllShapes { .. } => "clear_all_shapes",
            Self::LoadShapes { .. } => "load_shapes",
        }
    }
}

/// Inbound text that could not be turned into a `ClientMessage`.
#[derive(Debug, thiserror::Error)]
#[error("malformed message: {0}")]
pub struct MalformedMessage(pub String);

impl ErrorCode for MalformedMessage {
    fn error_code(&self) -> &'static str {
        "E_MALFORMED"
    }
}

/// Parse and validate one inbound text message.
///
/// # Errors
///
/// Returns `MalformedMessage` for invalid JSON, an unknown `type`, missing
/// fields, an empty `roomId`, or an empty shape id.
pub fn parse_client_message(text: &str) -> Result<ClientMessage, MalformedMessage> {
    let msg: ClientMessage = serde_json::from_str(text).map_err(|e| MalformedMessage(e.to_string()))?;

    if msg.room_id().is_empty() {
        return Err(MalformedMessage("roomId must not be empty".into()));
    }
    match &msg {
        ClientMessage::ShapeCreate { shape, .. } | ClientMessage::ShapeUpdate { shape, .. } if shape.id.is_empty() => {
            Err(MalformedMessage("shape.id must not be empty".into()))
        }
        ClientMessage::ShapeDelete { shape_id, .. } if shape_id.is_empty() => {
            Err(MalformedMessage("shapeId must not be empty".into()))
        }
        _ => Ok(msg),
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// A message from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    JoinRoomSuccess {
        room_id: String,
    },
    LeaveRoomSuccess {
        room_id: String,
    },
    ShapeCreate {
        room_id: String,
        shape: Shape,
        sender_id: String,
        timestamp: String,
    },
    ShapeUpdate {
        room_id: String,
        shape: Shape,
        sender_id: String,
        timestamp: String,
    },
    ShapeDelete {
        room_id: String,
        shape_id: String,
        sender_id: String,
        timestamp: String,
    },
    ClearAllShapes {
        room_id: String,
        sender_id: String,
        timestamp: String,
    },
    ShapesLoaded {
        room_id: String,
        shapes: Vec<Shape>,
        timestamp: String,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerMessage {
    /// Structured error reply from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error { message: err.to_string(), code: Some(err.error_code().to_string()) }
    }

    /// Wire name of the message kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoomSuccess { .. } => "join_room_success",
            Self::LeaveRoomSuccess { .. } => "leave_room_success",
            Self::ShapeCreate { .. } => "shape_create",
            Self::ShapeUpdate { .. } => "shape_update",
            Self::ShapeDelete { .. } => "shape_delete",
            Self::ClearAllShapes { .. } => "clear_all_shapes",
            Self::ShapesLoaded { .. } => "shapes_loaded",
            Self::Error { .. } => "error",
        }
    }
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured error replies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// HELPERS
// =============================================================================

/// Stamped on outbound messages if the clock cannot be formatted.
pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Current time as an RFC 3339 UTC string.
#[must_use]
pub fn now_timestamp() -> String {
    match OffsetDateTime::now_utc().format(&Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::warn!(error = %e, "message: clock not representable as RFC 3339");
            EPOCH_TIMESTAMP.to_owned()
        }
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
