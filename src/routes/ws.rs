//! WebSocket transport for the room relay.
//!
//! DESIGN
//! ======
//! The credential arrives as `?token=`. It is verified before the upgrade; a
//! rejected credential gets a plain `401` and the socket never opens, so no
//! frame is ever sent to an unauthenticated peer.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register the connection with an unbounded outbound queue
//! 2. `select!` loop: inbound text → relay; queued messages → socket
//! 3. Close or socket error → unregister (implicit leave of every room)

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::message::ServerMessage;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params.get("token").map_or("", String::as_str);

    let user_id = match state.verifier.verify(token) {
        Ok(uid) => uid,
        Err(e) => {
            warn!(error = %e, "ws: credential rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: String) {
    let conn_id = Uuid::new_v4();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();

    state.relay.connect(conn_id, &user_id, outbox).await;
    info!(%conn_id, %user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => state.relay.handle_text(conn_id, text.as_str()).await,
                    Message::Binary(bytes) => state.relay.handle_binary(conn_id, &bytes).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(out) = inbox.recv() => {
                if send_message(&mut socket, &out).await.is_err() {
                    break;
                }
            }
        }
    }

    state.relay.disconnect(conn_id).await;
    info!(%conn_id, "ws: client disconnected");
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(msg) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, kind = msg.kind(), "ws: failed to serialize message");
            return Err(());
        }
    };
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
