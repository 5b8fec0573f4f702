//! WebSocket notification channel.
//!
//! Clients connect to `GET /api/ws?token=<jwt>`; the token rides the query
//! string because browsers cannot set headers on a socket upgrade. Each
//! connection subscribes to the broadcast hub and receives only the events
//! addressed to its audience, framed as `{"event": ..., "data": ...}`.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{AppError, Result};
use crate::services::auth::{self, AuthenticatedUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// `GET /api/ws`
pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let identity = auth::decode_token(&state.config().jwt_secret, &query.token)
        .map_err(|_| AppError::Unauthorized("Invalid socket token".to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

async fn handle_socket(socket: WebSocket, state: AppState, identity: AuthenticatedUser) {
    tracing::debug!(user_id = %identity.user_id, "socket connected");
    let mut events = state.notifier().subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !event.is_for(identity.user_id, identity.is_admin()) {
                        continue;
                    }
                    let frame = json!({
                        "event": event.event,
                        "data": event.payload,
                    });
                    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                // Skipping missed events is fine; the feed endpoint is the
                // source of truth.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %identity.user_id, skipped, "socket lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Ping(payload))) => {
                    if sink.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(user_id = %identity.user_id, "socket disconnected");
}
