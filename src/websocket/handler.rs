//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle:
//! identify from the handshake query, register with the hub, pump frames
//! both ways, and deregister when either side goes away.

use axum::{
    extract::{
        rejection::QueryRejection,
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use super::hub::PresenceHub;
use super::messages::ClientMessage;
use crate::api::AppState;

/// Handshake query parameters, e.g. `/ws?userId=alice`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Resolve the identity a client claimed at connect time.
///
/// Absent and empty ids both count as anonymous.
pub fn identify(params: &ConnectParams) -> Option<&str> {
    params.user_id.as_deref().filter(|id| !id.is_empty())
}

/// Fall back to an anonymous handshake when the query string does not parse,
/// e.g. a repeated `userId`, so the client is closed with a policy violation
/// instead of failing the upgrade.
fn params_or_anonymous(query: Result<Query<ConnectParams>, QueryRejection>) -> ConnectParams {
    match query {
        Ok(Query(params)) => params,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable handshake query, treating as anonymous");
            ConnectParams::default()
        }
    }
}

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    query: Result<Query<ConnectParams>, QueryRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let params = params_or_anonymous(query);
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, params))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: PresenceHub, params: ConnectParams) {
    let Some(user_id) = identify(&params).map(str::to_owned) else {
        tracing::info!("Anonymous client connected without userId, disconnecting");
        close_with(socket, close_code::POLICY, "userId is required").await;
        return;
    };

    // Outbound queue; the hub holds the only sender
    let (tx, mut rx) = hub.outbound_channel();

    let connection_id = match hub.connect(&user_id, tx) {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to register connection");
            close_with(socket, close_code::ERROR, "presence hub unavailable").await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let conn_id_for_send = connection_id.clone();

    // Task to forward hub events to the WebSocket. Ends when the hub drops
    // this connection's sender, e.g. after a reconnect under the same id.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(
                            connection_id = %conn_id_for_send,
                            "WebSocket send failed, closing connection"
                        );
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                }
            }
        }

        tracing::debug!(connection_id = %conn_id_for_send, "Session released by hub");
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "session replaced".into(),
        };
        let _ = sender.send(Message::Close(Some(frame))).await;
    });

    let hub_for_recv = hub.clone();
    let user_for_recv = user_id.clone();
    let conn_id_for_recv = connection_id.clone();

    // Task to receive frames from the WebSocket and feed them to the hub
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    let keep_open =
                        handle_ws_message(&hub_for_recv, &user_for_recv, &conn_id_for_recv, msg);
                    if !keep_open {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    if let Err(e) = hub.disconnect(&user_id, &connection_id) {
        tracing::error!(
            user_id = %user_id,
            connection_id = %connection_id,
            error = %e,
            "Failed to deregister connection"
        );
    }
}

/// Handle a received WebSocket frame
///
/// Returns false if the connection should be closed.
fn handle_ws_message(
    hub: &PresenceHub,
    user_id: &str,
    connection_id: &str,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::LocationUpdate(location)) => {
                if let Err(e) = hub.location_update(user_id, connection_id, location) {
                    tracing::error!(
                        connection_id = %connection_id,
                        error = %e,
                        "Failed to forward location update"
                    );
                    return false;
                }
                true
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    error = %e,
                    text = %text,
                    "Invalid client message"
                );
                true
            }
        },
        Message::Binary(_) => {
            tracing::debug!(connection_id = %connection_id, "Ignoring binary frame");
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}
