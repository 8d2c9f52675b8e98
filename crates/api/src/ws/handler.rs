use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use reflex_events::EventBus;

use crate::state::AppState;
use crate::ws::manager::WsManager;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, state.bus))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Forwards every inbound text or binary frame to the inbound queue.
///   4. Cleans up on close or read error.
///
/// Nothing here parses the frames; malformed events are the dispatcher's
/// concern.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, bus: EventBus) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                tracing::error!(conn_id = %sender_conn_id, error = %e, "Unable to write WebSocket message");
                break;
            }
        }
    });

    // Receiver loop: forward inbound frames. Sending waits while the inbound
    // queue is full, which stops reading from this socket.
    while let Some(result) = stream.next().await {
        let raw = match result {
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Binary(bytes)) => bytes.to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Ping/Pong received");
                continue;
            }
            Err(e) => {
                tracing::error!(conn_id = %conn_id, error = %e, "Unable to read incoming WebSocket message");
                break;
            }
        };

        if bus.publish_inbound(raw).await.is_err() {
            tracing::warn!(conn_id = %conn_id, "Inbound queue closed, dropping connection");
            break;
        }
    }

    // Clean up: remove connection and abort sender task.
    let connected_for_secs = ws_manager
        .remove(&conn_id)
        .await
        .map(|conn| (chrono::Utc::now() - conn.connected_at).num_seconds());
    send_task.abort();
    tracing::info!(conn_id = %conn_id, connected_for_secs, "WebSocket disconnected");
}
