use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use crate::ws::manager::WsManager;

/// Spawn the task that drains the outbound queue to connected peers.
///
/// Each message is broadcast as a text frame to every connection. With no
/// peer connected the message is discarded. The task ends when every
/// producer of the queue has been dropped.
pub fn start_outbound_pump(
    ws_manager: Arc<WsManager>,
    mut outbound: mpsc::Receiver<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let delivered = ws_manager.broadcast(Message::Text(message.into())).await;
            if delivered == 0 {
                tracing::debug!("No WebSocket peers connected, outbound message dropped");
            } else {
                tracing::trace!(delivered, "Outbound message delivered");
            }
        }
        tracing::info!("Outbound queue closed, pump stopped");
    })
}
