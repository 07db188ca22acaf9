//! Connection handling logic for WebSocket clients.
//!
//! This module contains the per-connection handling logic: WebSocket
//! handshaking, message parsing and dispatch to the session coordinator,
//! outbound delivery, and disconnect cleanup.

use crate::{
    connection::{ConnectionId, ConnectionManager},
    error::ServerError,
    protocol::{ClientEvent, ServerEvent},
    session::SessionCoordinator,
};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, warn};

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register the connection and its sender half with the registry
/// 3. Run the incoming and outgoing message tasks concurrently
/// 4. On termination, run coordinator disconnect cleanup and deregister
///
/// Inbound text frames are parsed as [`ClientEvent`]s; an unparseable or
/// unknown event kind is logged and answered with a `game:error` rather than
/// silently dropped.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    coordinator: Arc<SessionCoordinator>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let connection_id = connection_manager.add_connection(addr).await;
    connection_manager
        .register_ws_sender(connection_id, ws_sender.clone())
        .await;

    let mut message_receiver = connection_manager.subscribe();
    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming message task - parses frames and dispatches to the coordinator
    let incoming_task = {
        let connection_manager = connection_manager.clone();
        let coordinator = coordinator.clone();

        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        dispatch_client_message(&text, connection_id, &connection_manager, &coordinator)
                            .await;
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    // Outgoing message task - forwards queued messages for this connection
    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            while let Ok((target_connection_id, message)) = message_receiver.recv().await {
                if target_connection_id == connection_id {
                    let message_text = String::from_utf8_lossy(&message);
                    let mut ws_sender = ws_sender.lock().await;
                    if let Err(e) = ws_sender
                        .send(Message::Text(message_text.to_string().into()))
                        .await
                    {
                        error!("Failed to send message: {}", e);
                        break;
                    }
                }
            }
        }
    };

    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    // Disconnect is the implicit leave-plus-forfeit signal; the coordinator
    // cleans up room membership and any game in progress before the
    // connection record is dropped.
    coordinator.handle_disconnect(connection_id).await;
    connection_manager.remove_connection(connection_id).await;
    connection_manager.remove_ws_sender(connection_id).await;
    Ok(())
}

/// Parses one inbound text frame and hands it to the coordinator.
async fn dispatch_client_message(
    text: &str,
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    coordinator: &SessionCoordinator,
) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => {
            debug!("📨 Connection {}: {:?}", connection_id, event);
            coordinator.handle_event(connection_id, event).await;
        }
        Err(e) => {
            warn!("Rejected message from connection {}: {}", connection_id, e);
            connection_manager
                .send_to_connection(
                    connection_id,
                    ServerEvent::GameError {
                        message: "Unrecognized event.".to_string(),
                    }
                    .to_bytes(),
                )
                .await;
        }
    }
}
