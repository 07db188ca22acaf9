//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central registry for all client connections,
//! handling connection lifecycle, identity binding, and message delivery.
//! It is a pure associative store: no lobby or game validation lives here.

use super::{client::ClientConnection, ConnectionId};
use crate::rooms::Identity;
use futures_util::sink::SinkExt;
use futures_util::stream::SplitSink;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::info;

type WsSender = Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<tokio::net::TcpStream>, Message>>>;

/// Central registry for all client connections.
///
/// The `ConnectionManager` tracks active connections, assigns unique IDs,
/// maps connections to the authenticated identity using them, and provides
/// message delivery. Outbound messages flow through a broadcast channel of
/// `(ConnectionId, bytes)` pairs that each connection handler subscribes to;
/// this channel is also the observation point for tests.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,

    /// WebSocket sender halves, registered per connection
    ws_senders: Arc<RwLock<HashMap<ConnectionId, WsSender>>>,

    /// Atomic counter for generating unique connection IDs
    next_id: Arc<std::sync::atomic::AtomicUsize>,

    /// Broadcast sender for outgoing messages to specific connections
    sender: broadcast::Sender<(ConnectionId, Vec<u8>)>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            ws_senders: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(std::sync::atomic::AtomicUsize::new(1)),
            sender,
        }
    }

    /// Adds a new connection and returns its unique ID.
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let connection_id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr);
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, connection);
        info!("⚡ Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Register the WebSocket sender half for a connection.
    pub async fn register_ws_sender(&self, connection_id: ConnectionId, ws_sender: WsSender) {
        let mut senders = self.ws_senders.write().await;
        senders.insert(connection_id, ws_sender);
    }

    /// Remove the WebSocket sender half for a connection.
    pub async fn remove_ws_sender(&self, connection_id: ConnectionId) {
        let mut senders = self.ws_senders.write().await;
        senders.remove(&connection_id);
    }

    /// Removes a connection from the registry.
    ///
    /// This should be called when a client disconnects or times out, after
    /// the coordinator has run its disconnect cleanup.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            info!(
                "🔥 Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
    }

    /// Binds an authenticated identity to a connection.
    ///
    /// Called when the client first announces itself on `room:join`; the
    /// identity is trusted as resolved by the upstream auth layer.
    pub async fn bind(&self, connection_id: ConnectionId, identity: Identity) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.identity = Some(identity);
        }
    }

    /// Resolves the identity bound to a connection, if any.
    pub async fn lookup(&self, connection_id: ConnectionId) -> Option<Identity> {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .and_then(|c| c.identity.clone())
    }

    /// Clears and returns the identity bound to a connection.
    ///
    /// Called only on transport disconnect.
    pub async fn unbind(&self, connection_id: ConnectionId) -> Option<Identity> {
        let mut connections = self.connections.write().await;
        connections
            .get_mut(&connection_id)
            .and_then(|c| c.identity.take())
    }

    /// Finds the connection a given identity is currently using.
    pub async fn connection_of(&self, identity_id: &str) -> Option<ConnectionId> {
        let connections = self.connections.read().await;
        for (conn_id, connection) in connections.iter() {
            if connection
                .identity
                .as_ref()
                .is_some_and(|i| i.id == identity_id)
            {
                return Some(*conn_id);
            }
        }
        None
    }

    /// Queues a message for delivery to a specific connection.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, message: Vec<u8>) {
        if let Err(e) = self.sender.send((connection_id, message)) {
            tracing::error!(
                "Failed to send message to connection {}: {:?}",
                connection_id,
                e
            );
        }
    }

    /// Broadcasts a message to all currently connected clients.
    ///
    /// Returns the number of connections the message was queued for.
    pub async fn broadcast_to_all(&self, message: Vec<u8>) -> usize {
        let connections = self.connections.read().await;
        let connection_count = connections.len();

        for &connection_id in connections.keys() {
            if let Err(e) = self.sender.send((connection_id, message.clone())) {
                tracing::error!(
                    "Failed to broadcast message to connection {}: {:?}",
                    connection_id,
                    e
                );
            }
        }

        tracing::debug!("📡 Broadcasted message to {} connections", connection_count);
        connection_count
    }

    /// Creates a new receiver for outgoing messages.
    ///
    /// Each connection handler calls this to get a receiver for messages
    /// targeted at its specific connection.
    pub fn subscribe(&self) -> broadcast::Receiver<(ConnectionId, Vec<u8>)> {
        self.sender.subscribe()
    }

    /// Sends a close frame to a connection's websocket, if registered.
    pub async fn close_connection(&self, connection_id: ConnectionId) {
        let senders = self.ws_senders.read().await;
        if let Some(ws_sender) = senders.get(&connection_id) {
            let mut ws_sender = ws_sender.lock().await;
            let _ = ws_sender.send(Message::Close(None)).await;
        }
    }

    /// Number of currently tracked connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            username: id.to_string(),
            profile_picture: None,
        }
    }

    #[tokio::test]
    async fn bind_lookup_unbind_round_trip() {
        let manager = ConnectionManager::new();
        let conn = manager.add_connection(addr()).await;

        assert_eq!(manager.lookup(conn).await, None);

        manager.bind(conn, identity("u1")).await;
        assert_eq!(manager.lookup(conn).await.unwrap().id, "u1");
        assert_eq!(manager.connection_of("u1").await, Some(conn));

        let unbound = manager.unbind(conn).await.unwrap();
        assert_eq!(unbound.id, "u1");
        assert_eq!(manager.lookup(conn).await, None);
        assert_eq!(manager.connection_of("u1").await, None);
    }

    #[tokio::test]
    async fn messages_are_delivered_per_connection() {
        let manager = ConnectionManager::new();
        let conn = manager.add_connection(addr()).await;
        let mut rx = manager.subscribe();

        manager.send_to_connection(conn, b"hello".to_vec()).await;
        let (target, payload) = rx.recv().await.unwrap();
        assert_eq!(target, conn);
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let manager = ConnectionManager::new();
        let a = manager.add_connection(addr()).await;
        let b = manager.add_connection(addr()).await;
        let mut rx = manager.subscribe();

        let count = manager.broadcast_to_all(b"lobby".to_vec()).await;
        assert_eq!(count, 2);

        let mut targets = vec![rx.recv().await.unwrap().0, rx.recv().await.unwrap().0];
        targets.sort_unstable();
        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(targets, expected);
    }
}
