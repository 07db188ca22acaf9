//! Client connection representation.

use crate::rooms::Identity;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Represents an individual client connection to the server.
///
/// Tracks the essential information about a connected client: the identity
/// bound to the connection (once the client joins a room), the network
/// address, and connection timing.
#[derive(Debug)]
pub struct ClientConnection {
    /// The identity using this connection (None until bound on join)
    pub identity: Option<Identity>,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,
}

impl ClientConnection {
    /// Creates a new client connection with the specified remote address.
    ///
    /// The connection starts without an identity bound and records the
    /// current time as the connection timestamp.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            identity: None,
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }
}
