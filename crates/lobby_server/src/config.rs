//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the lobby server behavior, including the
//! fixed room catalog created at process start.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the lobby server.
///
/// Contains all necessary parameters to configure server behavior including
/// network settings, connection limits, and the catalog of rooms that exist
/// for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Connection timeout in seconds
    pub connection_timeout: u64,

    /// The fixed catalog of rooms created at startup
    pub rooms: Vec<RoomConfig>,
}

/// Static definition of a single room in the catalog.
///
/// Rooms are not created or destroyed at runtime; the catalog is read once
/// at startup and handed to the room directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Stable room identifier (e.g., "tic-tac-toe")
    pub id: String,

    /// Human-readable room name shown in the lobby
    pub name: String,

    /// The game kind played in this room
    pub game_kind: String,

    /// Maximum number of members the room admits
    pub capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("Invalid default bind address"),
            max_connections: 1000,
            connection_timeout: 60,
            rooms: default_room_catalog(),
        }
    }
}

/// The reference deployment's permanent room catalog: one room per supported
/// game kind. Only tic-tac-toe has a playable engine today; the remaining
/// rooms are joinable placeholders.
pub fn default_room_catalog() -> Vec<RoomConfig> {
    vec![
        RoomConfig {
            id: "tic-tac-toe".to_string(),
            name: "Tic Tac Toe".to_string(),
            game_kind: "tic-tac-toe".to_string(),
            capacity: 2,
        },
        RoomConfig {
            id: "chess".to_string(),
            name: "Chess".to_string(),
            game_kind: "chess".to_string(),
            capacity: 2,
        },
        RoomConfig {
            id: "checkers".to_string(),
            name: "Checkers".to_string(),
            game_kind: "checkers".to_string(),
            capacity: 2,
        },
        RoomConfig {
            id: "card-game".to_string(),
            name: "Card Game".to_string(),
            game_kind: "card-game".to_string(),
            capacity: 6,
        },
    ]
}
