//! # Lobby Server - Realtime Multiplayer Room Coordination
//!
//! A websocket lobby server for turn-based multiplayer games: clients
//! discover rooms, join and leave them, and play a two-player symbol-grid
//! game inside a room, with state broadcast to all room members.
//!
//! ## Architecture Overview
//!
//! * **Connection Registry**: maps active websocket connections to the
//!   authenticated identity using them ([`connection`])
//! * **Room Directory**: the set of joinable rooms and their membership,
//!   enforcing capacity and the single-room-per-user invariant ([`rooms`])
//! * **Game Engine**: a pure turn-based state machine with win/draw
//!   detection and rematch support ([`game`])
//! * **Session Coordinator**: the orchestration layer binding the above
//!   together in response to inbound protocol events ([`session`])
//!
//! ## Message Flow
//!
//! 1. Client sends a websocket message with an `{"event", "data"}` envelope
//! 2. The frame is parsed into a closed [`protocol::ClientEvent`] union
//! 3. The session coordinator resolves the sender's identity, mutates lobby
//!    state as one atomic step, and emits outbound events
//! 4. Outbound events fan out through the connection manager to the target
//!    connection, the room, or every connected client
//!
//! ## Concurrency Model
//!
//! All lobby state lives behind a single lock owned by the coordinator, so
//! inbound events never interleave their mutations. The only suspension
//! point mid-event is the display-profile fetch during `room:join`, which is
//! awaited before the lock is taken and followed by re-validation.
//!
//! ## Error Handling
//!
//! Protocol violations (joining a full room, moving out of turn, acting
//! without membership) are reported to the originating client only, through
//! `room:join:error` / `game:error` events carrying a human-readable reason.
//! No error in the core is fatal to the process.

// Re-export core types and functions for easy access
pub use config::{RoomConfig, ServerConfig};
pub use error::ServerError;
pub use server::LobbyServer;
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod profile;
pub mod protocol;
pub mod rooms;
pub mod server;
pub mod session;
pub mod utils;

// Crate-level end-to-end tests
mod tests;
