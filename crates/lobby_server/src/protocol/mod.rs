//! Wire protocol types for client-server communication.
//!
//! Every message on the wire is a JSON envelope `{"event": ..., "data": ...}`.
//! Inbound and outbound messages are closed tagged unions with one fixed-shape
//! payload per kind, exhaustively matched at the transport boundary; an
//! unknown event kind fails deserialization and is rejected rather than
//! silently ignored.

use crate::game::{Outcome, Symbol};
use crate::rooms::{Identity, Member, Room};
use serde::{Deserialize, Serialize};

/// A message sent from a client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Request the current room list.
    #[serde(rename = "room:list")]
    RoomList,

    /// Join a room, announcing the sender's identity.
    #[serde(rename = "room:join")]
    #[serde(rename_all = "camelCase")]
    RoomJoin { room_id: String, identity: Identity },

    /// Leave a room.
    #[serde(rename = "room:leave")]
    #[serde(rename_all = "camelCase")]
    RoomLeave { room_id: String },

    /// Start the room's game (host only, room at capacity).
    #[serde(rename = "game:start")]
    #[serde(rename_all = "camelCase")]
    GameStart { room_id: String },

    /// Place the sender's symbol into a cell.
    #[serde(rename = "game:move")]
    #[serde(rename_all = "camelCase")]
    GameMove { room_id: String, cell_index: usize },

    /// Restart a finished game with the same players (host only).
    #[serde(rename = "game:rematch")]
    #[serde(rename_all = "camelCase")]
    GameRematch { room_id: String },
}

/// A player's symbol assignment, broadcast on game start and rematch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAssignment {
    pub player_id: String,
    pub symbol: Symbol,
}

/// A message sent from the server to one client or broadcast to many.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// The full ordered room list.
    #[serde(rename = "room:list")]
    RoomList(Vec<Room>),

    /// Join confirmation carrying the joined room's snapshot (joiner only).
    #[serde(rename = "room:joined")]
    RoomJoined(Room),

    /// Another member joined the room.
    #[serde(rename = "room:playerJoined")]
    #[serde(rename_all = "camelCase")]
    RoomPlayerJoined { room_id: String, player: Member },

    /// A member left the room.
    #[serde(rename = "room:playerLeft")]
    #[serde(rename_all = "camelCase")]
    RoomPlayerLeft { room_id: String, player_id: String },

    /// A join attempt was rejected (requester only).
    #[serde(rename = "room:join:error")]
    RoomJoinError { message: String },

    /// A game started; symbols were assigned in the listed order.
    #[serde(rename = "game:start")]
    #[serde(rename_all = "camelCase")]
    GameStart {
        room_id: String,
        players: Vec<PlayerAssignment>,
    },

    /// A finished game was restarted with the same assignments.
    #[serde(rename = "game:rematch")]
    #[serde(rename_all = "camelCase")]
    GameRematch {
        room_id: String,
        players: Vec<PlayerAssignment>,
    },

    /// A validated move was applied.
    #[serde(rename = "game:move")]
    #[serde(rename_all = "camelCase")]
    GameMove {
        room_id: String,
        board: [Option<Symbol>; 9],
        turn: Symbol,
    },

    /// The game reached a terminal state.
    #[serde(rename = "game:end")]
    #[serde(rename_all = "camelCase")]
    GameEnd {
        room_id: String,
        outcome: Outcome,
        board: [Option<Symbol>; 9],
    },

    /// A game request was rejected (requester only).
    #[serde(rename = "game:error")]
    GameError { message: String },
}

impl ServerEvent {
    /// Serializes the event to its wire representation.
    ///
    /// Serialization of these closed types cannot fail; the fallback keeps
    /// the transport path panic-free regardless.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}
