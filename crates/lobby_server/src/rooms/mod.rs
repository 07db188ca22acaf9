//! Room directory: the set of joinable rooms and their membership.
//!
//! The directory enforces the two lobby invariants: a room never holds more
//! members than its capacity, and an identity is a member of at most one room
//! process-wide. It is plain owned data; the session coordinator is the only
//! component that mutates it.

use crate::config::RoomConfig;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// An authenticated user as supplied by the upstream auth/profile collaborator.
///
/// Immutable for the lifetime of a connection and never persisted beyond
/// process memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user identifier from the auth layer
    pub id: String,

    /// Display name shown to other players
    pub username: String,

    /// Optional reference to the user's avatar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

/// A room member: an identity plus the moment it joined.
///
/// `joined_at` exists solely to total-order members for host determination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(flatten)]
    pub identity: Identity,

    /// Wall-clock join timestamp in milliseconds since the Unix epoch
    pub joined_at: u64,
}

/// A joinable room and its current membership.
///
/// Member ordering is significant: members are appended in join order and
/// never reordered, so the earliest-joined member is the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,

    #[serde(rename = "players")]
    pub members: Vec<Member>,

    #[serde(rename = "maxPlayers")]
    pub capacity: usize,

    #[serde(rename = "gameType")]
    pub game_kind: String,
}

impl Room {
    /// Returns the identity of the room's host, if the room has any members.
    ///
    /// The host is the member with the minimal `joined_at`; on a timestamp tie
    /// the first-inserted member wins (`min_by_key` keeps the first minimum).
    pub fn host(&self) -> Option<&Identity> {
        self.members
            .iter()
            .min_by_key(|m| m.joined_at)
            .map(|m| &m.identity)
    }
}

/// Reasons a join attempt can be rejected.
///
/// `AlreadyInThisRoom` is an idempotent no-op from the caller's perspective
/// and must not be treated as fatal by the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("You are already in this room.")]
    AlreadyInThisRoom,

    #[error("You are already in another room. Leave first to join a new one.")]
    AlreadyInOtherRoom,

    #[error("Room is full.")]
    RoomFull,

    #[error("Room not found.")]
    UnknownRoom,
}

/// The set of all rooms, created once at process start from the config
/// catalog.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: Vec<Room>,
}

impl RoomDirectory {
    /// Builds the directory from the static room catalog.
    pub fn from_catalog(catalog: &[RoomConfig]) -> Self {
        let rooms = catalog
            .iter()
            .map(|c| Room {
                id: c.id.clone(),
                name: c.name.clone(),
                members: Vec::new(),
                capacity: c.capacity,
                game_kind: c.game_kind.clone(),
            })
            .collect();
        Self { rooms }
    }

    /// Returns snapshots of all rooms in catalog order.
    pub fn list(&self) -> Vec<Room> {
        self.rooms.clone()
    }

    /// Looks up a room by its identifier.
    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    /// Finds the room an identity is currently a member of, if any.
    ///
    /// Linear scan over all rooms' member lists; acceptable at lobby scale.
    pub fn find_room_of(&self, identity_id: &str) -> Option<&Room> {
        self.rooms
            .iter()
            .find(|r| r.members.iter().any(|m| m.identity.id == identity_id))
    }

    /// Attempts to add `identity` to the room identified by `room_id`.
    ///
    /// Validation order: membership of this room, membership of any other
    /// room, room existence, capacity. On success the new member is appended,
    /// preserving insertion order (host determination depends on this), and
    /// returned for downstream notification.
    pub fn join(&mut self, room_id: &str, identity: Identity) -> Result<Member, JoinError> {
        if let Some(existing) = self.find_room_of(&identity.id) {
            return Err(if existing.id == room_id {
                JoinError::AlreadyInThisRoom
            } else {
                JoinError::AlreadyInOtherRoom
            });
        }

        let room = self
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or(JoinError::UnknownRoom)?;

        if room.members.len() >= room.capacity {
            return Err(JoinError::RoomFull);
        }

        let member = Member {
            identity,
            joined_at: now_millis(),
        };
        room.members.push(member.clone());
        Ok(member)
    }

    /// Removes `identity_id` from the room if present.
    ///
    /// Returns the removed member for downstream notification; a no-op (not
    /// an error) if the identity is not a member.
    pub fn leave(&mut self, room_id: &str, identity_id: &str) -> Option<Member> {
        let room = self.rooms.iter_mut().find(|r| r.id == room_id)?;
        let index = room
            .members
            .iter()
            .position(|m| m.identity.id == identity_id)?;
        Some(room.members.remove(index))
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
