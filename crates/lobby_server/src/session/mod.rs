//! Session coordinator: the orchestration layer of the lobby.
//!
//! Translates inbound protocol events into room-directory and game-engine
//! operations and the corresponding outbound events. This is the only
//! component with authority to combine connection registry, room directory,
//! and game-session state in one transaction: all lobby state lives behind a
//! single mutex, so each inbound event is processed as one atomic step and
//! no two handlers interleave their mutations.
//!
//! The one genuine suspension point mid-event is the display-profile fetch on
//! `room:join`; it is awaited *before* the lobby lock is taken, and the join
//! preconditions are re-validated under the lock afterwards.

use crate::{
    config::ServerConfig,
    connection::{ConnectionId, ConnectionManager},
    game::GameSession,
    profile::{NoProfileProvider, ProfileProvider},
    protocol::{ClientEvent, PlayerAssignment, ServerEvent},
    rooms::{Identity, JoinError, Member, RoomDirectory},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// All mutable lobby state, guarded by one lock.
///
/// A room with no entry in `games` is in the implicit `Waiting` state.
#[derive(Debug)]
struct LobbyState {
    rooms: RoomDirectory,
    games: HashMap<String, GameSession>,
}

/// Binds the connection registry, room directory, and game engine together.
///
/// Constructed once at process start and shared by `Arc` with every
/// connection handler; never accessed through ambient globals, so tests can
/// drive it with fixture state and observe outbound traffic by subscribing
/// to the connection manager's channel.
pub struct SessionCoordinator {
    connections: Arc<ConnectionManager>,
    profiles: Arc<dyn ProfileProvider>,
    state: Mutex<LobbyState>,
}

impl SessionCoordinator {
    /// Creates a coordinator over the given connection registry, with the
    /// room catalog taken from the server configuration.
    pub fn new(config: &ServerConfig, connections: Arc<ConnectionManager>) -> Self {
        Self::with_profile_provider(config, connections, Arc::new(NoProfileProvider))
    }

    /// Creates a coordinator with an explicit profile collaborator.
    pub fn with_profile_provider(
        config: &ServerConfig,
        connections: Arc<ConnectionManager>,
        profiles: Arc<dyn ProfileProvider>,
    ) -> Self {
        Self {
            connections,
            profiles,
            state: Mutex::new(LobbyState {
                rooms: RoomDirectory::from_catalog(&config.rooms),
                games: HashMap::new(),
            }),
        }
    }

    /// Dispatches one inbound event from a connection.
    pub async fn handle_event(&self, connection_id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::RoomList => self.handle_room_list(connection_id).await,
            ClientEvent::RoomJoin { room_id, identity } => {
                self.handle_room_join(connection_id, room_id, identity).await
            }
            ClientEvent::RoomLeave { room_id } => {
                self.handle_room_leave(connection_id, room_id).await
            }
            ClientEvent::GameStart { room_id } => {
                self.handle_game_start(connection_id, room_id).await
            }
            ClientEvent::GameMove { room_id, cell_index } => {
                self.handle_game_move(connection_id, room_id, cell_index).await
            }
            ClientEvent::GameRematch { room_id } => {
                self.handle_game_rematch(connection_id, room_id).await
            }
        }
    }

    /// `room:list`: replies to the requester with the full room list.
    async fn handle_room_list(&self, connection_id: ConnectionId) {
        let rooms = self.state.lock().await.rooms.list();
        self.send(connection_id, &ServerEvent::RoomList(rooms)).await;
    }

    /// `room:join`: binds the sender's identity, refreshes its display
    /// profile, and admits it into the room if the invariants allow.
    async fn handle_room_join(
        &self,
        connection_id: ConnectionId,
        room_id: String,
        mut identity: Identity,
    ) {
        self.connections.bind(connection_id, identity.clone()).await;

        // Refresh display data from the profile collaborator before touching
        // lobby state. A failure degrades to the caller-supplied data.
        match self.profiles.fetch_display_profile(&identity.id).await {
            Ok(profile) => {
                identity.username = profile.username;
                identity.profile_picture = profile.profile_picture;
            }
            Err(e) => {
                debug!("Proceeding with client-supplied profile for {}: {}", identity.id, e);
            }
        }

        // The profile fetch suspended; everything below re-validates under
        // the lock, so state changes during the await cannot be trusted away.
        let mut state = self.state.lock().await;
        match state.rooms.join(&room_id, identity.clone()) {
            Ok(member) => {
                info!("🙋 {} joined room {}", identity.id, room_id);
                let room = state
                    .rooms
                    .get(&room_id)
                    .expect("joined room must exist")
                    .clone();

                // Fixed order: confirmation to the joiner, notification to
                // the rest of the room, then the global list refresh.
                self.send(connection_id, &ServerEvent::RoomJoined(room.clone()))
                    .await;
                let others: Vec<Member> = room
                    .members
                    .iter()
                    .filter(|m| m.identity.id != identity.id)
                    .cloned()
                    .collect();
                self.send_to_members(
                    &others,
                    &ServerEvent::RoomPlayerJoined {
                        room_id: room_id.clone(),
                        player: member,
                    },
                )
                .await;
                self.broadcast_room_list(&state).await;
            }
            Err(JoinError::UnknownRoom) => {
                warn!("Join request for unknown room {room_id}");
            }
            Err(e) => {
                self.send(
                    connection_id,
                    &ServerEvent::RoomJoinError {
                        message: e.to_string(),
                    },
                )
                .await;
            }
        }
    }

    /// `room:leave`: removes the sender from the room; a no-op for
    /// non-members.
    async fn handle_room_leave(&self, connection_id: ConnectionId, room_id: String) {
        let Some(identity) = self.connections.lookup(connection_id).await else {
            debug!("room:leave from connection {connection_id} with no bound identity");
            return;
        };

        let mut state = self.state.lock().await;
        if state.rooms.leave(&room_id, &identity.id).is_some() {
            info!("👋 {} left room {}", identity.id, room_id);
            self.settle_departure(&mut state, &room_id, &identity.id).await;
            self.broadcast_room_list(&state).await;
        }
    }

    /// `game:start`: host-only; requires the room at capacity and no
    /// existing session.
    async fn handle_game_start(&self, connection_id: ConnectionId, room_id: String) {
        let Some(identity) = self.require_identity(connection_id).await else {
            return;
        };

        let mut state = self.state.lock().await;
        let Some(room) = state.rooms.get(&room_id).cloned() else {
            self.game_error(connection_id, "Room not found.").await;
            return;
        };
        if !room.members.iter().any(|m| m.identity.id == identity.id) {
            self.game_error(connection_id, "You are not a member of this room.")
                .await;
            return;
        }
        if room.host().map(|h| h.id.clone()) != Some(identity.id.clone()) {
            self.game_error(connection_id, "Only the host can start the game.")
                .await;
            return;
        }
        if room.game_kind != "tic-tac-toe" {
            self.game_error(connection_id, "This game is not playable yet.")
                .await;
            return;
        }
        if room.members.len() < room.capacity {
            self.game_error(connection_id, "Need at least 2 players to start the game.")
                .await;
            return;
        }
        if state.games.contains_key(&room_id) {
            self.game_error(connection_id, "Game already started.").await;
            return;
        }

        // Host plays first and gets X; the remaining member (join order) gets O.
        let guest = room
            .members
            .iter()
            .map(|m| m.identity.id.clone())
            .find(|id| *id != identity.id)
            .expect("room at capacity has a second member");
        let session = GameSession::start(room_id.clone(), [identity.id.clone(), guest]);
        let players = assignments(&session);
        state.games.insert(room_id.clone(), session);
        info!("🎮 Game started in room {}", room_id);

        self.send_to_members(
            &room.members,
            &ServerEvent::GameStart {
                room_id,
                players,
            },
        )
        .await;
    }

    /// `game:move`: validates and applies the sender's move, broadcasting
    /// the updated board and, on a terminal move, the outcome.
    async fn handle_game_move(
        &self,
        connection_id: ConnectionId,
        room_id: String,
        cell_index: usize,
    ) {
        let Some(identity) = self.require_identity(connection_id).await else {
            return;
        };

        let mut state = self.state.lock().await;
        let Some(session) = state.games.get_mut(&room_id) else {
            self.game_error(connection_id, "Game is not active.").await;
            return;
        };
        let update = match session.apply_move(&identity.id, cell_index) {
            Ok(update) => update,
            Err(e) => {
                self.game_error(connection_id, &e.to_string()).await;
                return;
            }
        };

        let members = state
            .rooms
            .get(&room_id)
            .map(|r| r.members.clone())
            .unwrap_or_default();
        self.send_to_members(
            &members,
            &ServerEvent::GameMove {
                room_id: room_id.clone(),
                board: update.board,
                turn: update.turn,
            },
        )
        .await;

        if let Some(outcome) = update.outcome {
            info!("🏁 Game in room {} ended: {:?}", room_id, outcome);
            self.send_to_members(
                &members,
                &ServerEvent::GameEnd {
                    room_id,
                    outcome,
                    board: update.board,
                },
            )
            .await;
        }
    }

    /// `game:rematch`: host-only; restarts a finished game with the same
    /// players and symbol assignments.
    async fn handle_game_rematch(&self, connection_id: ConnectionId, room_id: String) {
        let Some(identity) = self.require_identity(connection_id).await else {
            return;
        };

        let mut state = self.state.lock().await;
        let Some(room) = state.rooms.get(&room_id).cloned() else {
            self.game_error(connection_id, "Room not found.").await;
            return;
        };
        if room.host().map(|h| h.id.clone()) != Some(identity.id.clone()) {
            self.game_error(connection_id, "Only the host can reset the game.")
                .await;
            return;
        }
        let Some(session) = state.games.get_mut(&room_id) else {
            self.game_error(connection_id, "Game is not active.").await;
            return;
        };
        if let Err(e) = session.rematch() {
            self.game_error(connection_id, &e.to_string()).await;
            return;
        }
        let players = assignments(session);
        info!("🔁 Rematch in room {}", room_id);

        self.send_to_members(
            &room.members,
            &ServerEvent::GameRematch { room_id, players },
        )
        .await;
    }

    /// Transport disconnect: an implicit `room:leave` plus forfeit logic.
    ///
    /// A user is a member of at most one room, so cleanup touches at most
    /// one room and one game session.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) {
        let Some(identity) = self.connections.unbind(connection_id).await else {
            return;
        };

        let mut state = self.state.lock().await;
        let Some(room_id) = state.rooms.find_room_of(&identity.id).map(|r| r.id.clone()) else {
            return;
        };
        if state.rooms.leave(&room_id, &identity.id).is_some() {
            info!("🔥 {} disconnected while in room {}", identity.id, room_id);
            self.settle_departure(&mut state, &room_id, &identity.id).await;
            self.broadcast_room_list(&state).await;
        }
    }

    /// Shared aftermath of a member leaving a room, by request or disconnect.
    ///
    /// Notifies the remaining members, forfeits a game in progress to the
    /// single remaining player, and drops the session once the room empties.
    /// A finished-by-forfeit session with members still present is kept for
    /// a later rematch.
    async fn settle_departure(&self, state: &mut LobbyState, room_id: &str, leaver_id: &str) {
        let members = state
            .rooms
            .get(room_id)
            .map(|r| r.members.clone())
            .unwrap_or_default();

        self.send_to_members(
            &members,
            &ServerEvent::RoomPlayerLeft {
                room_id: room_id.to_string(),
                player_id: leaver_id.to_string(),
            },
        )
        .await;

        if members.is_empty() {
            state.games.remove(room_id);
            return;
        }

        if members.len() == 1 {
            if let Some(session) = state.games.get_mut(room_id) {
                if session.forfeit(leaver_id).is_some() {
                    let outcome = session.outcome.expect("forfeit sets the outcome");
                    let board = session.board;
                    info!("🏳️ {} forfeited the game in room {}", leaver_id, room_id);
                    self.send_to_members(
                        &members,
                        &ServerEvent::GameEnd {
                            room_id: room_id.to_string(),
                            outcome,
                            board,
                        },
                    )
                    .await;
                }
            }
        }
    }

    /// Resolves the sender's identity or reports a game error.
    async fn require_identity(&self, connection_id: ConnectionId) -> Option<Identity> {
        let identity = self.connections.lookup(connection_id).await;
        if identity.is_none() {
            self.game_error(connection_id, "Join a room first.").await;
        }
        identity
    }

    /// Sends a `game:error` with a human-readable reason to one connection.
    async fn game_error(&self, connection_id: ConnectionId, message: &str) {
        self.send(
            connection_id,
            &ServerEvent::GameError {
                message: message.to_string(),
            },
        )
        .await;
    }

    /// Sends one event to one connection.
    async fn send(&self, connection_id: ConnectionId, event: &ServerEvent) {
        self.connections
            .send_to_connection(connection_id, event.to_bytes())
            .await;
    }

    /// Sends one event to every listed member's connection.
    async fn send_to_members(&self, members: &[Member], event: &ServerEvent) {
        let bytes = event.to_bytes();
        for member in members {
            if let Some(connection_id) = self.connections.connection_of(&member.identity.id).await {
                self.connections
                    .send_to_connection(connection_id, bytes.clone())
                    .await;
            }
        }
    }

    /// Broadcasts the room list to every connected client after a
    /// membership change.
    async fn broadcast_room_list(&self, state: &LobbyState) {
        self.connections
            .broadcast_to_all(ServerEvent::RoomList(state.rooms.list()).to_bytes())
            .await;
    }
}

/// Symbol assignments in player order (host first) for start/rematch events.
fn assignments(session: &GameSession) -> Vec<PlayerAssignment> {
    session
        .players
        .iter()
        .map(|(id, symbol)| PlayerAssignment {
            player_id: id.clone(),
            symbol: *symbol,
        })
        .collect()
}
