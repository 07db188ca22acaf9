// Include tests
#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::connection::{ConnectionId, ConnectionManager};
    use crate::game::{Outcome, Symbol};
    use crate::profile::{DisplayProfile, ProfileError, ProfileProvider};
    use crate::protocol::{ClientEvent, ServerEvent};
    use crate::rooms::Identity;
    use crate::session::SessionCoordinator;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct Lobby {
        connections: Arc<ConnectionManager>,
        coordinator: SessionCoordinator,
        outbound: broadcast::Receiver<(ConnectionId, Vec<u8>)>,
    }

    impl Lobby {
        async fn new() -> Self {
            let connections = Arc::new(ConnectionManager::new());
            let coordinator =
                SessionCoordinator::new(&ServerConfig::default(), connections.clone());
            let outbound = connections.subscribe();
            Self {
                connections,
                coordinator,
                outbound,
            }
        }

        async fn connect(&self, user: &str) -> (ConnectionId, Identity) {
            let conn = self
                .connections
                .add_connection("127.0.0.1:5000".parse().unwrap())
                .await;
            let identity = Identity {
                id: user.to_string(),
                username: format!("{user}-name"),
                profile_picture: None,
            };
            (conn, identity)
        }

        async fn join(&self, conn: ConnectionId, identity: &Identity, room: &str) {
            self.coordinator
                .handle_event(
                    conn,
                    ClientEvent::RoomJoin {
                        room_id: room.to_string(),
                        identity: identity.clone(),
                    },
                )
                .await;
        }

        /// Drains every outbound message queued so far, in send order.
        fn drain(&mut self) -> Vec<(ConnectionId, ServerEvent)> {
            let mut events = Vec::new();
            while let Ok((conn, bytes)) = self.outbound.try_recv() {
                let event: ServerEvent =
                    serde_json::from_slice(&bytes).expect("outbound frames are valid events");
                events.push((conn, event));
            }
            events
        }

        fn drain_for(&mut self, conn: ConnectionId) -> Vec<ServerEvent> {
            self.drain()
                .into_iter()
                .filter(|(c, _)| *c == conn)
                .map(|(_, e)| e)
                .collect()
        }
    }

    /// Joins two users and starts a game, returning their connections with
    /// the host first.
    async fn playing_lobby(lobby: &mut Lobby) -> (ConnectionId, ConnectionId) {
        let (conn_a, alice) = lobby.connect("alice").await;
        let (conn_b, bob) = lobby.connect("bob").await;
        lobby.join(conn_a, &alice, "tic-tac-toe").await;
        lobby.join(conn_b, &bob, "tic-tac-toe").await;
        lobby
            .coordinator
            .handle_event(
                conn_a,
                ClientEvent::GameStart {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;
        lobby.drain();
        (conn_a, conn_b)
    }

    async fn game_move(lobby: &Lobby, conn: ConnectionId, cell: usize) {
        lobby
            .coordinator
            .handle_event(
                conn,
                ClientEvent::GameMove {
                    room_id: "tic-tac-toe".to_string(),
                    cell_index: cell,
                },
            )
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn room_list_returns_the_full_catalog() {
        let mut lobby = Lobby::new().await;
        let (conn, _) = lobby.connect("alice").await;

        lobby
            .coordinator
            .handle_event(conn, ClientEvent::RoomList)
            .await;

        let events = lobby.drain_for(conn);
        match &events[..] {
            [ServerEvent::RoomList(rooms)] => {
                let ids: Vec<&str> = rooms.iter().map(|r| r.id.as_str()).collect();
                assert_eq!(ids, ["tic-tac-toe", "chess", "checkers", "card-game"]);
                assert!(rooms.iter().all(|r| r.members.is_empty()));
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join_confirms_to_the_actor_before_notifying_the_room() {
        let mut lobby = Lobby::new().await;
        let (conn_a, alice) = lobby.connect("alice").await;
        let (conn_b, bob) = lobby.connect("bob").await;

        lobby.join(conn_a, &alice, "tic-tac-toe").await;
        lobby.drain();

        lobby.join(conn_b, &bob, "tic-tac-toe").await;
        let events = lobby.drain();

        // Confirmation to the joiner, then the member notification, then the
        // global list refresh.
        match &events[0] {
            (conn, ServerEvent::RoomJoined(room)) => {
                assert_eq!(*conn, conn_b);
                assert_eq!(room.members.len(), 2);
            }
            other => panic!("expected room:joined first, got {other:?}"),
        }
        match &events[1] {
            (conn, ServerEvent::RoomPlayerJoined { player, .. }) => {
                assert_eq!(*conn, conn_a);
                assert_eq!(player.identity.id, "bob");
            }
            other => panic!("expected room:playerJoined second, got {other:?}"),
        }
        assert!(events[2..]
            .iter()
            .all(|(_, e)| matches!(e, ServerEvent::RoomList(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejoining_the_same_room_is_rejected_without_duplication() {
        let mut lobby = Lobby::new().await;
        let (conn, alice) = lobby.connect("alice").await;

        lobby.join(conn, &alice, "tic-tac-toe").await;
        lobby.drain();
        lobby.join(conn, &alice, "tic-tac-toe").await;

        let events = lobby.drain_for(conn);
        match &events[..] {
            [ServerEvent::RoomJoinError { message }] => {
                assert_eq!(message, "You are already in this room.");
            }
            other => panic!("unexpected events: {other:?}"),
        }

        lobby
            .coordinator
            .handle_event(conn, ClientEvent::RoomList)
            .await;
        let events = lobby.drain_for(conn);
        let ServerEvent::RoomList(rooms) = &events[0] else {
            panic!("expected room list");
        };
        assert_eq!(rooms[0].members.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join_is_rejected_while_member_of_another_room() {
        let mut lobby = Lobby::new().await;
        let (conn, alice) = lobby.connect("alice").await;

        lobby.join(conn, &alice, "tic-tac-toe").await;
        lobby.drain();
        lobby.join(conn, &alice, "chess").await;

        let events = lobby.drain_for(conn);
        match &events[..] {
            [ServerEvent::RoomJoinError { message }] => {
                assert_eq!(
                    message,
                    "You are already in another room. Leave first to join a new one."
                );
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_full_room_rejects_a_third_join() {
        let mut lobby = Lobby::new().await;
        let (conn_a, alice) = lobby.connect("alice").await;
        let (conn_b, bob) = lobby.connect("bob").await;
        let (conn_c, carol) = lobby.connect("carol").await;

        lobby.join(conn_a, &alice, "tic-tac-toe").await;
        lobby.join(conn_b, &bob, "tic-tac-toe").await;
        lobby.drain();
        lobby.join(conn_c, &carol, "tic-tac-toe").await;

        let events = lobby.drain_for(conn_c);
        match &events[..] {
            [ServerEvent::RoomJoinError { message }] => {
                assert_eq!(message, "Room is full.");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn only_the_host_can_start_and_only_at_capacity() {
        let mut lobby = Lobby::new().await;
        let (conn_a, alice) = lobby.connect("alice").await;
        let (conn_b, bob) = lobby.connect("bob").await;
        lobby.join(conn_a, &alice, "tic-tac-toe").await;
        lobby.drain();

        // Under capacity.
        lobby
            .coordinator
            .handle_event(
                conn_a,
                ClientEvent::GameStart {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;
        let events = lobby.drain_for(conn_a);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }]
                if message == "Need at least 2 players to start the game."
        ));

        lobby.join(conn_b, &bob, "tic-tac-toe").await;
        lobby.drain();

        // Not the host.
        lobby
            .coordinator
            .handle_event(
                conn_b,
                ClientEvent::GameStart {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;
        let events = lobby.drain_for(conn_b);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }]
                if message == "Only the host can start the game."
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_assigns_symbols_in_join_order_and_rejects_restarts() {
        let mut lobby = Lobby::new().await;
        let (conn_a, alice) = lobby.connect("alice").await;
        let (conn_b, bob) = lobby.connect("bob").await;
        lobby.join(conn_a, &alice, "tic-tac-toe").await;
        lobby.join(conn_b, &bob, "tic-tac-toe").await;
        lobby.drain();

        lobby
            .coordinator
            .handle_event(
                conn_a,
                ClientEvent::GameStart {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;

        let events = lobby.drain_for(conn_a);
        match &events[..] {
            [ServerEvent::GameStart { players, .. }] => {
                assert_eq!(players[0].player_id, "alice");
                assert_eq!(players[0].symbol, Symbol::X);
                assert_eq!(players[1].player_id, "bob");
                assert_eq!(players[1].symbol, Symbol::O);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        lobby
            .coordinator
            .handle_event(
                conn_a,
                ClientEvent::GameStart {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;
        let events = lobby.drain_for(conn_a);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }] if message == "Game already started."
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn nine_alternating_moves_without_a_line_end_in_a_draw() {
        let mut lobby = Lobby::new().await;
        let (conn_a, conn_b) = playing_lobby(&mut lobby).await;

        // Alternating X/O moves with no winning triple for either symbol.
        for (i, cell) in [0, 1, 2, 4, 3, 5, 7, 6, 8].into_iter().enumerate() {
            let mover = if i % 2 == 0 { conn_a } else { conn_b };
            game_move(&lobby, mover, cell).await;
        }

        let events = lobby.drain_for(conn_b);
        match events.last() {
            Some(ServerEvent::GameEnd { outcome, .. }) => {
                assert_eq!(*outcome, Outcome::Draw);
            }
            other => panic!("expected game:end last, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_completed_line_ends_the_game_with_a_win() {
        let mut lobby = Lobby::new().await;
        let (conn_a, conn_b) = playing_lobby(&mut lobby).await;

        game_move(&lobby, conn_a, 0).await;
        game_move(&lobby, conn_b, 3).await;
        game_move(&lobby, conn_a, 1).await;
        game_move(&lobby, conn_b, 4).await;
        game_move(&lobby, conn_a, 2).await;

        let events = lobby.drain_for(conn_b);
        match events.last() {
            Some(ServerEvent::GameEnd { outcome, board, .. }) => {
                assert_eq!(*outcome, Outcome::Win(Symbol::X));
                assert_eq!(board[0], Some(Symbol::X));
            }
            other => panic!("expected game:end, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn out_of_turn_and_occupied_moves_are_rejected() {
        let mut lobby = Lobby::new().await;
        let (conn_a, conn_b) = playing_lobby(&mut lobby).await;

        game_move(&lobby, conn_b, 0).await;
        let events = lobby.drain_for(conn_b);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }] if message == "Not your turn"
        ));

        game_move(&lobby, conn_a, 0).await;
        lobby.drain();
        game_move(&lobby, conn_b, 0).await;
        let events = lobby.drain_for(conn_b);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }] if message == "Position already taken"
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disconnect_mid_game_forfeits_to_the_remaining_player() {
        let mut lobby = Lobby::new().await;
        let (conn_a, conn_b) = playing_lobby(&mut lobby).await;
        game_move(&lobby, conn_a, 4).await;
        lobby.drain();

        lobby.coordinator.handle_disconnect(conn_a).await;

        let events = lobby.drain_for(conn_b);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::RoomPlayerLeft { player_id, .. } if player_id == "alice")));
        let end = events
            .iter()
            .find_map(|e| match e {
                ServerEvent::GameEnd { outcome, .. } => Some(*outcome),
                _ => None,
            })
            .expect("game:end must be broadcast on forfeit");
        assert_eq!(end, Outcome::Win(Symbol::O));

        // The session is kept, marked finished: further moves are rejected.
        game_move(&lobby, conn_b, 0).await;
        let events = lobby.drain_for(conn_b);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }] if message == "Game is not active."
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn explicit_leave_mid_game_also_forfeits() {
        let mut lobby = Lobby::new().await;
        let (conn_a, conn_b) = playing_lobby(&mut lobby).await;
        lobby.drain();

        lobby
            .coordinator
            .handle_event(
                conn_b,
                ClientEvent::RoomLeave {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;

        let events = lobby.drain_for(conn_a);
        let end = events
            .iter()
            .find_map(|e| match e {
                ServerEvent::GameEnd { outcome, .. } => Some(*outcome),
                _ => None,
            })
            .expect("game:end must be broadcast on forfeit");
        assert_eq!(end, Outcome::Win(Symbol::X));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn emptying_the_room_drops_the_session() {
        let mut lobby = Lobby::new().await;
        let (conn_a, conn_b) = playing_lobby(&mut lobby).await;

        lobby.coordinator.handle_disconnect(conn_b).await;
        lobby.coordinator.handle_disconnect(conn_a).await;
        lobby.drain();

        // The room is reusable from scratch: join, fill, start.
        let (conn_c, carol) = lobby.connect("carol").await;
        let (conn_d, dave) = lobby.connect("dave").await;
        lobby.join(conn_c, &carol, "tic-tac-toe").await;
        lobby.join(conn_d, &dave, "tic-tac-toe").await;
        lobby.drain();
        lobby
            .coordinator
            .handle_event(
                conn_c,
                ClientEvent::GameStart {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;
        let events = lobby.drain_for(conn_c);
        assert!(matches!(&events[..], [ServerEvent::GameStart { .. }]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rematch_resets_the_board_and_preserves_assignments() {
        let mut lobby = Lobby::new().await;
        let (conn_a, conn_b) = playing_lobby(&mut lobby).await;

        // Premature rematch is rejected.
        lobby
            .coordinator
            .handle_event(
                conn_a,
                ClientEvent::GameRematch {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;
        let events = lobby.drain_for(conn_a);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }] if message == "Game is not finished yet."
        ));

        // X wins the top row.
        game_move(&lobby, conn_a, 0).await;
        game_move(&lobby, conn_b, 3).await;
        game_move(&lobby, conn_a, 1).await;
        game_move(&lobby, conn_b, 4).await;
        game_move(&lobby, conn_a, 2).await;
        lobby.drain();

        lobby
            .coordinator
            .handle_event(
                conn_a,
                ClientEvent::GameRematch {
                    room_id: "tic-tac-toe".to_string(),
                },
            )
            .await;
        let events = lobby.drain_for(conn_b);
        match &events[..] {
            [ServerEvent::GameRematch { players, .. }] => {
                assert_eq!(players[0].player_id, "alice");
                assert_eq!(players[0].symbol, Symbol::X);
                assert_eq!(players[1].symbol, Symbol::O);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // Fresh board, X to open.
        game_move(&lobby, conn_a, 0).await;
        let events = lobby.drain_for(conn_b);
        match &events[..] {
            [ServerEvent::GameMove { board, turn, .. }] => {
                assert_eq!(board[0], Some(Symbol::X));
                assert_eq!(board[1..], [None; 8]);
                assert_eq!(*turn, Symbol::O);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn game_requests_without_a_bound_identity_are_rejected() {
        let mut lobby = Lobby::new().await;
        let (conn, _) = lobby.connect("alice").await;

        game_move(&lobby, conn, 0).await;
        let events = lobby.drain_for(conn);
        assert!(matches!(
            &events[..],
            [ServerEvent::GameError { message }] if message == "Join a room first."
        ));
    }

    struct StubProfiles {
        fail: bool,
    }

    #[async_trait]
    impl ProfileProvider for StubProfiles {
        async fn fetch_display_profile(
            &self,
            identity_id: &str,
        ) -> Result<DisplayProfile, ProfileError> {
            if self.fail {
                Err(ProfileError::Unavailable("stub outage".to_string()))
            } else {
                Ok(DisplayProfile {
                    username: format!("{identity_id}-fresh"),
                    profile_picture: Some(format!("avatars/{identity_id}.png")),
                })
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join_refreshes_display_data_from_the_profile_service() {
        let connections = Arc::new(ConnectionManager::new());
        let coordinator = SessionCoordinator::with_profile_provider(
            &ServerConfig::default(),
            connections.clone(),
            Arc::new(StubProfiles { fail: false }),
        );
        let mut outbound = connections.subscribe();

        let conn = connections
            .add_connection("127.0.0.1:5000".parse().unwrap())
            .await;
        coordinator
            .handle_event(
                conn,
                ClientEvent::RoomJoin {
                    room_id: "tic-tac-toe".to_string(),
                    identity: Identity {
                        id: "alice".to_string(),
                        username: "stale".to_string(),
                        profile_picture: None,
                    },
                },
            )
            .await;

        let (_, bytes) = outbound.try_recv().unwrap();
        let event: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        let ServerEvent::RoomJoined(room) = event else {
            panic!("expected room:joined");
        };
        assert_eq!(room.members[0].identity.username, "alice-fresh");
        assert_eq!(
            room.members[0].identity.profile_picture.as_deref(),
            Some("avatars/alice.png")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn profile_outage_degrades_to_client_supplied_data() {
        let connections = Arc::new(ConnectionManager::new());
        let coordinator = SessionCoordinator::with_profile_provider(
            &ServerConfig::default(),
            connections.clone(),
            Arc::new(StubProfiles { fail: true }),
        );
        let mut outbound = connections.subscribe();

        let conn = connections
            .add_connection("127.0.0.1:5000".parse().unwrap())
            .await;
        coordinator
            .handle_event(
                conn,
                ClientEvent::RoomJoin {
                    room_id: "tic-tac-toe".to_string(),
                    identity: Identity {
                        id: "alice".to_string(),
                        username: "alice-local".to_string(),
                        profile_picture: None,
                    },
                },
            )
            .await;

        let (_, bytes) = outbound.try_recv().unwrap();
        let event: ServerEvent = serde_json::from_slice(&bytes).unwrap();
        let ServerEvent::RoomJoined(room) = event else {
            panic!("expected room:joined");
        };
        assert_eq!(room.members[0].identity.username, "alice-local");
    }
}
