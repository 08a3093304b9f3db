//! The gateway actor: one Tokio task that owns the whole session engine.
//!
//! Every socket event, disconnect, and timer tick arrives here as a
//! [`GatewayCommand`] over a single mpsc channel, so the room registry is
//! mutated from exactly one place and needs no locking. Per-room event
//! order follows submission order (FIFO per connection); no cross-room
//! ordering is promised or needed.
//!
//! Handlers never block: board fetches run in spawned tasks that post their
//! result back as a follow-up command, and history persistence is
//! fire-and-forget. Broadcast fan-out goes through per-connection unbounded
//! channels drained by writer tasks, so one slow socket can't stall the
//! actor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;

use diffduel_engine::{
    ClassicAbandon, GameHistory, GameProvider, GameService, HistoryStore,
    LimitedAbandon,
};
use diffduel_protocol::{
    ClientEvent, GameData, GameMode, RoomId, ServerEvent,
};
use diffduel_transport::ConnectionId;

/// Channel sender for delivering outbound events to one connection.
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

/// Everything that can happen to the gateway.
#[derive(Debug, Clone)]
pub enum GatewayCommand {
    /// A connection opened; `sender` carries its outbound events.
    Connected {
        conn: ConnectionId,
        sender: OutboundSender,
    },

    /// A decoded client event, in per-connection arrival order.
    Event {
        conn: ConnectionId,
        event: ClientEvent,
    },

    /// The connection dropped, cleanly or not.
    Disconnected { conn: ConnectionId },

    /// Periodic timer tick from the global ticker.
    Tick,

    /// A board fetch for `CreateGame` completed.
    BoardReady {
        conn: ConnectionId,
        username: String,
        game_mode: GameMode,
        started: bool,
        board: Option<GameData>,
    },

    /// A board fetch for `NextGame` completed.
    NextBoardReady {
        room_id: RoomId,
        board: Option<GameData>,
    },
}

/// Which room a connection is subscribed to, and under which username.
#[derive(Debug, Clone)]
struct Membership {
    room_id: RoomId,
    username: String,
}

/// The actor state. Constructed by the server (or a test harness) and
/// consumed by [`run`](Gateway::run).
pub struct Gateway<P: GameProvider, H: HistoryStore> {
    service: GameService,
    provider: Arc<P>,
    store: Arc<H>,
    rx: mpsc::Receiver<GatewayCommand>,
    /// Cloned into fetch tasks so their results come back as commands.
    tx: mpsc::Sender<GatewayCommand>,
    /// Outbound channel per live connection.
    connections: HashMap<ConnectionId, OutboundSender>,
    /// Broadcast channel membership per room (socket.io "rooms").
    channels: HashMap<RoomId, HashSet<ConnectionId>>,
    /// Reverse index: which room each connection currently belongs to.
    memberships: HashMap<ConnectionId, Membership>,
}

impl<P: GameProvider, H: HistoryStore> Gateway<P, H> {
    /// Creates the actor. `tx` must be the sender half of `rx`.
    pub fn new(
        provider: Arc<P>,
        store: Arc<H>,
        tx: mpsc::Sender<GatewayCommand>,
        rx: mpsc::Receiver<GatewayCommand>,
    ) -> Self {
        Self {
            service: GameService::new(),
            provider,
            store,
            rx,
            tx,
            connections: HashMap::new(),
            channels: HashMap::new(),
            memberships: HashMap::new(),
        }
    }

    /// Runs the actor loop until every command sender is gone.
    pub async fn run(mut self) {
        tracing::info!("gateway started");

        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                GatewayCommand::Connected { conn, sender } => {
                    self.connections.insert(conn, sender);
                    tracing::debug!(%conn, "connection registered");
                }
                GatewayCommand::Event { conn, event } => {
                    self.handle_event(conn, event);
                }
                GatewayCommand::Disconnected { conn } => {
                    self.handle_disconnect(conn);
                }
                GatewayCommand::Tick => self.handle_tick(),
                GatewayCommand::BoardReady {
                    conn,
                    username,
                    game_mode,
                    started,
                    board,
                } => {
                    self.finish_create(conn, username, game_mode, started, board);
                }
                GatewayCommand::NextBoardReady { room_id, board } => {
                    self.finish_next(room_id, board);
                }
            }
        }

        tracing::info!("gateway stopped");
    }

    // -----------------------------------------------------------------------
    // Event dispatch
    // -----------------------------------------------------------------------

    fn handle_event(&mut self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::CreateGame {
                username,
                game_mode,
                game_name,
                started,
            } => self.fetch_board_for_create(
                conn, username, game_mode, game_name, started,
            ),

            ClientEvent::StartGame { room_id } => {
                if let Some(room) = self.service.start_game(room_id) {
                    tracing::info!(
                        %room_id,
                        game = room.game_name(),
                        "launching game"
                    );
                    self.broadcast_room(room_id, ServerEvent::Started);
                }
            }

            ClientEvent::JoinGame { game_name, username, game_mode } => {
                self.on_join(conn, game_name, username, game_mode);
            }

            ClientEvent::AcceptPlayer { room_id, username } => {
                self.accept_player(room_id, &username);
            }

            ClientEvent::RejectPlayer { room_id, username } => {
                if let Some(room) =
                    self.service.player_rejected(room_id, &username)
                {
                    self.broadcast_room(
                        room_id,
                        ServerEvent::PlayerRejected { room },
                    );
                }
            }

            ClientEvent::AbortGameCreation { room_id } => {
                self.on_abort(room_id);
            }

            ClientEvent::LeaveGame { room_id, username } => {
                self.on_leave(conn, room_id, &username);
            }

            ClientEvent::CheckGame { game_name, game_mode } => {
                let reply = if self
                    .service
                    .check_game(game_name.as_deref(), game_mode)
                {
                    ServerEvent::GameFound { game_name, game_mode }
                } else {
                    ServerEvent::GameNotFound { game_mode }
                };
                self.send_to(conn, reply);
            }

            ClientEvent::CanJoinGame { game_name, username, game_mode } => {
                let reply = if self.service.can_join(
                    game_name.as_deref(),
                    &username,
                    game_mode,
                ) {
                    ServerEvent::CanJoin
                } else {
                    ServerEvent::CannotJoin
                };
                self.send_to(conn, reply);
            }

            ClientEvent::ValidateDifference {
                room_id,
                position,
                username,
            } => {
                let validated =
                    self.service.validate_difference(room_id, position);
                // Wrong guesses are broadcast too — both players see them.
                self.broadcast_room(
                    room_id,
                    ServerEvent::DifferenceValidated {
                        validated,
                        position,
                        username: username.clone(),
                    },
                );
                if self.service.is_game_finished(room_id) {
                    self.finish_game(room_id, &username, true, true);
                }
            }

            ClientEvent::ChangeTime { room_id, delta } => {
                tracing::debug!(%room_id, delta, "timer adjusted");
                self.service.apply_time_to_timer(room_id, delta);
            }

            ClientEvent::NextGame { room_id } => {
                self.fetch_board_for_next(room_id);
            }

            ClientEvent::EndGame {
                room_id,
                username,
                winner,
                game_finished,
            } => {
                self.finish_game(room_id, &username, winner, game_finished);
            }

            ClientEvent::Abandon { room_id, username } => {
                self.on_abandon(conn, room_id, username);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lobby flow
    // -----------------------------------------------------------------------

    /// Board fetches run off-actor; the result returns as `BoardReady`.
    fn fetch_board_for_create(
        &self,
        conn: ConnectionId,
        username: String,
        game_mode: GameMode,
        game_name: Option<String>,
        started: bool,
    ) {
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let board = match (game_mode, game_name.as_deref()) {
                (GameMode::Classic, Some(name)) => {
                    provider.classic_board(name).await
                }
                (GameMode::Classic, None) => None,
                (GameMode::LimitedTime, _) => provider.any_board().await,
            };
            let _ = tx
                .send(GatewayCommand::BoardReady {
                    conn,
                    username,
                    game_mode,
                    started,
                    board,
                })
                .await;
        });
    }

    fn finish_create(
        &mut self,
        conn: ConnectionId,
        username: String,
        game_mode: GameMode,
        started: bool,
        board: Option<GameData>,
    ) {
        let Some(board) = board else {
            tracing::warn!(%conn, %game_mode, "no board available");
            self.send_to(conn, ServerEvent::GameNotFound { game_mode });
            return;
        };
        // The creator may have vanished while the board loaded.
        if !self.connections.contains_key(&conn) {
            return;
        }

        let room_id = RoomId(conn.into_inner());
        let room = self.service.create_room(
            room_id, &username, game_mode, board, started,
        );
        self.leave_current_channel(conn);
        self.subscribe(conn, room_id, username);

        self.broadcast_room(room_id, ServerEvent::GameCreated { room_id });
        if !room.is_started() {
            self.broadcast_all(ServerEvent::GameFound {
                game_name: Some(room.game_name().to_string()),
                game_mode,
            });
        }
    }

    fn on_join(
        &mut self,
        conn: ConnectionId,
        game_name: Option<String>,
        username: String,
        game_mode: GameMode,
    ) {
        let Some(room) = self.service.join_game(
            game_name.as_deref(),
            &username,
            game_mode,
        ) else {
            tracing::debug!(%username, "join rejected");
            self.send_to(conn, ServerEvent::GameInfo { room: None });
            return;
        };

        let room_id = room.room_id;
        tracing::info!(%room_id, %username, game = room.game_name(), "joined");
        self.leave_current_channel(conn);
        self.subscribe(conn, room_id, username.clone());

        // Limited-time rooms are a shared queue: the join resolves on the
        // spot instead of waiting for the host.
        if game_mode == GameMode::LimitedTime {
            self.accept_player(room_id, &username);
        }
        let room = self.service.room(room_id).cloned();
        self.broadcast_room(room_id, ServerEvent::GameInfo { room });
    }

    fn accept_player(&mut self, room_id: RoomId, username: &str) {
        if let Some(room) = self.service.player_accepted(room_id, username) {
            self.broadcast_room(room_id, ServerEvent::PlayerAccepted { room });
        }
    }

    fn on_abort(&mut self, room_id: RoomId) {
        let Some(room) = self.service.abort_game_creation(room_id) else {
            return;
        };
        self.broadcast_all(ServerEvent::GameDeleted {
            game_name: room.game_name().to_string(),
            game_mode: room.game_mode,
        });
        self.broadcast_all(ServerEvent::GameCanceled { room });
        self.drop_channel(room_id);
    }

    fn on_leave(&mut self, conn: ConnectionId, room_id: RoomId, username: &str) {
        if let Some(room) = self.service.leave_game(room_id, username) {
            self.broadcast_room(
                room_id,
                ServerEvent::GameInfo { room: Some(room) },
            );
        }
        self.unsubscribe(conn, room_id);
    }

    // -----------------------------------------------------------------------
    // Play flow
    // -----------------------------------------------------------------------

    fn handle_tick(&mut self) {
        for (room_id, seconds) in self.service.update_timers() {
            self.broadcast_room(room_id, ServerEvent::Timer { seconds });
        }
    }

    fn fetch_board_for_next(&self, room_id: RoomId) {
        let provider = Arc::clone(&self.provider);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let board = provider.any_board().await;
            let _ = tx
                .send(GatewayCommand::NextBoardReady { room_id, board })
                .await;
        });
    }

    fn finish_next(&mut self, room_id: RoomId, board: Option<GameData>) {
        let Some(board) = board else {
            tracing::warn!(%room_id, "no next board available");
            return;
        };
        if let Some(room) = self.service.next_game(room_id, board) {
            self.broadcast_room(
                room_id,
                ServerEvent::GameInfo { room: Some(room) },
            );
        }
    }

    /// The room's terminal transition: broadcast, persist once, tear down
    /// the channel. Safe to call twice — the second call finds no room.
    fn finish_game(
        &mut self,
        room_id: RoomId,
        username: &str,
        winner: bool,
        game_finished: bool,
    ) {
        let Some(closed) =
            self.service.end_game(room_id, username, winner, game_finished)
        else {
            return;
        };
        tracing::info!(
            %room_id,
            game = closed.room.game_name(),
            "end of game"
        );
        self.broadcast_room(room_id, ServerEvent::GameFinished);
        self.persist(closed.history);
        self.drop_channel(room_id);
    }

    fn persist(&self, history: Option<GameHistory>) {
        let Some(history) = history else { return };
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.save(history).await {
                // The game concluded regardless of storage outcome; the
                // room is already gone from the registry.
                tracing::error!(error = %e, "history persistence failed");
            }
        });
    }

    // -----------------------------------------------------------------------
    // Abandonment
    // -----------------------------------------------------------------------

    fn on_abandon(
        &mut self,
        conn: ConnectionId,
        room_id: RoomId,
        username: String,
    ) {
        let Some(game_mode) =
            self.service.room(room_id).map(|room| room.game_mode)
        else {
            return;
        };

        match game_mode {
            GameMode::Classic => {
                match self.service.abandon_classic(room_id, &username) {
                    Some(ClassicAbandon::Continues { room }) => {
                        self.broadcast_room(
                            room_id,
                            ServerEvent::Abandoned { room, username },
                        );
                        self.unsubscribe(conn, room_id);
                    }
                    Some(ClassicAbandon::Closed(closed)) => {
                        self.broadcast_room(
                            room_id,
                            ServerEvent::Abandoned {
                                room: closed.room.clone(),
                                username,
                            },
                        );
                        self.persist(closed.history);
                        self.drop_channel(room_id);
                    }
                    None => {}
                }
            }
            GameMode::LimitedTime => {
                let new_room_id = self.migration_target(conn, room_id);
                match self.service.abandon_limited_time(
                    room_id,
                    new_room_id,
                    &username,
                ) {
                    Some(LimitedAbandon::Migrated { room }) => {
                        self.broadcast_room(
                            room_id,
                            ServerEvent::Abandoned {
                                room: room.clone(),
                                username,
                            },
                        );
                        self.rekey_channel(room_id, new_room_id, conn);
                    }
                    Some(LimitedAbandon::Closed(closed)) => {
                        self.broadcast_room(
                            room_id,
                            ServerEvent::Abandoned {
                                room: closed.room.clone(),
                                username,
                            },
                        );
                        self.persist(closed.history);
                        self.drop_channel(room_id);
                    }
                    None => {}
                }
            }
        }
    }

    /// Picks the room id a migrating limited-time room continues under.
    ///
    /// When the leaver's connection is the room's identifying id, the room
    /// re-keys to a surviving channel member (lowest connection id — any
    /// single survivor satisfies the protocol). Otherwise the id stands.
    fn migration_target(
        &self,
        leaver: ConnectionId,
        room_id: RoomId,
    ) -> RoomId {
        if leaver.into_inner() != room_id.0 {
            return room_id;
        }
        self.channels
            .get(&room_id)
            .and_then(|members| {
                members
                    .iter()
                    .filter(|member| **member != leaver)
                    .map(|member| member.into_inner())
                    .min()
            })
            .map(RoomId)
            .unwrap_or(room_id)
    }

    // -----------------------------------------------------------------------
    // Disconnects
    // -----------------------------------------------------------------------

    /// Routes an unexpected disconnect through the same paths as explicit
    /// messages: lobby rooms abort or shed a candidate; started rooms go
    /// through abandonment for actual participants.
    fn handle_disconnect(&mut self, conn: ConnectionId) {
        self.connections.remove(&conn);
        let Some(membership) = self.memberships.get(&conn).cloned() else {
            tracing::debug!(%conn, "disconnected");
            return;
        };
        let Membership { room_id, username } = membership;
        tracing::info!(%conn, %room_id, %username, "disconnected mid-session");

        let room_state = self.service.room(room_id).map(|room| {
            let user_game = &room.user_game;
            let is_participant = user_game.username1 == username
                || user_game.username2.as_deref() == Some(username.as_str());
            (room.phase.is_lobby(), is_participant)
        });
        let Some((is_lobby, is_participant)) = room_state else {
            self.unsubscribe(conn, room_id);
            return;
        };

        if is_lobby {
            if conn.into_inner() == room_id.0 {
                self.on_abort(room_id);
            } else {
                self.on_leave(conn, room_id, &username);
            }
        } else if is_participant {
            self.on_abandon(conn, room_id, username);
        } else {
            // A lingering rejected candidate; nothing to reconcile.
            self.unsubscribe(conn, room_id);
        }
        self.memberships.remove(&conn);
    }

    // -----------------------------------------------------------------------
    // Channels and fan-out
    // -----------------------------------------------------------------------

    fn send_to(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.connections.get(&conn) {
            // A send error means the writer task is gone; the disconnect
            // command will clean up shortly.
            let _ = sender.send(event);
        }
    }

    fn broadcast_room(&self, room_id: RoomId, event: ServerEvent) {
        if let Some(members) = self.channels.get(&room_id) {
            for conn in members {
                self.send_to(*conn, event.clone());
            }
        }
    }

    fn broadcast_all(&self, event: ServerEvent) {
        for sender in self.connections.values() {
            let _ = sender.send(event.clone());
        }
    }

    fn subscribe(&mut self, conn: ConnectionId, room_id: RoomId, username: String) {
        self.channels.entry(room_id).or_default().insert(conn);
        self.memberships.insert(conn, Membership { room_id, username });
    }

    fn unsubscribe(&mut self, conn: ConnectionId, room_id: RoomId) {
        if let Some(members) = self.channels.get_mut(&room_id) {
            members.remove(&conn);
            if members.is_empty() {
                self.channels.remove(&room_id);
            }
        }
        if self
            .memberships
            .get(&conn)
            .is_some_and(|m| m.room_id == room_id)
        {
            self.memberships.remove(&conn);
        }
    }

    /// A connection can belong to one room at a time; joining or creating
    /// another drops the previous subscription.
    fn leave_current_channel(&mut self, conn: ConnectionId) {
        if let Some(room_id) =
            self.memberships.get(&conn).map(|m| m.room_id)
        {
            self.unsubscribe(conn, room_id);
        }
    }

    fn drop_channel(&mut self, room_id: RoomId) {
        self.channels.remove(&room_id);
        self.memberships.retain(|_, m| m.room_id != room_id);
    }

    /// Re-keys a room's channel after host migration and removes the
    /// leaver's subscription.
    fn rekey_channel(
        &mut self,
        old: RoomId,
        new: RoomId,
        leaver: ConnectionId,
    ) {
        self.memberships.remove(&leaver);
        if let Some(mut members) = self.channels.remove(&old) {
            members.remove(&leaver);
            for member in &members {
                if let Some(m) = self.memberships.get_mut(member) {
                    m.room_id = new;
                }
            }
            if !members.is_empty() {
                self.channels.insert(new, members);
            }
        }
    }
}
