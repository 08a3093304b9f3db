//! The game service: every operation the gateway can perform on the room
//! registry, from lobby formation through difference validation to closure.
//!
//! All methods are synchronous and infallible in the error-handling sense:
//! operations addressing a room that no longer exists silently no-op
//! (`None`/`false`), and invalid joins are rejected without mutating state.
//! Side effects that must not block the owning task — persisting a closed
//! history, fetching a board — are returned to the caller instead of being
//! performed here.

use diffduel_protocol::{
    GameData, GameMode, GameRoom, Position, RoomId, RoomPhase,
    LIMITED_TIME_CAP_SECS,
};

use crate::history::{now_ms, GameHistory, NO_WINNER};
use crate::RoomRegistry;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A room that just reached its terminal transition. The history, when one
/// was opened, is finalized and ready for its single persistence call.
#[derive(Debug, Clone)]
pub struct ClosedRoom {
    pub room: GameRoom,
    pub history: Option<GameHistory>,
}

/// Result of a classic-mode abandonment.
#[derive(Debug, Clone)]
pub enum ClassicAbandon {
    /// A second participant remains; the room stays alive for them.
    Continues { room: GameRoom },
    /// The abandoning player was alone; the room closed.
    Closed(ClosedRoom),
}

/// Result of a limited-time abandonment.
#[derive(Debug, Clone)]
pub enum LimitedAbandon {
    /// A participant remains; the room keeps running, possibly re-keyed to
    /// the survivor's connection id.
    Migrated { room: GameRoom },
    /// Nobody is left; the room closed and its history is final.
    Closed(ClosedRoom),
}

// ---------------------------------------------------------------------------
// GameService
// ---------------------------------------------------------------------------

/// Owns the [`RoomRegistry`] and implements the lobby protocol, the
/// game-finder queries, the session state machine, and abandonment
/// handling.
#[derive(Default)]
pub struct GameService {
    registry: RoomRegistry,
}

impl GameService {
    /// Creates a service with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a live room.
    pub fn room(&self, room_id: RoomId) -> Option<&GameRoom> {
        self.registry.room(room_id)
    }

    /// Looks up a room's open history record.
    pub fn history(&self, room_id: RoomId) -> Option<&GameHistory> {
        self.registry.history(room_id)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.registry.room_count()
    }

    // -----------------------------------------------------------------------
    // Lobby protocol
    // -----------------------------------------------------------------------

    /// Registers a new room under the creator's connection id.
    ///
    /// `started` skips the lobby for solo sessions. Limited-time rooms
    /// begin with a full countdown clock; clients adjust it through
    /// `apply_time_to_timer` if their configured start time differs.
    pub fn create_room(
        &mut self,
        room_id: RoomId,
        username: &str,
        game_mode: GameMode,
        game_data: GameData,
        started: bool,
    ) -> GameRoom {
        let mut room =
            GameRoom::new(room_id, game_mode, username, game_data, started);
        if game_mode == GameMode::LimitedTime {
            room.user_game.timer = LIMITED_TIME_CAP_SECS;
        }
        tracing::info!(
            %room_id,
            game = room.game_name(),
            %game_mode,
            "room created"
        );
        self.registry.insert(room.clone());
        room
    }

    /// Adds `username` as a lobby candidate of a joinable room.
    ///
    /// Returns the updated room, or `None` when no room matches or the
    /// join violates lobby invariants (self-join, duplicate candidate).
    pub fn join_game(
        &mut self,
        game_name: Option<&str>,
        username: &str,
        game_mode: GameMode,
    ) -> Option<GameRoom> {
        let room_id = self.joinable_room(game_name, username, game_mode)?;
        let room = self.registry.room_mut(room_id)?;
        room.user_game.potential_players.push(username.to_string());
        Some(room.clone())
    }

    /// Read-only: would `join_game` succeed for this user right now?
    pub fn can_join(
        &self,
        game_name: Option<&str>,
        username: &str,
        game_mode: GameMode,
    ) -> bool {
        self.joinable_room(game_name, username, game_mode).is_some()
    }

    /// Read-only: does a joinable room exist at all?
    pub fn check_game(
        &self,
        game_name: Option<&str>,
        game_mode: GameMode,
    ) -> bool {
        self.registry.find_joinable(game_name, game_mode).is_some()
    }

    /// Play begins: opens the room's history record with the current
    /// wall-clock time and the 4-way mode label.
    pub fn start_game(&mut self, room_id: RoomId) -> Option<GameRoom> {
        let room = self.registry.room(room_id)?.clone();
        self.registry
            .set_history(room_id, GameHistory::stub(&room, now_ms()));
        tracing::info!(%room_id, game = room.game_name(), "game launched");
        Some(room)
    }

    /// Host accepted a candidate: the lobby resolves, `username` becomes
    /// the second participant, and the room starts.
    pub fn player_accepted(
        &mut self,
        room_id: RoomId,
        username: &str,
    ) -> Option<GameRoom> {
        let room = self.registry.room_mut(room_id)?;
        room.phase = room.phase.start()?;
        room.user_game.potential_players.clear();
        room.user_game.username2 = Some(username.to_string());
        tracing::info!(%room_id, username, "player accepted");
        Some(room.clone())
    }

    /// Host rejected a candidate: drop them from the waiting list so the
    /// rejected client can react to the broadcast.
    pub fn player_rejected(
        &mut self,
        room_id: RoomId,
        username: &str,
    ) -> Option<GameRoom> {
        let room = self.registry.room_mut(room_id)?;
        room.user_game.potential_players.retain(|p| p != username);
        tracing::info!(%room_id, username, "player rejected");
        Some(room.clone())
    }

    /// A candidate withdrew before being accepted.
    pub fn leave_game(
        &mut self,
        room_id: RoomId,
        username: &str,
    ) -> Option<GameRoom> {
        let room = self.registry.room_mut(room_id)?;
        room.user_game.potential_players.retain(|p| p != username);
        Some(room.clone())
    }

    /// The creator tore the lobby down before accepting anyone. Idempotent:
    /// aborting an already-deleted room is a no-op.
    pub fn abort_game_creation(&mut self, room_id: RoomId) -> Option<GameRoom> {
        let room = self.registry.remove(room_id)?;
        self.registry.remove_history(room_id);
        tracing::info!(%room_id, game = room.game_name(), "creation aborted");
        Some(room)
    }

    /// Shared eligibility check behind `join_game` and `can_join`.
    fn joinable_room(
        &self,
        game_name: Option<&str>,
        username: &str,
        game_mode: GameMode,
    ) -> Option<RoomId> {
        let room = self.registry.find_joinable(game_name, game_mode)?;
        let user_game = &room.user_game;
        let lowered = username.to_lowercase();
        if user_game.username1.to_lowercase() == lowered {
            return None;
        }
        if user_game
            .potential_players
            .iter()
            .any(|p| p.to_lowercase() == lowered)
        {
            return None;
        }
        Some(room.room_id)
    }

    // -----------------------------------------------------------------------
    // Session state machine
    // -----------------------------------------------------------------------

    /// Checks a click against the difference matrix.
    ///
    /// A hit is any in-bounds, non-empty pixel whose region has not been
    /// found yet; hits increment `nb_difference_found`, which never exceeds
    /// the board's difference count. Lobby rooms never validate.
    pub fn validate_difference(
        &mut self,
        room_id: RoomId,
        position: Position,
    ) -> bool {
        let Some(room) = self.registry.room_mut(room_id) else {
            return false;
        };
        if !room.phase.is_active() {
            return false;
        }
        let user_game = &mut room.user_game;
        let Some(region) =
            user_game.game_data.difference_matrix.region_at(position)
        else {
            return false;
        };
        if user_game.nb_difference_found >= user_game.game_data.nb_difference {
            return false;
        }
        if !user_game.found_regions.insert(region) {
            // Stale click on an already-found region.
            return false;
        }
        user_game.nb_difference_found += 1;
        true
    }

    /// Classic: all differences found. Limited-time: the countdown ran out.
    pub fn is_game_finished(&self, room_id: RoomId) -> bool {
        let Some(room) = self.registry.room(room_id) else {
            return false;
        };
        match room.game_mode {
            GameMode::Classic => {
                room.user_game.nb_difference_found
                    == room.user_game.game_data.nb_difference
            }
            GameMode::LimitedTime => room.user_game.timer <= 0,
        }
    }

    /// Applies a signed adjustment (hint penalty, found-difference bonus).
    /// No clamping here — that happens on the next periodic tick.
    pub fn apply_time_to_timer(&mut self, room_id: RoomId, delta: i64) {
        if let Some(room) = self.registry.room_mut(room_id) {
            room.user_game.timer += delta;
        }
    }

    /// One periodic tick for every started room: classic counts up,
    /// limited-time counts down and clamps to `[0, 120]`.
    ///
    /// Returns `(room_id, seconds)` pairs for the timer broadcast. A room
    /// deleted between ticks simply doesn't appear.
    pub fn update_timers(&mut self) -> Vec<(RoomId, i64)> {
        let mut updates = Vec::new();
        for room_id in self.registry.started_ids() {
            let Some(room) = self.registry.room_mut(room_id) else {
                continue;
            };
            let user_game = &mut room.user_game;
            match room.game_mode {
                GameMode::Classic => user_game.timer += 1,
                GameMode::LimitedTime => {
                    user_game.timer =
                        (user_game.timer - 1).clamp(0, LIMITED_TIME_CAP_SECS);
                }
            }
            updates.push((room_id, user_game.timer));
        }
        updates
    }

    /// Swaps a limited-time room onto its next board. No-op for classic
    /// mode; the running difference score carries over.
    pub fn next_game(
        &mut self,
        room_id: RoomId,
        board: GameData,
    ) -> Option<GameRoom> {
        let room = self.registry.room_mut(room_id)?;
        if room.game_mode == GameMode::Classic {
            return None;
        }
        room.user_game.game_data = board;
        room.user_game.found_regions.clear();
        Some(room.clone())
    }

    /// Terminal transition: finalizes the history, removes the room from
    /// the registry, and hands both back for broadcast + persistence.
    ///
    /// `winner` credits `username`; an unfinished end (`game_finished:
    /// false`) records an abandonment instead. Ending a room twice is a
    /// no-op.
    pub fn end_game(
        &mut self,
        room_id: RoomId,
        username: &str,
        winner: bool,
        game_finished: bool,
    ) -> Option<ClosedRoom> {
        let mut room = self.registry.remove(room_id)?;
        room.phase = room.phase.close().unwrap_or(RoomPhase::Closed);

        let history = self.registry.remove_history(room_id).map(|mut h| {
            h.finalize_timer(now_ms());
            if game_finished {
                if winner {
                    h.winner = Some(username.to_string());
                } else if h.username2.is_none() {
                    h.winner = Some(NO_WINNER.to_string());
                }
            } else {
                h.abandoned.push(username.to_string());
            }
            h
        });

        tracing::info!(%room_id, game = room.game_name(), "game ended");
        Some(ClosedRoom { room, history })
    }

    // -----------------------------------------------------------------------
    // Abandonment & host migration
    // -----------------------------------------------------------------------

    /// Classic abandonment is terminal for the leaving participant: solo
    /// rooms close on the spot, two-player rooms stay alive for the
    /// remaining player with the leaver recorded in `abandoned`.
    pub fn abandon_classic(
        &mut self,
        room_id: RoomId,
        username: &str,
    ) -> Option<ClassicAbandon> {
        let multiplayer =
            self.registry.room(room_id)?.user_game.is_multiplayer();
        if multiplayer {
            if let Some(history) = self.registry.history_mut(room_id) {
                history.abandoned.push(username.to_string());
            }
            tracing::info!(%room_id, username, "abandoned classic game");
            let room = self.registry.room(room_id)?.clone();
            Some(ClassicAbandon::Continues { room })
        } else {
            let closed = self.end_game(room_id, username, false, false)?;
            Some(ClassicAbandon::Closed(closed))
        }
    }

    /// Limited-time rooms are a shared resource, so abandonment migrates
    /// the room instead of terminating it whenever a participant remains.
    ///
    /// `new_room_id` is the surviving connection's id, chosen by the
    /// gateway; it equals `old_room_id` when the leaver wasn't the host.
    /// If the leaver was `username1`, `username2` is promoted. The open
    /// history record follows the room under its new id; with nobody left
    /// it is finalized instead.
    pub fn abandon_limited_time(
        &mut self,
        old_room_id: RoomId,
        new_room_id: RoomId,
        username: &str,
    ) -> Option<LimitedAbandon> {
        let mut room = self.registry.remove(old_room_id)?;
        let mut history = self.registry.remove_history(old_room_id);
        if let Some(h) = history.as_mut() {
            h.abandoned.push(username.to_string());
        }

        if room.user_game.is_multiplayer() {
            if room.user_game.username1 == username {
                if let Some(survivor) = room.user_game.username2.take() {
                    room.user_game.username1 = survivor;
                }
            } else {
                room.user_game.username2 = None;
            }
            room.room_id = new_room_id;
            self.registry.insert(room.clone());
            if let Some(h) = history {
                self.registry.set_history(new_room_id, h);
            }
            tracing::info!(
                old = %old_room_id,
                new = %new_room_id,
                username,
                "limited-time host migration"
            );
            Some(LimitedAbandon::Migrated { room })
        } else {
            room.phase = room.phase.close().unwrap_or(RoomPhase::Closed);
            if let Some(h) = history.as_mut() {
                h.finalize_timer(now_ms());
            }
            tracing::info!(%old_room_id, username, "limited-time game closed");
            Some(LimitedAbandon::Closed(ClosedRoom { room, history }))
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
