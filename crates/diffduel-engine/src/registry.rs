//! The room registry: in-memory maps of live rooms and their open history
//! records, keyed by room id.
//!
//! The registry is the only shared mutable state in the engine and is owned
//! exclusively by the gateway task — plain `HashMap`s, no locking.

use std::collections::HashMap;

use diffduel_protocol::{GameMode, GameRoom, RoomId};

use crate::GameHistory;

/// Keyed store of active [`GameRoom`]s and their open [`GameHistory`]
/// records. Nothing is persisted until a room closes.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, GameRoom>,
    histories: HashMap<RoomId, GameHistory>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a room by id.
    pub fn room(&self, room_id: RoomId) -> Option<&GameRoom> {
        self.rooms.get(&room_id)
    }

    /// Mutable lookup by id.
    pub fn room_mut(&mut self, room_id: RoomId) -> Option<&mut GameRoom> {
        self.rooms.get_mut(&room_id)
    }

    /// Registers (or re-registers) a room under its own id.
    pub fn insert(&mut self, room: GameRoom) {
        self.rooms.insert(room.room_id, room);
    }

    /// Removes and returns a room. `None` if it was already gone.
    pub fn remove(&mut self, room_id: RoomId) -> Option<GameRoom> {
        self.rooms.remove(&room_id)
    }

    /// Finds the first not-started room matching a lookup.
    ///
    /// Classic mode requires board-name equality; limited-time mode ignores
    /// the name entirely — any open limited-time room qualifies, making the
    /// mode an effectively shared queue. Started rooms are invisible, which
    /// is what prevents joining mid-game.
    pub fn find_joinable(
        &self,
        game_name: Option<&str>,
        game_mode: GameMode,
    ) -> Option<&GameRoom> {
        self.rooms.values().find(|room| {
            room.game_mode == game_mode
                && room.phase.is_lobby()
                && match game_mode {
                    GameMode::Classic => Some(room.game_name()) == game_name,
                    GameMode::LimitedTime => true,
                }
        })
    }

    /// Ids of every room whose play has begun (timer-tick targets).
    pub fn started_ids(&self) -> Vec<RoomId> {
        self.rooms
            .values()
            .filter(|room| room.is_started())
            .map(|room| room.room_id)
            .collect()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// The open history record for a room, if play has started.
    pub fn history(&self, room_id: RoomId) -> Option<&GameHistory> {
        self.histories.get(&room_id)
    }

    /// Mutable history lookup.
    pub fn history_mut(
        &mut self,
        room_id: RoomId,
    ) -> Option<&mut GameHistory> {
        self.histories.get_mut(&room_id)
    }

    /// Opens (or replaces) the history record for a room.
    pub fn set_history(&mut self, room_id: RoomId, history: GameHistory) {
        self.histories.insert(room_id, history);
    }

    /// Removes and returns a room's history record.
    pub fn remove_history(&mut self, room_id: RoomId) -> Option<GameHistory> {
        self.histories.remove(&room_id)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use diffduel_protocol::{DifferenceMatrix, GameData, RoomPhase};

    fn board(name: &str) -> GameData {
        GameData {
            name: name.into(),
            nb_difference: 1,
            difficulty: "easy".into(),
            difference_matrix: DifferenceMatrix(vec![vec![-1, 0]]),
        }
    }

    fn lobby_room(id: u64, mode: GameMode, name: &str) -> GameRoom {
        GameRoom::new(RoomId(id), mode, "alice", board(name), false)
    }

    #[test]
    fn test_insert_and_lookup_by_id() {
        let mut reg = RoomRegistry::new();
        reg.insert(lobby_room(1, GameMode::Classic, "meadow"));

        assert!(reg.room(RoomId(1)).is_some());
        assert!(reg.room(RoomId(2)).is_none());
        assert_eq!(reg.room_count(), 1);
    }

    #[test]
    fn test_find_joinable_classic_requires_name_match() {
        let mut reg = RoomRegistry::new();
        reg.insert(lobby_room(1, GameMode::Classic, "meadow"));

        let found = reg.find_joinable(Some("meadow"), GameMode::Classic);
        assert_eq!(found.map(|r| r.room_id), Some(RoomId(1)));

        let found = reg.find_joinable(Some("harbor"), GameMode::Classic);
        assert!(found.is_none());
    }

    #[test]
    fn test_find_joinable_limited_time_ignores_name() {
        // Limited-time rooms form a shared queue: any open one qualifies.
        let mut reg = RoomRegistry::new();
        reg.insert(lobby_room(1, GameMode::LimitedTime, "meadow"));

        let found = reg.find_joinable(None, GameMode::LimitedTime);
        assert_eq!(found.map(|r| r.room_id), Some(RoomId(1)));

        let found = reg.find_joinable(Some("whatever"), GameMode::LimitedTime);
        assert_eq!(found.map(|r| r.room_id), Some(RoomId(1)));
    }

    #[test]
    fn test_find_joinable_skips_started_rooms() {
        let mut reg = RoomRegistry::new();
        let mut room = lobby_room(1, GameMode::Classic, "meadow");
        room.phase = RoomPhase::Active;
        reg.insert(room);

        assert!(reg.find_joinable(Some("meadow"), GameMode::Classic).is_none());
    }

    #[test]
    fn test_find_joinable_skips_other_mode() {
        let mut reg = RoomRegistry::new();
        reg.insert(lobby_room(1, GameMode::Classic, "meadow"));

        assert!(reg.find_joinable(None, GameMode::LimitedTime).is_none());
    }

    #[test]
    fn test_started_ids_only_returns_active_rooms() {
        let mut reg = RoomRegistry::new();
        reg.insert(lobby_room(1, GameMode::Classic, "meadow"));
        let mut started = lobby_room(2, GameMode::LimitedTime, "harbor");
        started.phase = RoomPhase::Active;
        reg.insert(started);

        assert_eq!(reg.started_ids(), vec![RoomId(2)]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut reg = RoomRegistry::new();
        reg.insert(lobby_room(1, GameMode::Classic, "meadow"));

        assert!(reg.remove(RoomId(1)).is_some());
        assert!(reg.remove(RoomId(1)).is_none());
        assert_eq!(reg.room_count(), 0);
    }
}
