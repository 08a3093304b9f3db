//! Game-history records: created when play starts, mutated through the
//! room's life, persisted exactly once at closure.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use diffduel_protocol::{GameMode, GameRoom};

/// Canonical mode labels stored in history records. These round-trip through
/// persistence verbatim, so they must never change.
pub const CLASSIC_SOLO: &str = "classic-solo";
pub const CLASSIC_1V1: &str = "classic-1v1";
pub const LIMITED_SOLO: &str = "limited-solo";
pub const LIMITED_COOP: &str = "limited-coop";

/// Winner sentinel for games that ended without a victor.
pub const NO_WINNER: &str = "no winner";

/// Picks the 4-way mode label for a session.
pub fn mode_label(mode: GameMode, multiplayer: bool) -> &'static str {
    match (mode, multiplayer) {
        (GameMode::Classic, false) => CLASSIC_SOLO,
        (GameMode::Classic, true) => CLASSIC_1V1,
        (GameMode::LimitedTime, false) => LIMITED_SOLO,
        (GameMode::LimitedTime, true) => LIMITED_COOP,
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// GameHistory
// ---------------------------------------------------------------------------

/// The persisted record of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHistory {
    /// Board name at the time play started.
    pub name: String,
    /// Epoch milliseconds when play started.
    pub start_time: u64,
    /// Elapsed milliseconds at closure; `0` while the record is open.
    pub timer: u64,
    pub username1: String,
    pub username2: Option<String>,
    /// One of the four canonical mode labels.
    pub game_mode: String,
    /// Usernames that left without finishing.
    pub abandoned: Vec<String>,
    /// Winning username, [`NO_WINNER`], or `None` for abandoned records.
    pub winner: Option<String>,
}

impl GameHistory {
    /// Opens a record for a room whose play just started.
    pub fn stub(room: &GameRoom, start_time: u64) -> Self {
        Self {
            name: room.game_name().to_string(),
            start_time,
            timer: 0,
            username1: room.user_game.username1.clone(),
            username2: room.user_game.username2.clone(),
            game_mode: mode_label(
                room.game_mode,
                room.user_game.is_multiplayer(),
            )
            .to_string(),
            abandoned: Vec::new(),
            winner: None,
        }
    }

    /// Stamps the record with elapsed wall-clock time.
    pub(crate) fn finalize_timer(&mut self, now: u64) {
        self.timer = now.saturating_sub(self.start_time);
    }
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`HistoryStore`].
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The backing store rejected the record. The engine logs this and
    /// still drops the room — the game concluded from the players'
    /// perspective regardless of storage outcome.
    #[error("failed to save game history: {0}")]
    Save(String),
}

/// The history-persistence collaborator.
///
/// Called exactly once per room closure, fire-and-forget: the gateway spawns
/// the save so a slow store never stalls timer ticks or validation.
pub trait HistoryStore: Send + Sync + 'static {
    /// Persists one closed record.
    fn save(
        &self,
        history: GameHistory,
    ) -> impl std::future::Future<Output = Result<(), HistoryError>> + Send;
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use diffduel_protocol::{DifferenceMatrix, GameData, RoomId};

    fn board() -> GameData {
        GameData {
            name: "meadow".into(),
            nb_difference: 2,
            difficulty: "easy".into(),
            difference_matrix: DifferenceMatrix(vec![vec![-1, 0]]),
        }
    }

    #[test]
    fn test_mode_label_covers_all_four_combinations() {
        assert_eq!(mode_label(GameMode::Classic, false), "classic-solo");
        assert_eq!(mode_label(GameMode::Classic, true), "classic-1v1");
        assert_eq!(mode_label(GameMode::LimitedTime, false), "limited-solo");
        assert_eq!(mode_label(GameMode::LimitedTime, true), "limited-coop");
    }

    #[test]
    fn test_stub_solo_room_gets_solo_label() {
        let room =
            GameRoom::new(RoomId(1), GameMode::Classic, "alice", board(), true);
        let history = GameHistory::stub(&room, 1_000);

        assert_eq!(history.game_mode, CLASSIC_SOLO);
        assert_eq!(history.name, "meadow");
        assert_eq!(history.start_time, 1_000);
        assert_eq!(history.timer, 0);
        assert_eq!(history.username2, None);
        assert!(history.abandoned.is_empty());
        assert_eq!(history.winner, None);
    }

    #[test]
    fn test_stub_multiplayer_room_gets_multiplayer_label() {
        let mut room =
            GameRoom::new(RoomId(1), GameMode::LimitedTime, "alice", board(), true);
        room.user_game.username2 = Some("bob".into());

        let history = GameHistory::stub(&room, 0);
        assert_eq!(history.game_mode, LIMITED_COOP);
        assert_eq!(history.username2.as_deref(), Some("bob"));
    }

    #[test]
    fn test_finalize_timer_is_elapsed_ms() {
        let room =
            GameRoom::new(RoomId(1), GameMode::Classic, "alice", board(), true);
        let mut history = GameHistory::stub(&room, 5_000);

        history.finalize_timer(12_345);
        assert_eq!(history.timer, 7_345);
    }

    #[test]
    fn test_finalize_timer_saturates_on_clock_skew() {
        let room =
            GameRoom::new(RoomId(1), GameMode::Classic, "alice", board(), true);
        let mut history = GameHistory::stub(&room, 5_000);

        history.finalize_timer(4_000);
        assert_eq!(history.timer, 0);
    }

    #[test]
    fn test_history_label_round_trips_through_serde() {
        // Labels are stored verbatim; a persistence round-trip must not
        // alter them.
        let mut room =
            GameRoom::new(RoomId(1), GameMode::Classic, "alice", board(), false);
        room.user_game.username2 = Some("bob".into());
        let history = GameHistory::stub(&room, 42);

        let bytes = serde_json::to_vec(&history).unwrap();
        let decoded: GameHistory = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.game_mode, CLASSIC_1V1);
        assert_eq!(decoded, history);
    }
}
