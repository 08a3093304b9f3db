//! The room model: every structure that travels on the wire.
//!
//! A [`GameRoom`] is broadcast whole to its subscribers on most lobby
//! transitions, so the entire model derives `Serialize`/`Deserialize`.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel value in a [`DifferenceMatrix`] cell meaning "no difference at
/// this pixel". Any other value is a difference-region id.
pub const EMPTY_PIXEL: i32 = -1;

/// Upper clamp (seconds) for the limited-time countdown after any tick.
pub const LIMITED_TIME_CAP_SECS: i64 = 120;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
///
/// A room is keyed by its creator's connection id; limited-time rooms may be
/// re-keyed to a surviving participant's connection id on host migration.
///
/// `#[serde(transparent)]` makes `RoomId(42)` serialize as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GameMode
// ---------------------------------------------------------------------------

/// The two session life cycles.
///
/// Classic is a fixed board with at most two participants; limited-time is a
/// countdown session chaining through a shared pool of boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameMode {
    Classic,
    LimitedTime,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => write!(f, "classic"),
            Self::LimitedTime => write!(f, "limited-time"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Lobby → Active → Closed
/// ```
///
/// - **Lobby**: the room is forming; candidates may join; visible to
///   matchmaking lookups.
/// - **Active**: play has begun; invisible to lookups; clicks validate and
///   the timer ticks.
/// - **Closed**: terminal; only exists transiently while the room is being
///   torn down and its history persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomPhase {
    Lobby,
    Active,
    Closed,
}

impl RoomPhase {
    /// Returns `true` while the room is forming and joinable.
    pub fn is_lobby(self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` once play has begun.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Attempts the `Lobby → Active` transition.
    pub fn start(self) -> Option<Self> {
        matches!(self, Self::Lobby).then_some(Self::Active)
    }

    /// Attempts the `Active → Closed` transition.
    pub fn close(self) -> Option<Self> {
        matches!(self, Self::Active).then_some(Self::Closed)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Board data
// ---------------------------------------------------------------------------

/// A pixel coordinate in the board images. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

/// Row-major grid mapping each pixel to a difference-region id, with
/// [`EMPTY_PIXEL`] marking pixels that belong to no difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifferenceMatrix(pub Vec<Vec<i32>>);

impl DifferenceMatrix {
    /// Returns the difference-region id at `pos`, or `None` if the pixel is
    /// empty or out of bounds. Indexing is `[y][x]`.
    pub fn region_at(&self, pos: Position) -> Option<i32> {
        let value = *self.0.get(pos.y as usize)?.get(pos.x as usize)?;
        (value != EMPTY_PIXEL).then_some(value)
    }
}

/// A board definition, owned by the game-definition provider and referenced
/// read-only by the session engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    /// Board name, unique within the provider's catalogue.
    pub name: String,
    /// Total number of difference regions on this board.
    pub nb_difference: u32,
    /// Difficulty label shown to players ("easy", "hard", ...).
    pub difficulty: String,
    /// Per-pixel difference lookup.
    pub difference_matrix: DifferenceMatrix,
}

// ---------------------------------------------------------------------------
// UserGame / GameRoom
// ---------------------------------------------------------------------------

/// The play state embedded in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGame {
    /// The creator (host) of the room.
    pub username1: String,
    /// The accepted second participant, if any. Always `None` in the lobby.
    pub username2: Option<String>,
    /// Lobby candidates awaiting accept/reject, in arrival order.
    pub potential_players: Vec<String>,
    /// The current board.
    pub game_data: GameData,
    /// Running count of differences found; monotonic until game end.
    pub nb_difference_found: u32,
    /// Region ids already found on the current board. A repeat click on a
    /// found region is not a fresh hit.
    pub found_regions: HashSet<i32>,
    /// Seconds: counts up in classic mode, down in limited-time mode.
    pub timer: i64,
}

impl UserGame {
    /// Fresh play state for a newly created room.
    pub fn new(username1: impl Into<String>, game_data: GameData) -> Self {
        Self {
            username1: username1.into(),
            username2: None,
            potential_players: Vec::new(),
            game_data,
            nb_difference_found: 0,
            found_regions: HashSet::new(),
            timer: 0,
        }
    }

    /// Returns `true` when a second participant has been accepted.
    pub fn is_multiplayer(&self) -> bool {
        self.username2.is_some()
    }
}

/// The unit of an active or forming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRoom {
    pub room_id: RoomId,
    pub game_mode: GameMode,
    pub phase: RoomPhase,
    pub user_game: UserGame,
}

impl GameRoom {
    /// Creates a room in the given initial phase.
    ///
    /// Solo sessions skip the lobby entirely and are created `Active`;
    /// everything else starts in `Lobby`.
    pub fn new(
        room_id: RoomId,
        game_mode: GameMode,
        username1: impl Into<String>,
        game_data: GameData,
        started: bool,
    ) -> Self {
        Self {
            room_id,
            game_mode,
            phase: if started { RoomPhase::Active } else { RoomPhase::Lobby },
            user_game: UserGame::new(username1, game_data),
        }
    }

    /// Returns `true` once play has begun. Gates matchmaking visibility and
    /// difference validation.
    pub fn is_started(&self) -> bool {
        self.phase.is_active()
    }

    /// The current board's name.
    pub fn game_name(&self) -> &str {
        &self.user_game.game_data.name
    }
}

// =========================================================================
// Tests
// =========================================================================
