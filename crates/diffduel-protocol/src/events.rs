//! The socket event surface: one enum variant per event, replacing the
//! loosely-typed payload objects of a dynamic socket stack.
//!
//! Both enums are internally tagged (`#[serde(tag = "type")]`), so a
//! validate request looks like:
//!
//! ```json
//! { "type": "ValidateDifference", "room_id": 3,
//!   "position": { "x": 10, "y": 4 }, "username": "alice" }
//! ```

use serde::{Deserialize, Serialize};

use crate::{GameMode, GameRoom, Position, RoomId};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can ask of the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Open a new room. `started` is `true` for solo sessions that skip the
    /// lobby. `game_name` is required for classic mode and ignored for
    /// limited-time mode (the server draws from the shared board pool).
    CreateGame {
        username: String,
        game_mode: GameMode,
        game_name: Option<String>,
        started: bool,
    },

    /// Play begins: the server opens the room's history record and
    /// broadcasts `Started`.
    StartGame { room_id: RoomId },

    /// Ask to join a forming room as a lobby candidate.
    JoinGame {
        game_name: Option<String>,
        username: String,
        game_mode: GameMode,
    },

    /// Host resolves a lobby candidate.
    AcceptPlayer { room_id: RoomId, username: String },
    RejectPlayer { room_id: RoomId, username: String },

    /// Creator tears the lobby down before accepting anyone.
    AbortGameCreation { room_id: RoomId },

    /// A candidate withdraws before being accepted.
    LeaveGame { room_id: RoomId, username: String },

    /// Read-only existence query used by the main menu.
    CheckGame {
        game_name: Option<String>,
        game_mode: GameMode,
    },

    /// Read-only eligibility query (self-join and duplicate-candidate
    /// checks) before committing to the lobby flow.
    CanJoinGame {
        game_name: Option<String>,
        username: String,
        game_mode: GameMode,
    },

    /// A click at `position`; the server answers with a
    /// [`ServerEvent::DifferenceValidated`] broadcast either way.
    ValidateDifference {
        room_id: RoomId,
        position: Position,
        username: String,
    },

    /// Signed timer adjustment (hint penalties subtract, bonuses add).
    ChangeTime { room_id: RoomId, delta: i64 },

    /// Advance a limited-time session to its next board.
    NextGame { room_id: RoomId },

    /// Explicit termination. `winner` marks `username` as the victor;
    /// `game_finished: false` records an abandonment instead.
    EndGame {
        room_id: RoomId,
        username: String,
        winner: bool,
        game_finished: bool,
    },

    /// "I'm leaving" mid-game.
    Abandon { room_id: RoomId, username: String },
}

// ---------------------------------------------------------------------------
// Server → client(s)
// ---------------------------------------------------------------------------

/// Everything the server pushes back, to one requester or a room channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Ack to the creator: the room is registered under this id.
    GameCreated { room_id: RoomId },

    /// A joinable room exists (broadcast on creation, or answered to a
    /// `CheckGame` requester).
    GameFound {
        game_name: Option<String>,
        game_mode: GameMode,
    },

    /// `CheckGame` answer when nothing is joinable.
    GameNotFound { game_mode: GameMode },

    /// Lobby snapshot after a join or a candidate leave. `None` signals a
    /// failed join ("game not found").
    GameInfo { room: Option<GameRoom> },

    /// The lobby resolved; non-accepted candidates self-detect by username
    /// mismatch.
    PlayerAccepted { room: GameRoom },
    PlayerRejected { room: GameRoom },

    /// Lobby teardown broadcasts.
    GameCanceled { room: GameRoom },
    GameDeleted {
        game_name: String,
        game_mode: GameMode,
    },

    /// Play has begun in the room.
    Started,

    /// Result of a `ValidateDifference`, broadcast to the whole room so
    /// wrong guesses are visible to both players.
    DifferenceValidated {
        validated: bool,
        position: Position,
        username: String,
    },

    /// Once-per-second timer broadcast.
    Timer { seconds: i64 },

    /// The session ended; history has been recorded.
    GameFinished,

    /// A participant left a started room; `room` reflects any host
    /// migration that took place.
    Abandoned { room: GameRoom, username: String },

    /// `CanJoinGame` answers.
    CanJoin,
    CannotJoin,
}

// =========================================================================
// Tests
// =========================================================================
