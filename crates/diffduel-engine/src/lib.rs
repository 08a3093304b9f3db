//! Session orchestration engine for Diffduel.
//!
//! Everything that happens between "a player opens a lobby" and "the game's
//! history record is handed to storage" lives here:
//!
//! - [`RoomRegistry`] — the in-memory maps of live rooms and their open
//!   history records.
//! - [`GameService`] — lobby protocol, game-finder queries, the
//!   difference-validation/timer state machine, and abandonment handling.
//! - [`GameHistory`] / [`HistoryStore`] — the append-only record derived
//!   from a room's life cycle, persisted exactly once at closure.
//! - [`GameProvider`] — the game-definition collaborator that supplies
//!   board data.
//!
//! # Concurrency note
//!
//! Nothing in this crate is thread-safe by itself — the registry uses plain
//! `HashMap`s and every operation is synchronous. This is intentional: the
//! whole engine is owned by a single gateway task and driven through its
//! message channel, so there is no locking to get wrong. Side effects that
//! must not block that task (history persistence, board fetches) are
//! *returned* to the caller rather than performed here.

#![allow(async_fn_in_trait)]

mod history;
mod provider;
mod registry;
mod service;

pub use history::{
    mode_label, GameHistory, HistoryError, HistoryStore, CLASSIC_1V1,
    CLASSIC_SOLO, LIMITED_COOP, LIMITED_SOLO, NO_WINNER,
};
pub use provider::GameProvider;
pub use registry::RoomRegistry;
pub use service::{ClassicAbandon, ClosedRoom, GameService, LimitedAbandon};
