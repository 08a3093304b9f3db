//! Wire protocol for Diffduel.
//!
//! This crate defines the "language" that game clients and the server speak:
//!
//! - **Types** ([`GameRoom`], [`GameMode`], [`Position`], etc.) — the room
//!   model and the structures that travel on the wire.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — one variant per socket
//!   event, validated at the boundary instead of loosely-typed payloads.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the session
//! engine (room state). It doesn't know about connections or registries —
//! it only knows how to describe and serialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Engine (room state)
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use types::{
    DifferenceMatrix, GameData, GameMode, GameRoom, Position, RoomId,
    RoomPhase, UserGame, EMPTY_PIXEL, LIMITED_TIME_CAP_SECS,
};
