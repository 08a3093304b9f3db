//! # Diffduel
//!
//! Server for a real-time multiplayer "spot the difference" game: players
//! race to find pixel differences between two near-identical images, solo
//! or head-to-head, on a fixed board (classic mode) or against a countdown
//! chaining through a shared pool of boards (limited-time mode).
//!
//! This crate ties the layers together: transport → protocol → engine,
//! with one [`gateway`] actor owning all live-room state and a periodic
//! ticker driving game clocks.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use diffduel::ServerBuilder;
//!
//! // Implement GameProvider and HistoryStore for your storage, then:
//! // let server = ServerBuilder::new()
//! //     .bind("0.0.0.0:8080")
//! //     .build(my_provider, my_store)
//! //     .await?;
//! // server.run().await
//! ```

mod error;
pub mod gateway;
mod handler;
mod server;

pub use error::DiffduelError;
pub use server::{Server, ServerBuilder};
