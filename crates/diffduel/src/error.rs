//! Unified error type for the Diffduel server.

use diffduel_protocol::ProtocolError;
use diffduel_transport::TransportError;

/// Top-level error that wraps the crate-specific errors an embedder can
/// meet while running a server.
///
/// The `#[from]` attributes auto-generate `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DiffduelError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The gateway actor is gone; no more events can be processed.
    #[error("gateway channel closed")]
    GatewayClosed,
}
