//! Codec trait and implementations for serializing/deserializing events.
//!
//! The protocol layer doesn't care HOW messages are serialized — it just
//! needs something that implements the [`Codec`] trait. [`JsonCodec`] is the
//! default (human-readable, matches what browser clients speak); a binary
//! codec can be swapped in without touching any other code.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is shared across connection
/// handler tasks for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use diffduel_protocol::{Codec, JsonCodec, ServerEvent};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerEvent::Started).unwrap();
/// let decoded: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ServerEvent::Started);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientEvent, RoomId};

    #[test]
    fn test_json_codec_round_trips_client_event() {
        let codec = JsonCodec;
        let ev = ClientEvent::AbortGameCreation { room_id: RoomId(4) };

        let bytes = codec.encode(&ev).unwrap();
        let decoded: ClientEvent = codec.decode(&bytes).unwrap();

        assert_eq!(ev, decoded);
    }

    #[test]
    fn test_json_codec_decode_rejects_wrong_shape() {
        let codec = JsonCodec;
        let result: Result<ClientEvent, _> = codec.decode(br#"{"name":"x"}"#);
        assert!(result.is_err());
    }
}
