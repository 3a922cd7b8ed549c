//! Codec trait and the JSON implementation.
//!
//! The framer hands the router raw message bytes; a [`Codec`] turns
//! those into typed requests and turns responses back into bytes.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Line terminator appended after every outbound message.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Encodes Rust types to bytes and decodes bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Encodes a value followed by [`LINE_TERMINATOR`], the shape every
    /// outbound message takes on the wire.
    fn encode_line<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        let mut bytes = self.encode(value)?;
        bytes.push(LINE_TERMINATOR);
        Ok(bytes)
    }
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use gamechannel_protocol::{Codec, JsonCodec, RoomId, ServerMessage};
///
/// let codec = JsonCodec;
/// let line = codec.encode_line(&ServerMessage::ack(RoomId::LOBBY)).unwrap();
/// assert_eq!(line.last(), Some(&b'\n'));
///
/// let back: ServerMessage = codec.decode(&line).unwrap();
/// assert!(matches!(back, ServerMessage::Ack { ok: true, .. }));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
