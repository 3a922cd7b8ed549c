//! Error types for the protocol layer.
//!
//! Two families live here: [`ProtocolError`] for turning messages into
//! bytes and back, and [`FrameError`] for cutting messages out of the
//! byte stream in the first place. A decode error is something the
//! connection survives; a frame error is not.

/// Errors that can occur while encoding or decoding a message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, wrong field types, or a
    /// payload that does not match the operation it claims to be.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but is not valid at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Errors raised by the [`Framer`](crate::Framer).
///
/// All of them end the connection.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The underlying stream failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The message grew past the configured limit before it closed.
    #[error("message exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Strict policy saw something other than an object opener.
    #[error("expected '{{', got 0x{byte:02X}")]
    UnexpectedByte { byte: u8 },

    /// The stream ended in the middle of a message.
    #[error("stream ended inside a message after {buffered} bytes")]
    UnexpectedEof { buffered: usize },
}
