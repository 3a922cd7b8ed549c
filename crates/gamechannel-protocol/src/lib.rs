//! Wire protocol for gamechannel.
//!
//! - **Framer** ([`Framer`], [`FramePolicy`]): extracts complete JSON
//!   objects from a raw byte stream and recognises the keepalive byte.
//! - **Types** ([`Envelope`], request structs, [`ServerMessage`],
//!   [`ServerList`]): what travels on the wire.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes to types and back.
//! - **Errors** ([`ProtocolError`], [`FrameError`]).
//!
//! ```text
//! Transport (bytes) → Framer (one object) → Codec (typed request)
//! ```

mod codec;
mod error;
mod framer;
mod types;

pub use codec::{Codec, LINE_TERMINATOR};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::{FrameError, ProtocolError};
pub use framer::{DEFAULT_MAX_FRAME_SIZE, Frame, FramePolicy, Framer, KEEPALIVE_MARKER};
pub use types::{
    ChannelEntry, ChannelStatus, ChatRequest, Envelope, LoginRequest, MoveRequest, Operation,
    RoomId, ServerList, ServerMessage, Vec3, timestamp_ms,
};
