//! Message types for the gamechannel wire format.
//!
//! Every message is a JSON object carrying an `op` field. Requests are
//! decoded in two steps: first only the [`Envelope`] (the tag), then the
//! typed request the tag selects. Responses are a single internally
//! tagged [`ServerMessage`] enum.

use std::fmt;
use std::ops::Mul;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a room.
///
/// `#[serde(transparent)]` keeps it a bare number on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u32);

impl RoomId {
    /// The lobby, where a login without an explicit room lands.
    pub const LOBBY: RoomId = RoomId(0);
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// A 3-component vector used for directions and positions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// The operation tag of a message, decoded without touching the rest of
/// the payload.
///
/// Unknown fields are ignored, so this succeeds for any object that has
/// a string `op`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    pub op: String,
}

/// Operations a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Move,
    Chat,
}

impl Operation {
    /// Maps a wire tag to an operation. Tags are case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "login" => Some(Self::Login),
            "move" => Some(Self::Move),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }

    /// The wire tag, also used as a metrics label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Move => "move",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{"op":"login","username":..,"password":..,"room_id"?:..}`
///
/// Missing credentials decode as empty strings so the handler can answer
/// with a proper error instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub room_id: Option<RoomId>,
}

/// `{"op":"move","player_id":..,"dir":{x,y,z},"client_tick":..,"room_id"?:..}`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MoveRequest {
    pub player_id: String,
    pub dir: Vec3,
    pub client_tick: u64,
    pub room_id: Option<RoomId>,
}

/// `{"op":"chat","player_id":..,"text":..,"room_id"?:..}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub player_id: String,
    pub text: String,
    pub room_id: Option<RoomId>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Everything the server writes on the room protocol.
///
/// Internally tagged: `ServerMessage::Ack { .. }` becomes
/// `{"op":"ack","ok":true,"ts":..,"room_id":0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Login accepted; `room_id` is the room the client now belongs to.
    Ack { ok: bool, ts: i64, room_id: RoomId },

    /// A player's new position, sent to the whole room.
    State {
        player_id: String,
        server_tick: u64,
        pos: Vec3,
        room_id: RoomId,
    },

    /// A chat line relayed to the other members of a room.
    Msg {
        player_id: String,
        text: String,
        ts: i64,
        room_id: RoomId,
    },

    /// A request could not be served. The connection stays open.
    Error { error: String, ts: i64 },
}

impl ServerMessage {
    pub fn ack(room_id: RoomId) -> Self {
        Self::Ack {
            ok: true,
            ts: timestamp_ms(),
            room_id,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
            ts: timestamp_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Whether an advertised channel is accepting players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    #[default]
    Online,
    Offline,
}

/// One channel endpoint in the discovery list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub status: ChannelStatus,
}

/// The single document written by the discovery responder.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerList {
    pub servers: Vec<ChannelEntry>,
}

/// Milliseconds since the Unix epoch, used for `ts` and `server_tick`.
pub fn timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
