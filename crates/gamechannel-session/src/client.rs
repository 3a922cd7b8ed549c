//! The server-side record of one connection.

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gamechannel_protocol::RoomId;
use gamechannel_transport::ConnectionSink;

/// One connected client.
///
/// Created by the acceptor, shared as `Arc<Client>` between the
/// connection handler, the [`ClientRegistry`](crate::ClientRegistry) and,
/// while joined, one room.
///
/// The room field is written only by the room directory while it holds
/// its own write lock, so it always agrees with room membership as seen
/// through the directory.
#[derive(Debug)]
pub struct Client {
    addr: SocketAddr,
    sink: ConnectionSink,
    state: Mutex<ClientState>,
}

#[derive(Debug, Default)]
struct ClientState {
    identity: Option<String>,
    room: Option<RoomId>,
}

impl Client {
    /// A fresh, unauthenticated client in no room.
    pub fn new(sink: ConnectionSink) -> Self {
        Self {
            addr: sink.peer_addr(),
            sink,
            state: Mutex::new(ClientState::default()),
        }
    }

    /// The connection address; the client's key everywhere.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn sink(&self) -> &ConnectionSink {
        &self.sink
    }

    /// The player identity assigned at login, if any.
    pub fn identity(&self) -> Option<String> {
        self.state().identity.clone()
    }

    pub fn set_identity(&self, identity: impl Into<String>) {
        self.state().identity = Some(identity.into());
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().identity.is_some()
    }

    /// The room the client is in, `None` while unassigned.
    pub fn room(&self) -> Option<RoomId> {
        self.state().room
    }

    /// Records the client's room. Meant for the room directory only.
    pub fn set_room(&self, room: Option<RoomId>) {
        self.state().room = room;
    }

    // The guarded state is plain data, so a panic elsewhere cannot leave
    // it half-updated.
    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
