//! Room directory: which clients are in which room.
//!
//! Rooms are plain member sets keyed by connection address. A room comes
//! into existence on its first join and is deleted the moment its last
//! member leaves, so an empty room is never observable.
//!
//! All structural changes happen under one write lock, and the client's
//! own room field is updated inside that same critical section. Broadcast
//! only snapshots the member list under the read lock and writes after
//! releasing it, so a slow peer never holds up a join or leave.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use gamechannel_protocol::RoomId;
use gamechannel_session::{Client, RoomMembership};
use tokio::sync::RwLock;

type Members = HashMap<SocketAddr, Arc<Client>>;

/// Every non-empty room and its members.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: RwLock<HashMap<RoomId, Members>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `client` into `room`, leaving its previous room first.
    ///
    /// Returns `false` without touching anything if the client is already
    /// a member of `room`.
    pub async fn join(&self, client: &Arc<Client>, room: RoomId) -> bool {
        let addr = client.addr();
        let mut rooms = self.rooms.write().await;

        let current = client.room();
        if current == Some(room)
            && rooms.get(&room).is_some_and(|m| m.contains_key(&addr))
        {
            return false;
        }

        if let Some(previous) = current {
            remove_member(&mut rooms, previous, addr);
        }

        let members = rooms.entry(room).or_insert_with(|| {
            tracing::info!(%room, "room created");
            HashMap::new()
        });
        members.insert(addr, Arc::clone(client));
        client.set_room(Some(room));
        metrics::gauge!("gamechannel_room_members", "room" => room.0.to_string())
            .increment(1.0);

        tracing::debug!(%addr, %room, members = members.len(), "client joined room");
        true
    }

    /// Takes `client` out of its room. Returns the room it left, or `None`
    /// if it was not in one.
    pub async fn leave(&self, client: &Client) -> Option<RoomId> {
        let mut rooms = self.rooms.write().await;
        let room = client.room()?;
        remove_member(&mut rooms, room, client.addr());
        client.set_room(None);
        tracing::debug!(addr = %client.addr(), %room, "client left room");
        Some(room)
    }

    /// Sends `payload` to every member of `room` except `exclude`.
    ///
    /// Members whose sink is already closed are skipped. A failed write is
    /// logged and does not stop delivery to the others. Returns how many
    /// members received the payload; a room that does not exist yields 0.
    pub async fn broadcast(
        &self,
        room: RoomId,
        payload: &[u8],
        exclude: Option<SocketAddr>,
    ) -> usize {
        let recipients: Vec<Arc<Client>> = {
            let rooms = self.rooms.read().await;
            match rooms.get(&room) {
                Some(members) => members
                    .values()
                    .filter(|c| Some(c.addr()) != exclude)
                    .cloned()
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for client in &recipients {
            if client.sink().is_closed() {
                continue;
            }
            match client.sink().send(payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        peer = %client.addr(),
                        %room,
                        error = %e,
                        "broadcast delivery failed"
                    );
                }
            }
        }

        metrics::counter!(
            "gamechannel_messages_total",
            "op" => "broadcast",
            "room" => room.0.to_string()
        )
        .increment(1);

        delivered
    }

    /// Number of members in `room`, 0 if it does not exist.
    pub async fn member_count(&self, room: RoomId) -> usize {
        self.rooms.read().await.get(&room).map_or(0, HashMap::len)
    }

    pub async fn contains_room(&self, room: RoomId) -> bool {
        self.rooms.read().await.contains_key(&room)
    }

    /// Number of rooms that currently have members.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl RoomMembership for RoomDirectory {
    async fn leave(&self, client: &Client) {
        RoomDirectory::leave(self, client).await;
    }
}

fn remove_member(rooms: &mut HashMap<RoomId, Members>, room: RoomId, addr: SocketAddr) {
    let Some(members) = rooms.get_mut(&room) else {
        return;
    };
    if members.remove(&addr).is_some() {
        metrics::gauge!("gamechannel_room_members", "room" => room.0.to_string())
            .decrement(1.0);
    }
    if members.is_empty() {
        rooms.remove(&room);
        tracing::info!(%room, "room destroyed");
    }
}
