//! The registry of connected clients.
//!
//! # Concurrency
//!
//! The map sits behind a `tokio::sync::RwLock`: lookups share the read
//! side, register/unregister take the write side. The lock is never held
//! across any I/O.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::Client;

/// Removes a client from whatever room it is in.
///
/// Implemented by the room layer; the registry calls it before dropping
/// a client so no room keeps a member whose connection is gone.
pub trait RoomMembership: Send + Sync {
    fn leave(&self, client: &Client) -> impl std::future::Future<Output = ()> + Send;
}

/// Every currently connected client, keyed by connection address.
///
/// Entry lifetime matches connection lifetime: the acceptor registers on
/// accept and the handler unregisters on teardown.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<SocketAddr, Arc<Client>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client. A client already registered under the same address
    /// is replaced.
    pub async fn register(&self, client: Arc<Client>) {
        let addr = client.addr();
        let previous = self.clients.write().await.insert(addr, client);
        if previous.is_some() {
            tracing::warn!(%addr, "replaced existing client registration");
        }
    }

    /// Takes the client out of its room (if any), then out of the registry.
    ///
    /// Returns `false` if the address was not registered to this client.
    /// A newer registration under the same address is left alone.
    pub async fn unregister(&self, client: &Client, rooms: &impl RoomMembership) -> bool {
        if client.room().is_some() {
            rooms.leave(client).await;
        }

        let mut clients = self.clients.write().await;
        match clients.get(&client.addr()) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), client) => {
                clients.remove(&client.addr());
                true
            }
            _ => false,
        }
    }

    /// Finds the client connected from `addr`.
    pub async fn lookup(&self, addr: &SocketAddr) -> Option<Arc<Client>> {
        self.clients.read().await.get(addr).cloned()
    }

    /// Number of registered clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gamechannel_protocol::RoomId;
    use gamechannel_transport::ConnectionSink;

    use super::*;

    /// Counts leaves and clears the client's room like the real directory.
    #[derive(Default)]
    struct CountingRooms {
        leaves: AtomicUsize,
    }

    impl RoomMembership for CountingRooms {
        async fn leave(&self, client: &Client) {
            self.leaves.fetch_add(1, Ordering::SeqCst);
            client.set_room(None);
        }
    }

    fn client(port: u16) -> Arc<Client> {
        let (ours, _theirs) = tokio::io::duplex(16);
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        Arc::new(Client::new(ConnectionSink::new(addr, ours, None)))
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = ClientRegistry::new();
        let c = client(4000);
        registry.register(Arc::clone(&c)).await;

        let found = registry.lookup(&c.addr()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &c));
        assert_eq!(registry.len().await, 1);

        let other = SocketAddr::from(([127, 0, 0, 1], 4001));
        assert!(registry.lookup(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_register_same_address_overwrites() {
        let registry = ClientRegistry::new();
        let first = client(4000);
        let second = client(4000);
        registry.register(Arc::clone(&first)).await;
        registry.register(Arc::clone(&second)).await;

        assert_eq!(registry.len().await, 1);
        let found = registry.lookup(&first.addr()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[tokio::test]
    async fn test_unregister_leaves_room_first() {
        let registry = ClientRegistry::new();
        let rooms = CountingRooms::default();
        let c = client(4000);
        c.set_room(Some(RoomId(2)));
        registry.register(Arc::clone(&c)).await;

        assert!(registry.unregister(&c, &rooms).await);
        assert_eq!(rooms.leaves.load(Ordering::SeqCst), 1);
        assert_eq!(c.room(), None);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_without_room_skips_leave() {
        let registry = ClientRegistry::new();
        let rooms = CountingRooms::default();
        let c = client(4000);
        registry.register(Arc::clone(&c)).await;

        assert!(registry.unregister(&c, &rooms).await);
        assert_eq!(rooms.leaves.load(Ordering::SeqCst), 0);
        assert!(!registry.unregister(&c, &rooms).await);
    }

    #[tokio::test]
    async fn test_unregister_keeps_newer_registration() {
        let registry = ClientRegistry::new();
        let rooms = CountingRooms::default();
        let stale = client(4000);
        let fresh = client(4000);
        registry.register(Arc::clone(&stale)).await;
        registry.register(Arc::clone(&fresh)).await;

        assert!(!registry.unregister(&stale, &rooms).await);
        let found = registry.lookup(&fresh.addr()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &fresh));
    }
}
