//! Transport layer for gamechannel.
//!
//! Provides the [`Transport`] trait for accepting connections, the
//! [`TcpTransport`] implementation with socket tuning, and
//! [`ConnectionSink`], the narrow write capability a client record holds
//! instead of the whole socket.

#![allow(async_fn_in_trait)]

mod error;
mod sink;
mod tcp;

pub use error::TransportError;
pub use sink::ConnectionSink;
pub use tcp::{TcpConnection, TcpOptions, TcpTransport};

use std::net::SocketAddr;

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    ///
    /// A failure here concerns a single connection attempt; callers are
    /// expected to log it and keep accepting.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}
