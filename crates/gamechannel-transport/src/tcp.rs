//! Plain TCP transport with per-connection socket tuning.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

use crate::{ConnectionSink, Transport, TransportError};

/// Socket options applied to every accepted connection.
#[derive(Debug, Clone)]
pub struct TcpOptions {
    /// Disable Nagle's algorithm so small messages go out immediately.
    pub nodelay: bool,
    /// TCP keepalive probe period. `None` leaves keepalive off.
    pub keepalive: Option<Duration>,
    /// Kernel receive buffer size, also used for the read adapter.
    pub recv_buffer_size: usize,
    /// Kernel send buffer size, also used for the write adapter.
    pub send_buffer_size: usize,
    /// Upper bound for one write+flush on the connection's sink.
    pub write_timeout: Option<Duration>,
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self {
            nodelay: true,
            keepalive: Some(Duration::from_secs(30)),
            recv_buffer_size: 64 * 1024,
            send_buffer_size: 64 * 1024,
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// One accepted TCP connection, split into a buffered reader for the
/// handler and a [`ConnectionSink`] that can be shared.
pub struct TcpConnection {
    pub peer: SocketAddr,
    pub reader: BufReader<OwnedReadHalf>,
    pub sink: ConnectionSink,
}

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    options: TcpOptions,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(
        addr: impl tokio::net::ToSocketAddrs,
        options: TcpOptions,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "TCP transport listening");
        }
        Ok(Self { listener, options })
    }

    /// The options applied to accepted connections.
    pub fn options(&self) -> &TcpOptions {
        &self.options
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        tune(&stream, &self.options, peer);

        let (read_half, write_half) = stream.into_split();
        let reader =
            BufReader::with_capacity(self.options.recv_buffer_size, read_half);
        let writer =
            BufWriter::with_capacity(self.options.send_buffer_size, write_half);
        let sink =
            ConnectionSink::new(peer, writer, self.options.write_timeout);

        tracing::debug!(%peer, "accepted TCP connection");
        Ok(TcpConnection { peer, reader, sink })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Applies [`TcpOptions`] to a fresh stream.
///
/// Tuning is best-effort: a rejected option is logged and the
/// connection is still served.
fn tune(stream: &TcpStream, options: &TcpOptions, peer: SocketAddr) {
    if let Err(e) = stream.set_nodelay(options.nodelay) {
        tracing::warn!(%peer, error = %e, "failed to set TCP_NODELAY");
    }

    let sock = SockRef::from(stream);
    if let Some(period) = options.keepalive {
        let keepalive = TcpKeepalive::new().with_time(period);
        if let Err(e) = sock.set_tcp_keepalive(&keepalive) {
            tracing::warn!(%peer, error = %e, "failed to enable keepalive");
        }
    }
    if let Err(e) = sock.set_recv_buffer_size(options.recv_buffer_size) {
        tracing::warn!(%peer, error = %e, "failed to set receive buffer");
    }
    if let Err(e) = sock.set_send_buffer_size(options.send_buffer_size) {
        tracing::warn!(%peer, error = %e, "failed to set send buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = TcpOptions::default();
        assert!(opts.nodelay);
        assert_eq!(opts.keepalive, Some(Duration::from_secs(30)));
        assert_eq!(opts.recv_buffer_size, 64 * 1024);
        assert_eq!(opts.send_buffer_size, 64 * 1024);
        assert_eq!(opts.write_timeout, Some(Duration::from_secs(5)));
    }
}
