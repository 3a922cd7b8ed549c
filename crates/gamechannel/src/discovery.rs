//! One-shot discovery responder.
//!
//! A client connects, sends a short handshake, and gets back a single
//! line listing every channel. Then the server closes its side. The
//! handshake content is never interpreted; a client that sends nothing
//! or hangs up early still gets the list.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use gamechannel_protocol::{Codec, JsonCodec};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::{ChannelError, ChannelRegistry, DiscoveryConfig};

/// Serves the channel list to discovery clients.
pub struct DiscoveryResponder {
    listener: TcpListener,
    config: Arc<DiscoveryConfig>,
    payload: Arc<[u8]>,
}

impl DiscoveryResponder {
    /// Encodes the list once and binds the listener.
    pub async fn bind(
        config: DiscoveryConfig,
        registry: &ChannelRegistry,
    ) -> Result<Self, ChannelError> {
        let payload = JsonCodec.encode_line(&registry.server_list())?;
        let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
        tracing::info!(
            addr = ?listener.local_addr().ok(),
            channels = registry.entries().len(),
            "discovery responder listening"
        );
        Ok(Self {
            listener,
            config: Arc::new(config),
            payload: payload.into(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Answers discovery requests until the process is terminated.
    pub async fn run(self) -> Result<(), ChannelError> {
        self.run_until(std::future::pending()).await
    }

    /// Answers discovery requests until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), ChannelError> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("discovery responder stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let config = Arc::clone(&self.config);
                        let payload = Arc::clone(&self.payload);
                        tokio::spawn(async move {
                            if let Err(e) = respond(stream, peer, &payload, &config).await {
                                tracing::debug!(%peer, error = %e, "discovery exchange failed");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "discovery accept failed");
                    }
                },
            }
        }
    }
}

async fn respond(
    mut stream: TcpStream,
    peer: SocketAddr,
    payload: &[u8],
    config: &DiscoveryConfig,
) -> io::Result<()> {
    let exchange = async {
        let consumed = read_handshake(&mut stream, config).await?;
        tracing::debug!(%peer, bytes = consumed, "discovery handshake");

        stream.write_all(payload).await?;
        stream.flush().await?;
        stream.shutdown().await
    };

    match tokio::time::timeout(config.deadline, exchange).await {
        Ok(res) => {
            res?;
            tracing::info!(%peer, bytes = payload.len(), "server list sent");
            Ok(())
        }
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "discovery deadline exceeded",
        )),
    }
}

/// Reads up to `handshake_len` bytes, giving up quietly after
/// `handshake_wait` or on EOF. Returns how many bytes arrived.
async fn read_handshake(stream: &mut TcpStream, config: &DiscoveryConfig) -> io::Result<usize> {
    let mut buf = vec![0u8; config.handshake_len];
    let mut filled = 0;
    let wait = tokio::time::sleep(config.handshake_wait);
    tokio::pin!(wait);

    while filled < buf.len() {
        tokio::select! {
            () = &mut wait => break,
            read = stream.read(&mut buf[filled..]) => match read? {
                0 => break,
                n => filled += n,
            },
        }
    }
    Ok(filled)
}
