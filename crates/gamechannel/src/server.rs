//! `ChannelServer` builder and accept loop.
//!
//! Ties the layers together: transport → framer → router → rooms.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gamechannel_protocol::{Framer, JsonCodec};
use gamechannel_room::{DampedMotion, RoomDirectory, Simulation};
use gamechannel_session::{Authenticator, Client, ClientRegistry, NonEmptyCredentials};
use gamechannel_transport::{TcpTransport, Transport};

use crate::handler::handle_connection;
use crate::{ChannelConfig, ChannelError};

/// State shared by every connection task.
///
/// The two registries are the only mutable state shared between
/// connections; both lock internally.
pub(crate) struct ServerState<A: Authenticator, S: Simulation> {
    pub(crate) clients: Arc<ClientRegistry>,
    pub(crate) rooms: Arc<RoomDirectory>,
    pub(crate) auth: A,
    pub(crate) sim: S,
    pub(crate) codec: JsonCodec,
    pub(crate) framer: Framer,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for a [`ChannelServer`].
///
/// # Example
///
/// ```rust,no_run
/// use gamechannel::prelude::*;
///
/// # async fn start() -> Result<(), ChannelError> {
/// let server = ChannelServer::builder()
///     .bind("0.0.0.0:9090")
///     .build(NonEmptyCredentials, DampedMotion::default())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ChannelServerBuilder {
    config: ChannelConfig,
    clients: Option<Arc<ClientRegistry>>,
    rooms: Option<Arc<RoomDirectory>>,
}

impl ChannelServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to listen on, keeping the rest of the config.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses existing registries instead of fresh ones, so the caller can
    /// inspect them while the server runs.
    pub fn registries(mut self, clients: Arc<ClientRegistry>, rooms: Arc<RoomDirectory>) -> Self {
        self.clients = Some(clients);
        self.rooms = Some(rooms);
        self
    }

    /// Binds the listener.
    pub async fn build<A, S>(self, auth: A, sim: S) -> Result<ChannelServer<A, S>, ChannelError>
    where
        A: Authenticator,
        S: Simulation,
    {
        let transport = TcpTransport::bind(self.config.bind_addr.as_str(), self.config.tcp.clone())
            .await?;

        let state = Arc::new(ServerState {
            clients: self.clients.unwrap_or_default(),
            rooms: self.rooms.unwrap_or_default(),
            auth,
            sim,
            codec: JsonCodec,
            framer: self.config.framer(),
            idle_timeout: self.config.idle_timeout,
        });

        Ok(ChannelServer { transport, state })
    }
}

/// A bound game channel.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ChannelServer<A: Authenticator, S: Simulation> {
    transport: TcpTransport,
    state: Arc<ServerState<A, S>>,
}

impl ChannelServer<NonEmptyCredentials, DampedMotion> {
    /// Creates a new builder.
    pub fn builder() -> ChannelServerBuilder {
        ChannelServerBuilder::new()
    }
}

impl<A, S> ChannelServer<A, S>
where
    A: Authenticator,
    S: Simulation,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn clients(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.state.clients)
    }

    pub fn rooms(&self) -> Arc<RoomDirectory> {
        Arc::clone(&self.state.rooms)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ChannelError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted connection is registered as a client and handed to
    /// its own task. A failed accept is logged and the loop continues.
    /// Connections already running are not interrupted by shutdown.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ChannelError> {
        tracing::info!(addr = ?self.local_addr().ok(), "game channel running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("game channel stopping");
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let client = Arc::new(Client::new(conn.sink));
                        self.state.clients.register(Arc::clone(&client)).await;
                        metrics::counter!("gamechannel_connections_total").increment(1);
                        tracing::info!(peer = %conn.peer, "client connected");

                        let state = Arc::clone(&self.state);
                        let reader = conn.reader;
                        tokio::spawn(async move {
                            let peer = client.addr();
                            if let Err(e) = handle_connection(client, reader, state).await {
                                tracing::debug!(%peer, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
