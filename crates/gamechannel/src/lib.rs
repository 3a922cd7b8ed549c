//! # gamechannel
//!
//! A room-based relay for game clients over plain TCP.
//!
//! Clients send self-delimited JSON objects. After logging in they are
//! placed in a room; movement updates go to the whole room and chat lines
//! to everyone but the sender. A separate one-shot discovery responder
//! lists the channels a client can connect to.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gamechannel::prelude::*;
//!
//! # async fn start() -> Result<(), ChannelError> {
//! let server = ChannelServer::builder()
//!     .config(ChannelConfig::default())
//!     .build(NonEmptyCredentials, DampedMotion::default())
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod config;
mod discovery;
mod error;
mod handler;
mod router;
mod server;

pub use config::{
    ChannelConfig, ChannelRegistry, DEFAULT_CHANNEL_PORT, DEFAULT_HOST, DiscoveryConfig,
    channel_ports, parse_ports, select_port,
};
pub use discovery::DiscoveryResponder;
pub use error::{ChannelError, ConfigError};
pub use server::{ChannelServer, ChannelServerBuilder};

/// Everything needed to run a channel.
pub mod prelude {
    pub use crate::{
        ChannelConfig, ChannelError, ChannelRegistry, ChannelServer, ChannelServerBuilder,
        ConfigError, DiscoveryConfig, DiscoveryResponder,
    };
    pub use gamechannel_protocol::{
        ChannelEntry, ChannelStatus, FramePolicy, RoomId, ServerList, ServerMessage, Vec3,
    };
    pub use gamechannel_room::{DampedMotion, RoomDirectory, Simulation};
    pub use gamechannel_session::{
        Authenticator, ClientRegistry, Credentials, NonEmptyCredentials, SessionError,
    };
    pub use gamechannel_transport::TcpOptions;
}
