//! gamechannel: entry point.
//!
//! ```text
//! gamechannel serve      [OPTIONS]   room protocol listener
//! gamechannel discovery  [OPTIONS]   one-shot channel list responder
//! ```
//!
//! Every option can also be set through the environment variable shown in
//! `--help`. Command-line values take precedence.
//!
//! | Variable             | Default      | Description                          |
//! |----------------------|--------------|--------------------------------------|
//! | `TCP_HOST`           | `127.0.0.1`  | Host to bind                         |
//! | `TCP_PORT`           |              | Port to bind, overrides the index    |
//! | `CHANNEL_PORT`       |              | A channel port                       |
//! | `CHANNEL_PORTS`      |              | Ports and ranges, `29998,29990-29992`|
//! | `GAME_PORT`          |              | One more channel port                |
//! | `CHANNEL_INDEX`      | `0`          | Which channel port this process uses |
//! | `SERVER_IP`          | `127.0.0.1`  | IP advertised by discovery           |
//! | `CHANNELS_FILE`      |              | JSON channel list, replaces ports    |
//! | `FRAME_POLICY`       | `tolerant`   | `strict` or `tolerant`               |
//! | `MAX_FRAME_SIZE`     | `524288`     | Largest message in bytes             |
//! | `IDLE_TIMEOUT_SECS`  | `120`        | Idle read timeout, `0` disables      |
//! | `WRITE_TIMEOUT_SECS` | `5`          | Per-write timeout, `0` disables      |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gamechannel::prelude::*;
use gamechannel::{channel_ports, select_port};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gamechannel", about = "Room-based TCP relay for game clients", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the room protocol listener.
    Serve {
        #[command(flatten)]
        channel: ChannelArgs,
        #[command(flatten)]
        serve: ServeArgs,
    },
    /// Run the discovery responder.
    Discovery {
        #[command(flatten)]
        channel: ChannelArgs,
    },
}

/// Where this process listens and which channels exist.
#[derive(Debug, Args)]
struct ChannelArgs {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1", env = "TCP_HOST")]
    host: String,

    /// Port to bind. Takes precedence over `--index`.
    #[arg(long, env = "TCP_PORT")]
    port: Option<u16>,

    /// A channel port, listed first.
    #[arg(long, env = "CHANNEL_PORT")]
    channel_port: Option<u16>,

    /// Comma-separated channel ports and ranges.
    #[arg(long, env = "CHANNEL_PORTS")]
    channel_ports: Option<String>,

    /// One more channel port, listed last.
    #[arg(long, env = "GAME_PORT")]
    game_port: Option<u16>,

    /// Index of this process's port in the channel list.
    #[arg(long, env = "CHANNEL_INDEX")]
    index: Option<usize>,

    /// IP advertised for every channel.
    #[arg(long, default_value = "127.0.0.1", env = "SERVER_IP")]
    server_ip: String,

    /// JSON file listing channels; replaces the port options.
    #[arg(long, env = "CHANNELS_FILE")]
    channels_file: Option<PathBuf>,
}

impl ChannelArgs {
    fn registry(&self) -> anyhow::Result<ChannelRegistry> {
        match &self.channels_file {
            Some(path) => ChannelRegistry::from_json_file(path, &self.server_ip)
                .with_context(|| format!("loading channels from {}", path.display())),
            None => {
                let ports = channel_ports(
                    self.channel_port,
                    self.channel_ports.as_deref(),
                    self.game_port,
                );
                Ok(ChannelRegistry::from_ports(&self.server_ip, &ports))
            }
        }
    }

    fn bind_addr(&self, registry: &ChannelRegistry) -> String {
        let port = select_port(&registry.ports(), self.port, self.index);
        format!("{}:{}", self.host, port)
    }
}

/// Room protocol tuning.
#[derive(Debug, Args)]
struct ServeArgs {
    /// `strict` closes on any non-JSON leading byte; `tolerant` echoes
    /// keepalives and skips the rest.
    #[arg(long, default_value = "tolerant", env = "FRAME_POLICY")]
    frame_policy: FramePolicy,

    /// Largest accepted message in bytes.
    #[arg(long, default_value_t = 512 * 1024, env = "MAX_FRAME_SIZE")]
    max_frame_size: usize,

    /// Close connections idle for this many seconds. 0 disables.
    #[arg(long, default_value_t = 120, env = "IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: u64,

    /// Give up on a single write after this many seconds. 0 disables.
    #[arg(long, default_value_t = 5, env = "WRITE_TIMEOUT_SECS")]
    write_timeout_secs: u64,
}

impl ServeArgs {
    fn into_config(self, bind_addr: String) -> ChannelConfig {
        ChannelConfig {
            bind_addr,
            frame_policy: self.frame_policy,
            max_frame_size: self.max_frame_size,
            idle_timeout: secs(self.idle_timeout_secs),
            tcp: TcpOptions {
                write_timeout: secs(self.write_timeout_secs),
                ..TcpOptions::default()
            },
        }
    }
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Serve { channel, serve } => {
            let registry = channel.registry()?;
            let config = serve.into_config(channel.bind_addr(&registry));
            tracing::info!(
                bind = %config.bind_addr,
                channels = ?registry.ports(),
                policy = %config.frame_policy,
                "game channel starting"
            );

            let server = ChannelServer::builder()
                .config(config)
                .build(NonEmptyCredentials, DampedMotion::default())
                .await
                .context("starting game channel")?;
            server.run_until(shutdown_signal()).await?;
        }
        Command::Discovery { channel } => {
            let registry = channel.registry()?;
            let config = DiscoveryConfig {
                bind_addr: channel.bind_addr(&registry),
                ..DiscoveryConfig::default()
            };

            let responder = DiscoveryResponder::bind(config, &registry)
                .await
                .context("starting discovery responder")?;
            responder.run_until(shutdown_signal()).await?;
        }
    }

    Ok(())
}
