//! Per-connection handler: read frames, route them, tear down once.
//!
//! The flow for each accepted connection:
//!   1. The accept loop has already registered the client
//!   2. Loop: read one frame → echo keepalives, log skipped bytes, route
//!      messages, each to completion before the next read
//!   3. On any exit: leave the room, unregister, close the sink

use std::sync::Arc;

use gamechannel_protocol::{Codec, Frame, FrameError, KEEPALIVE_MARKER, ServerMessage};
use gamechannel_room::Simulation;
use gamechannel_session::{Authenticator, Client};
use tokio::io::AsyncBufRead;

use crate::ChannelError;
use crate::router::route;
use crate::server::ServerState;

/// Runs teardown when the handler exits.
///
/// The normal path calls [`finish`](Self::finish) and awaits teardown
/// inline. If the handler task is dropped or panics instead, including
/// partway through that inline teardown, `Drop` spawns it again. Every
/// step of teardown is safe to repeat.
struct ConnectionGuard<A: Authenticator, S: Simulation> {
    client: Arc<Client>,
    state: Arc<ServerState<A, S>>,
    done: bool,
}

impl<A: Authenticator, S: Simulation> ConnectionGuard<A, S> {
    async fn finish(mut self) {
        teardown(&self.client, &self.state).await;
        self.done = true;
    }
}

impl<A: Authenticator, S: Simulation> Drop for ConnectionGuard<A, S> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let client = Arc::clone(&self.client);
        let state = Arc::clone(&self.state);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                teardown(&client, &state).await;
            });
        }
    }
}

async fn teardown<A: Authenticator, S: Simulation>(client: &Client, state: &ServerState<A, S>) {
    state.clients.unregister(client, state.rooms.as_ref()).await;
    client.sink().close().await;
    metrics::counter!("gamechannel_disconnections_total").increment(1);
    tracing::info!(peer = %client.addr(), "client disconnected");
}

/// Serves one registered client until its stream ends or fails.
pub(crate) async fn handle_connection<A, S, R>(
    client: Arc<Client>,
    mut reader: R,
    state: Arc<ServerState<A, S>>,
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
    R: AsyncBufRead + Unpin + Send,
{
    let guard = ConnectionGuard {
        client: Arc::clone(&client),
        state: Arc::clone(&state),
        done: false,
    };

    let result = serve(&client, &mut reader, &state).await;
    guard.finish().await;
    result
}

async fn serve<A, S, R>(
    client: &Arc<Client>,
    reader: &mut R,
    state: &ServerState<A, S>,
) -> Result<(), ChannelError>
where
    A: Authenticator,
    S: Simulation,
    R: AsyncBufRead + Unpin + Send,
{
    let peer = client.addr();

    loop {
        let next = state.framer.next_frame(reader);
        let read = match state.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, next).await {
                Ok(read) => read,
                Err(_) => {
                    tracing::info!(%peer, "connection idle, closing");
                    return Ok(());
                }
            },
            None => next.await,
        };

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(%peer, "connection closed by peer");
                return Ok(());
            }
            Err(e) => {
                reject(client, state, &e).await;
                return Err(e.into());
            }
        };

        match frame {
            Frame::Keepalive => client.sink().send(&[KEEPALIVE_MARKER]).await?,
            Frame::Skipped { byte, preview } => {
                tracing::warn!(
                    %peer,
                    byte = %format!("0x{byte:02X}"),
                    %preview,
                    "skipping non-JSON byte"
                );
            }
            Frame::Message(raw) => {
                metrics::counter!("gamechannel_bytes_read_total").increment(raw.len() as u64);
                route(state, client, &raw).await?;
            }
        }
    }
}

/// Tells the client why its connection is about to close, where the
/// stream is still writable.
async fn reject<A, S>(client: &Client, state: &ServerState<A, S>, err: &FrameError)
where
    A: Authenticator,
    S: Simulation,
{
    let peer = client.addr();
    match err {
        FrameError::TooLarge { .. } | FrameError::UnexpectedByte { .. } => {
            tracing::warn!(%peer, error = %err, "protocol violation, closing");
        }
        FrameError::Io(_) | FrameError::UnexpectedEof { .. } => {
            tracing::debug!(%peer, error = %err, "read failed");
            return;
        }
    }

    let Ok(line) = state.codec.encode_line(&ServerMessage::error(err.to_string())) else {
        return;
    };
    if let Err(e) = client.sink().send(&line).await {
        tracing::debug!(%peer, error = %e, "could not send error before closing");
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use gamechannel_protocol::{Framer, JsonCodec, RoomId};
    use gamechannel_room::DampedMotion;
    use gamechannel_session::NonEmptyCredentials;
    use gamechannel_transport::ConnectionSink;
    use tokio::io::AsyncReadExt;

    use super::*;

    fn state() -> Arc<ServerState<NonEmptyCredentials, DampedMotion>> {
        Arc::new(ServerState {
            clients: Arc::default(),
            rooms: Arc::default(),
            auth: NonEmptyCredentials,
            sim: DampedMotion::default(),
            codec: JsonCodec,
            framer: Framer::default(),
            idle_timeout: None,
        })
    }

    #[tokio::test]
    async fn test_interrupted_teardown_still_closes_sink() {
        let state = state();
        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        let (ours, mut theirs) = tokio::io::duplex(4);
        let sink = ConnectionSink::new(addr, ours, Some(Duration::from_millis(300)));
        let client = Arc::new(Client::new(sink));
        state.clients.register(Arc::clone(&client)).await;
        state.rooms.join(&client, RoomId(4)).await;

        // Holds the writer until its timeout fires, so close has to wait.
        let stalled = tokio::spawn({
            let sink = client.sink().clone();
            async move { sink.send(b"stalled write").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let guard = ConnectionGuard {
            client: Arc::clone(&client),
            state: Arc::clone(&state),
            done: false,
        };
        let interrupted = tokio::time::timeout(Duration::from_millis(50), guard.finish()).await;
        assert!(interrupted.is_err());

        assert!(stalled.await.unwrap().is_err());
        let mut got = Vec::new();
        tokio::time::timeout(Duration::from_secs(1), theirs.read_to_end(&mut got))
            .await
            .expect("writer should be shut down")
            .unwrap();
        assert_eq!(got, b"stal");
        assert!(state.clients.lookup(&addr).await.is_none());
        assert!(!state.rooms.contains_room(RoomId(4)).await);
    }
}
