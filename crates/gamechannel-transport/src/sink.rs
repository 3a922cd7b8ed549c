//! The output half of a connection.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::TransportError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A cloneable handle for writing bytes to one peer.
///
/// This is all a client record gets from its connection: the peer
/// address and the ability to write. The read half stays with the
/// connection handler. Clones share the same writer, so writes from the
/// owning handler and from broadcasts on other tasks are serialized and
/// never interleave within a message.
#[derive(Clone)]
pub struct ConnectionSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    peer: SocketAddr,
    /// `None` once [`close`](ConnectionSink::close) has shut it down.
    writer: Mutex<Option<BoxedWriter>>,
    closed: AtomicBool,
    write_timeout: Option<Duration>,
}

impl ConnectionSink {
    /// Wraps a writer bound to `peer`.
    ///
    /// When `write_timeout` is set, each [`send`](Self::send) (including
    /// waiting for the writer lock) must finish within it. A send that
    /// times out closes the sink.
    pub fn new<W>(peer: SocketAddr, writer: W, write_timeout: Option<Duration>) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(SinkInner {
                peer,
                writer: Mutex::new(Some(Box::new(writer))),
                closed: AtomicBool::new(false),
                write_timeout,
            }),
        }
    }

    /// The remote address this sink writes to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Returns `true` once the sink was closed or a write failed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Writes `data` and flushes it.
    ///
    /// Any failure marks the sink closed; later sends fail fast with
    /// [`TransportError::ConnectionClosed`].
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let peer = self.inner.peer;
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed(peer));
        }

        let write = async {
            let mut guard = self.inner.writer.lock().await;
            // A queued sender must not write after a torn message.
            let writer = match guard.as_mut() {
                Some(writer) if !self.is_closed() => writer,
                _ => return Err(TransportError::ConnectionClosed(peer)),
            };
            writer.write_all(data).await.map_err(TransportError::SendFailed)?;
            writer.flush().await.map_err(TransportError::SendFailed)
        };

        let result = match self.inner.write_timeout {
            Some(limit) => tokio::time::timeout(limit, write)
                .await
                .unwrap_or(Err(TransportError::WriteTimeout(peer))),
            None => write.await,
        };

        match &result {
            Ok(()) => {
                metrics::counter!("gamechannel_bytes_written_total")
                    .increment(data.len() as u64);
            }
            Err(e) => {
                tracing::debug!(%peer, error = %e, "write failed, closing sink");
                self.inner.closed.store(true, Ordering::Release);
            }
        }
        result
    }

    /// Marks the sink closed and shuts down the underlying writer.
    ///
    /// Safe to call more than once. The writer is shut down by whichever
    /// call gets hold of it first; later calls find it gone and return.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let Some(mut writer) = self.inner.writer.lock().await.take() else {
            return;
        };
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(peer = %self.inner.peer, error = %e, "shutdown failed");
        }
    }
}

impl std::fmt::Debug for ConnectionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSink")
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn addr() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (ours, mut theirs) = tokio::io::duplex(64);
        let sink = ConnectionSink::new(addr(), ours, None);

        sink.send(b"hello").await.expect("send");

        let mut buf = [0u8; 5];
        theirs.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(sink.peer_addr(), addr());
    }

    #[tokio::test]
    async fn test_clones_share_writer() {
        let (ours, mut theirs) = tokio::io::duplex(64);
        let sink = ConnectionSink::new(addr(), ours, None);
        let other = sink.clone();

        sink.send(b"ab").await.unwrap();
        other.send(b"cd").await.unwrap();

        let mut buf = [0u8; 4];
        theirs.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (ours, _theirs) = tokio::io::duplex(64);
        let sink = ConnectionSink::new(addr(), ours, None);

        sink.close().await;
        sink.close().await;

        assert!(sink.is_closed());
        let err = sink.send(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_close_waits_for_in_flight_write() {
        let (ours, mut theirs) = tokio::io::duplex(4);
        let sink = ConnectionSink::new(addr(), ours, Some(Duration::from_millis(100)));

        let stalled = tokio::spawn({
            let sink = sink.clone();
            async move { sink.send(b"stalled write").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // An interrupted close leaves the writer for the next one.
        let interrupted = tokio::time::timeout(Duration::from_millis(20), sink.close()).await;
        assert!(interrupted.is_err());
        assert!(sink.is_closed());
        sink.close().await;

        assert!(stalled.await.unwrap().is_err());
        let mut got = Vec::new();
        tokio::time::timeout(Duration::from_secs(1), theirs.read_to_end(&mut got))
            .await
            .expect("writer should be shut down")
            .unwrap();
        assert_eq!(got, b"stal");
    }

    #[tokio::test]
    async fn test_stalled_peer_times_out_and_closes() {
        // Peer never reads, so the 4-byte pipe fills up.
        let (ours, _theirs) = tokio::io::duplex(4);
        let sink =
            ConnectionSink::new(addr(), ours, Some(Duration::from_millis(50)));

        let err = sink.send(b"more than four bytes").await.unwrap_err();
        assert!(matches!(err, TransportError::WriteTimeout(_)));
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_queued_send_after_timeout_is_rejected() {
        let (ours, mut theirs) = tokio::io::duplex(4);
        let sink = ConnectionSink::new(addr(), ours, Some(Duration::from_millis(200)));
        let other = sink.clone();

        let first = tokio::spawn({
            let sink = sink.clone();
            async move { sink.send(b"AAAAAAAAAAAA").await }
        });
        // Let the first send take the writer and fill the pipe.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = tokio::spawn(async move { other.send(b"BB\n").await });

        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::WriteTimeout(_)));
        assert!(sink.is_closed());

        let mut got = Vec::new();
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_millis(100), theirs.read(&mut buf)).await;
        if let Ok(Ok(n)) = read {
            got.extend_from_slice(&buf[..n]);
        }

        let err = second.await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
        assert!(!got.contains(&b'B'), "peer received {got:?}");
    }

    #[tokio::test]
    async fn test_dropped_peer_fails_send() {
        let (ours, theirs) = tokio::io::duplex(64);
        let sink = ConnectionSink::new(addr(), ours, None);
        drop(theirs);

        assert!(sink.send(b"x").await.is_err());
        assert!(sink.is_closed());
    }
}
