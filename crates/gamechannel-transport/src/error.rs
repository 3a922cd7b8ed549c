use std::net::SocketAddr;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed, or marked unusable after a failed write.
    #[error("connection to {0} closed")]
    ConnectionClosed(SocketAddr),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// A single write did not complete within the configured timeout.
    #[error("write to {0} timed out")]
    WriteTimeout(SocketAddr),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}
