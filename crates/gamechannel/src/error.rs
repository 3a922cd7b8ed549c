//! Unified error type for gamechannel.

use std::path::PathBuf;

use gamechannel_protocol::{FrameError, ProtocolError};
use gamechannel_session::SessionError;
use gamechannel_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors
/// automatically. Inside a connection handler, any of these ends that
/// connection only; decode problems never get here because the router
/// answers them in-band.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// A transport-level error (accept, send, write timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An encode or decode failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The byte stream could not be framed (size limit, strict policy,
    /// read failure, truncated message).
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Startup configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading channel configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid channel file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration yielded an empty channel list.
    #[error("no channels configured")]
    NoChannels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let addr = "127.0.0.1:9090".parse().unwrap();
        let err: ChannelError = TransportError::ConnectionClosed(addr).into();
        assert!(matches!(err, ChannelError::Transport(_)));
        assert!(err.to_string().contains("127.0.0.1:9090"));
    }

    #[test]
    fn test_from_frame_error() {
        let err: ChannelError = FrameError::TooLarge { limit: 16 }.into();
        assert!(matches!(err, ChannelError::Frame(_)));
        assert_eq!(err.to_string(), "message exceeds 16 bytes");
    }

    #[test]
    fn test_from_session_error() {
        let err: ChannelError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(err, ChannelError::Session(_)));
    }

    #[test]
    fn test_config_io_error_names_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/etc/channels.json"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to read /etc/channels.json"));
        let err: ChannelError = err.into();
        assert!(matches!(err, ChannelError::Config(_)));
    }
}
