//! Error types for the session layer.

/// Errors that can occur while establishing a player's identity.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication failed: the credentials were missing or rejected
    /// by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),
}
