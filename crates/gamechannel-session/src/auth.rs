//! Authentication hook for login requests.
//!
//! The channel does not verify passwords itself. It calls an
//! [`Authenticator`] during login and uses whatever identity comes back.
//! [`NonEmptyCredentials`] is the stand-in until a real credential store
//! is plugged in.

use crate::SessionError;

/// Username and password as sent in a login request.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Validates login credentials and returns the player's identity.
///
/// # Example
///
/// ```rust
/// use gamechannel_session::{Authenticator, Credentials, SessionError};
///
/// /// Only lets in players from a fixed guest list.
/// struct GuestList(Vec<String>);
///
/// impl Authenticator for GuestList {
///     async fn authenticate(
///         &self,
///         creds: Credentials<'_>,
///     ) -> Result<String, SessionError> {
///         if self.0.iter().any(|g| g == creds.username) {
///             Ok(creds.username.to_string())
///         } else {
///             Err(SessionError::AuthFailed("not on the list".into()))
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the identity to assign to the client on success.
    fn authenticate(
        &self,
        creds: Credentials<'_>,
    ) -> impl std::future::Future<Output = Result<String, SessionError>> + Send;
}

/// Accepts any login whose username and password are both non-empty.
///
/// The identity is the username. There is no credential check beyond
/// that.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyCredentials;

impl Authenticator for NonEmptyCredentials {
    async fn authenticate(&self, creds: Credentials<'_>) -> Result<String, SessionError> {
        if creds.username.is_empty() || creds.password.is_empty() {
            return Err(SessionError::AuthFailed(
                "username or password is empty".into(),
            ));
        }
        Ok(creds.username.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_empty_credentials_accepted() {
        let id = NonEmptyCredentials
            .authenticate(Credentials {
                username: "alice",
                password: "x",
            })
            .await
            .unwrap();
        assert_eq!(id, "alice");
    }

    #[tokio::test]
    async fn test_empty_username_or_password_rejected() {
        for (username, password) in [("", "x"), ("alice", ""), ("", "")] {
            let err = NonEmptyCredentials
                .authenticate(Credentials { username, password })
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::AuthFailed(_)));
        }
    }
}
