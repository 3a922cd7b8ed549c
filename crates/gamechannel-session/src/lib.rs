//! Client tracking for gamechannel.
//!
//! 1. **Identity**: [`Authenticator`] turns login credentials into a
//!    player name.
//! 2. **Client records**: [`Client`] holds one connection's address,
//!    output sink, identity, and current room.
//! 3. **Registry**: [`ClientRegistry`] indexes every live client by
//!    connection address.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)      ← groups clients and broadcasts to them
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Transport + protocol (below) ← ConnectionSink, RoomId
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod client;
mod error;
mod registry;

pub use auth::{Authenticator, Credentials, NonEmptyCredentials};
pub use client::Client;
pub use error::SessionError;
pub use registry::{ClientRegistry, RoomMembership};
