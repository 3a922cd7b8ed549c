//! Rooms for gamechannel.
//!
//! # Key types
//!
//! - [`RoomDirectory`]: room membership (join, leave) and fan-out
//!   delivery (broadcast)
//! - [`Simulation`]: the position hook used by move requests
//! - [`DampedMotion`]: the placeholder simulation

#![allow(async_fn_in_trait)]

mod directory;
mod simulation;

pub use directory::RoomDirectory;
pub use simulation::{DEFAULT_DAMPING, DampedMotion, Simulation};
