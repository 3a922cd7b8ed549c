//! The hook that turns a move request into a position.
//!
//! There is no physics here. [`DampedMotion`] scales the requested
//! direction by a constant and nothing else: no collision, no memory of
//! previous positions. Swap in another [`Simulation`] to get real
//! movement without touching the router.

use gamechannel_protocol::Vec3;

/// Damping factor used by [`DampedMotion::default`].
pub const DEFAULT_DAMPING: f32 = 0.1;

/// Computes a player's new position from a requested direction.
pub trait Simulation: Send + Sync + 'static {
    fn advance(&self, player: &str, direction: Vec3) -> Vec3;
}

/// `position = direction × factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampedMotion {
    pub factor: f32,
}

impl Default for DampedMotion {
    fn default() -> Self {
        Self {
            factor: DEFAULT_DAMPING,
        }
    }
}

impl Simulation for DampedMotion {
    fn advance(&self, _player: &str, direction: Vec3) -> Vec3 {
        direction * self.factor
    }
}
