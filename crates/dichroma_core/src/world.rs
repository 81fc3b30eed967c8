//! # World State
//!
//! The game runs two mutually-exclusive physical worlds over one scene
//! graph. Exactly one of them is "solid" at any instant; every world-owned
//! entity is only solid and visible while its owner world is the solid one.

use serde::{Deserialize, Serialize};

/// One of the two global solidity/visibility regimes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldState {
    /// The black world.
    Black,
    /// The white world. While solid, the camera view is flipped.
    White,
}

impl WorldState {
    /// Returns the other world.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            WorldState::Black => WorldState::White,
            WorldState::White => WorldState::Black,
        }
    }

    /// Human-readable name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            WorldState::Black => "BLACK",
            WorldState::White => "WHITE",
        }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        WorldState::White
    }
}
