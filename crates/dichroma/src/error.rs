//! # Error Types
//!
//! All errors surfaced by the engine. Everything here is an initialization
//! or I/O problem; nothing in the per-tick simulation path returns errors.

use thiserror::Error;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not read the config file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the config schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its legal range.
    #[error("invalid config value for `{field}`: {reason}")]
    InvalidValue {
        /// The offending field, dotted path.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors wiring up an entity at spawn time.
///
/// These are configuration mistakes (a plate without a sensor region, a
/// degenerate collider), detected once at initialization. The simulation
/// refuses the entity and logs instead of faulting mid-game.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpawnError {
    /// A plate was specified without a usable sensor region.
    #[error("plate at ({x:.2}, {y:.2}) has no usable sensor region")]
    MissingSensor {
        /// Spawn x.
        x: f32,
        /// Spawn y.
        y: f32,
    },

    /// A collider dimension is zero or negative.
    #[error("degenerate collider size {width}x{height}")]
    DegenerateCollider {
        /// Requested width.
        width: f32,
        /// Requested height.
        height: f32,
    },
}

/// Errors in the level-unlock progress store.
#[derive(Error, Debug)]
pub enum ProgressError {
    /// Could not read or write the progress file.
    #[error("progress store I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The progress file is corrupt.
    #[error("progress store parse: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization failed (should not happen with this schema).
    #[error("progress store serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
}
