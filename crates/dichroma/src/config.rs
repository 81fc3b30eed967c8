//! # Configuration
//!
//! One aggregate config loaded once at startup from TOML, with the shipped
//! tuning as defaults. Validation happens at load time: a config that
//! passes [`GameConfig::validate`] never causes a runtime fault later.

use std::path::Path;

use dichroma_core::WorldState;
use serde::{Deserialize, Serialize};

use crate::entities::PlateConfig;
use crate::error::ConfigError;
use crate::player::shift::ShiftConfig;
use crate::player::PlayerConfig;

/// Full engine configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// World that is solid when the level starts.
    pub start_world: WorldState,
    /// Simulation rate (ticks per second).
    pub tick_rate: u32,
    /// Player movement tuning.
    pub player: PlayerConfig,
    /// Shift maneuver tuning.
    pub shift: ShiftConfig,
    /// Pressure plate tuning (including the latch).
    pub plate: PlateConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_world: WorldState::White,
            tick_rate: 50,
            player: PlayerConfig::default(),
            shift: ShiftConfig::default(),
            plate: PlateConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parses a config from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every tunable against its legal range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: String) -> ConfigError {
            ConfigError::InvalidValue { field, reason }
        }

        if !(10..=240).contains(&self.tick_rate) {
            return Err(invalid(
                "tick_rate",
                format!("{} not in 10..=240", self.tick_rate),
            ));
        }
        if self.player.width <= 0.0 || self.player.height <= 0.0 {
            return Err(invalid(
                "player.width/height",
                format!("{}x{} must be positive", self.player.width, self.player.height),
            ));
        }
        if self.player.move_speed <= 0.0 {
            return Err(invalid(
                "player.move_speed",
                format!("{} must be positive", self.player.move_speed),
            ));
        }
        if !(0.0..=0.49).contains(&self.shift.max_overhang_fraction) {
            return Err(invalid(
                "shift.max_overhang_fraction",
                format!("{} not in 0.0..=0.49", self.shift.max_overhang_fraction),
            ));
        }
        if self.shift.support_rays < 3 {
            return Err(invalid(
                "shift.support_rays",
                format!("{} must be at least 3", self.shift.support_rays),
            ));
        }
        if self.shift.resolve_iterations < 1 {
            return Err(invalid(
                "shift.resolve_iterations",
                "must be at least 1".to_string(),
            ));
        }
        if self.shift.anim_duration <= 0.0 {
            return Err(invalid(
                "shift.anim_duration",
                format!("{} must be positive", self.shift.anim_duration),
            ));
        }
        if self.shift.failsafe_seconds <= self.shift.anim_duration * 2.0 {
            return Err(invalid(
                "shift.failsafe_seconds",
                format!(
                    "{} must exceed the full maneuver duration {}",
                    self.shift.failsafe_seconds,
                    self.shift.anim_duration * 2.0
                ),
            ));
        }
        if self.plate.sink_distance <= 0.0 {
            return Err(invalid(
                "plate.sink_distance",
                format!("{} must be positive", self.plate.sink_distance),
            ));
        }
        if self.plate.reactivation_retry_ticks < 1 {
            return Err(invalid(
                "plate.reactivation_retry_ticks",
                "must be at least 1".to_string(),
            ));
        }
        if self.plate.latch.clear_miss_frames < 1 {
            return Err(invalid(
                "plate.latch.clear_miss_frames",
                "must be at least 1".to_string(),
            ));
        }
        if self.plate.latch.heartbeat_interval <= 0.0 {
            return Err(invalid(
                "plate.latch.heartbeat_interval",
                format!("{} must be positive", self.plate.latch.heartbeat_interval),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        GameConfig::default().validate().expect("defaults must pass");
    }

    #[test]
    fn test_partial_toml_overlays_defaults() {
        let config = GameConfig::from_toml_str(
            r#"
            start_world = "Black"
            tick_rate = 60

            [shift]
            max_overhang_fraction = 0.3
            "#,
        )
        .expect("valid config");

        assert_eq!(config.start_world, WorldState::Black);
        assert_eq!(config.tick_rate, 60);
        assert!((config.shift.max_overhang_fraction - 0.3).abs() < 1e-6);
        // Untouched sections keep their defaults.
        assert_eq!(config.plate.latch.clear_miss_frames, 3);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let result = GameConfig::from_toml_str(
            r#"
            [shift]
            max_overhang_fraction = 0.75
            "#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field, .. }) if field == "shift.max_overhang_fraction"
        ));
    }

    #[test]
    fn test_garbage_toml_rejected() {
        assert!(matches!(
            GameConfig::from_toml_str("not [ valid"),
            Err(ConfigError::Parse(_))
        ));
    }
}
