//! Engine settings
//!
//! Limits used to validate incoming snapshots, the prediction horizons and
//! the dropshot tile-break threshold. Persisted as JSON so a bot can ship a
//! tuned file next to its binary.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_HORIZON, MAX_HORIZON};
use crate::error::{EngineError, Result, SettingsError};

/// Engine limits and tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    // === Prediction ===
    /// Horizon of `predict_default` (seconds)
    pub default_horizon: f32,
    /// Longest horizon `predict_for_duration` accepts (seconds)
    pub max_horizon: f32,

    // === Snapshot validation ===
    /// Largest accepted |location| component
    pub max_position: f32,
    /// Largest accepted |velocity|
    pub max_speed: f32,
    /// Largest accepted |angular velocity|
    pub max_angular_speed: f32,

    // === Mode rules ===
    /// Impact speed along the surface normal that breaks a dropshot tile
    pub tile_break_speed: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_horizon: DEFAULT_HORIZON,
            max_horizon: MAX_HORIZON,

            max_position: 20_000.0,
            max_speed: 10_000.0,
            max_angular_speed: 100.0,

            tile_break_speed: 1000.0,
        }
    }
}

impl EngineSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> std::result::Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> std::result::Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a file, falling back to defaults if it doesn't exist
    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, SettingsError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let settings = Self::from_json(&json)?;
                log::info!("Loaded settings from {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}; using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::result::Result<(), SettingsError> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Reject settings the engine can't run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("default_horizon", self.default_horizon),
            ("max_horizon", self.max_horizon),
            ("max_position", self.max_position),
            ("max_speed", self.max_speed),
            ("max_angular_speed", self.max_angular_speed),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::InvalidSettings(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.default_horizon > self.max_horizon {
            return Err(EngineError::InvalidSettings(format!(
                "default_horizon {} exceeds max_horizon {}",
                self.default_horizon, self.max_horizon
            )));
        }
        if !(self.tile_break_speed.is_finite() && self.tile_break_speed >= 0.0) {
            return Err(EngineError::InvalidSettings(format!(
                "tile_break_speed must be non-negative, got {}",
                self.tile_break_speed
            )));
        }
        Ok(())
    }
}
