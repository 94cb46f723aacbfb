//! Simulation settings, read from an optional JSON file.

use std::{fs, path::Path};

use anyhow::Context;
use bevy::prelude::Resource;
use flight_physics::ShipConfig;
use serde::{Deserialize, Serialize};

use crate::course::check_field_size;

/// Highest accepted simulation rate. Much above this the fixed step rounds
/// towards nothing.
pub const MAX_TICK_HZ: f64 = 10_000.0;

/// How the random asteroid field around the built-in course is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub asteroids: usize,
    /// Edge of the cube the asteroids are scattered in, m.
    pub size: f64,
    /// Radius around the start kept free of asteroids, m.
    pub clearance: f64,
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            asteroids: 40,
            size: 10_000.0,
            clearance: 300.0,
            seed: None,
        }
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed simulation rate, Hz.
    pub tick_hz: f64,
    /// Simulated time after which an unfinished run is stopped, s.
    pub max_seconds: f64,
    pub ship: ShipConfig,
    pub field: FieldConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60.0,
            max_seconds: 5400.0,
            ship: ShipConfig::default(),
            field: FieldConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SimConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("checking config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.tick_hz > 0.0 && self.tick_hz <= MAX_TICK_HZ,
            "tick_hz must be in (0, {MAX_TICK_HZ}], got {}",
            self.tick_hz
        );
        anyhow::ensure!(
            self.max_seconds > 0.0,
            "max_seconds must be positive, got {}",
            self.max_seconds
        );
        check_field_size(self.field.size).map_err(anyhow::Error::msg)?;
        Ok(())
    }

    pub fn tick_seconds(&self) -> f64 {
        1.0 / self.tick_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{ "ship": { "steering_force": 500 }, "field": { "seed": 3 } }"#)
                .unwrap();
        assert_eq!(config.tick_hz, 60.0);
        assert_eq!(config.ship.steering_force, 500.0);
        assert_eq!(config.ship.mass, 20_000.0);
        assert_eq!(config.field.seed, Some(3));
        assert_eq!(config.field.asteroids, 40);
    }

    fn load_text(name: &str, text: &str) -> anyhow::Result<SimConfig> {
        let path = std::env::temp_dir().join(format!("gaterace-{}-{name}.json", std::process::id()));
        fs::write(&path, text).unwrap();
        let config = SimConfig::load(&path);
        let _ = fs::remove_file(&path);
        config
    }

    #[test]
    fn rejects_zero_rate() {
        let err = load_text("rate", r#"{ "tick_hz": 0 }"#).unwrap_err();
        assert!(format!("{err:#}").contains("tick_hz"));
    }

    #[test]
    fn rejects_rate_too_fast_for_a_fixed_step() {
        let err = load_text("fast", r#"{ "tick_hz": 1e12 }"#).unwrap_err();
        assert!(format!("{err:#}").contains("tick_hz"));
        assert!(load_text("ok", r#"{ "tick_hz": 240 }"#).is_ok());
    }

    #[test]
    fn rejects_negative_field_size() {
        let err = load_text("field", r#"{ "field": { "size": -10 } }"#).unwrap_err();
        assert!(format!("{err:#}").contains("field size"));
    }

    #[test]
    fn validate_catches_nan_field_size() {
        let mut config = SimConfig::default();
        config.field.size = f64::NAN;
        assert!(config.validate().is_err());
        config.field.size = 0.0;
        assert!(config.validate().is_ok());
    }
}
