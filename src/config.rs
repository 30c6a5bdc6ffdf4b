//! Configuration management for detector tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration on debounce windows and cooldowns without
//! recompilation. User-facing settings (sensitivity, hysteresis,
//! pre-infusion delay) are not part of this file; they live in the
//! persisted settings store.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// Shot detection timing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Deviation must stay above threshold this long before a start fires
    pub start_delay_ms: u64,
    /// Stop condition must hold this long before a stop fires
    pub stop_delay_ms: u64,
    /// Rolling window length (samples) used for the deviation estimate
    pub smoothing_window: usize,
    /// Sensor triggers ignored for this long after any stop
    pub stop_cooldown_ms: u64,
    /// Sensor triggers ignored for this long after a reset
    pub reset_cooldown_ms: u64,
    /// Emit a debug line every N samples
    pub log_every_n_samples: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 400,
            stop_delay_ms: 200,
            smoothing_window: 50,
            stop_cooldown_ms: 2000,
            reset_cooldown_ms: 1000,
            log_every_n_samples: 50,
        }
    }
}

/// Calibration session timing and result parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Length of the data collection window
    pub duration_ms: u64,
    /// How long the finished state stays visible before returning to idle
    pub display_hold_ms: u64,
    /// Sensor cooldown after a successful calibration (phone gets picked up)
    pub finish_cooldown_ms: u64,
    /// Sensor cooldown after cancel or an empty session
    pub cancel_cooldown_ms: u64,
    /// Lower bound for the learned baseline
    pub baseline_floor: f64,
    /// Sensitivity level applied after calibration
    pub default_sensitivity: i32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 5000,
            display_hold_ms: 3000,
            finish_cooldown_ms: 2000,
            cancel_cooldown_ms: 1000,
            baseline_floor: 0.01,
            default_sensitivity: 12,
        }
    }
}

/// Accelerometer feed and engine loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Requested accelerometer update interval
    pub update_interval_ms: u64,
    /// Interval of the engine tick that drives time-based transitions
    pub tick_interval_ms: u64,
    /// Minimum spacing of sample-triggered snapshot updates (~15 fps)
    pub snapshot_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 20,
            tick_interval_ms: 100,
            snapshot_interval_ms: 66,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing sections fall back to their defaults; a missing or unreadable
    /// file yields the full default configuration.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration for Android builds
    ///
    /// Flutter assets are only reachable through the AssetManager, so the
    /// bundled defaults are used on device.
    #[cfg(target_os = "android")]
    pub fn load_android() -> Self {
        log::info!("[Config] Using default configuration on Android");
        Self::default()
    }

    /// Load configuration for non-Android platforms
    #[cfg(not(target_os = "android"))]
    pub fn load() -> Self {
        Self::load_from_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/assets/detector_config.json"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.detection.start_delay_ms, 400);
        assert_eq!(config.detection.stop_delay_ms, 200);
        assert_eq!(config.detection.smoothing_window, 50);
        assert_eq!(config.calibration.duration_ms, 5000);
        assert_eq!(config.calibration.default_sensitivity, 12);
        assert_eq!(config.sensor.update_interval_ms, 20);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            parsed.detection.stop_cooldown_ms,
            config.detection.stop_cooldown_ms
        );
        assert_eq!(
            parsed.calibration.baseline_floor,
            config.calibration.baseline_floor
        );
    }

    #[test]
    fn test_partial_json_uses_section_defaults() {
        let json = r#"{"sensor": {"update_interval_ms": 10, "tick_interval_ms": 50, "snapshot_interval_ms": 33}}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.sensor.update_interval_ms, 10);
        assert_eq!(parsed.detection.start_delay_ms, 400);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/detector_config.json");
        assert_eq!(config.calibration.display_hold_ms, 3000);
    }

    #[cfg(not(target_os = "android"))]
    #[test]
    fn test_bundled_asset_matches_defaults() {
        let config = AppConfig::load();
        assert_eq!(config.detection.start_delay_ms, 400);
        assert_eq!(config.calibration.finish_cooldown_ms, 2000);
    }
}
