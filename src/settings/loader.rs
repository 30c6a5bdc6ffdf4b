// Versioned settings loader
//
// Version 0 (no `settingsVersion` key) stored the sensitivity as one of
// "LOW" / "MEDIUM" / "HIGH". Version 1 stores the numeric level. Migration
// runs once, before any value is parsed.
//
// Every read failure degrades to the default for that key; nothing here can
// stop the engine from starting.

use serde::{Deserialize, Serialize};

use crate::debug::DebugLogger;
use crate::debug_log;
use crate::detection::params::{clamp_hysteresis, clamp_pre_infusion, DetectionParams};
use crate::error::{log_storage_error, StorageError};
use crate::sensitivity::SensitivityLevel;

use super::store::KeyValueStore;

/// Storage keys
pub mod keys {
    pub const DEBUG_MODE: &str = "debugMode";
    pub const LAST_SHOT_TIME: &str = "lastShotTime";
    pub const CALIBRATION_BASELINE: &str = "calibrationBaseline";
    pub const CALIBRATION_SENSITIVITY: &str = "calibrationSensitivity";
    pub const HYSTERESIS_LEVEL: &str = "hysteresisLevel";
    pub const PRE_INFUSION_DELAY: &str = "preInfusionDelay";
    pub const HAS_SEEN_ONBOARDING: &str = "hasSeenOnboarding";
    pub const IS_SUPPORTER: &str = "isSupporter";
    pub const SETTINGS_VERSION: &str = "settingsVersion";
}

pub const CURRENT_SETTINGS_VERSION: u32 = 1;

/// Baseline used until the first calibration completes
pub const DEFAULT_BASELINE: f64 = 0.05;

/// All persisted user settings, fully parsed and range-checked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub debug_mode: bool,
    pub last_shot_ms: Option<u64>,
    pub baseline: f64,
    pub sensitivity: SensitivityLevel,
    pub hysteresis: u32,
    pub pre_infusion_delay_ms: u64,
    pub has_seen_onboarding: bool,
    pub is_supporter: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            last_shot_ms: None,
            baseline: DEFAULT_BASELINE,
            sensitivity: SensitivityLevel::FRESH_INSTALL,
            hysteresis: DetectionParams::HYSTERESIS_DEFAULT,
            pre_infusion_delay_ms: 0,
            has_seen_onboarding: false,
            is_supporter: false,
        }
    }
}

impl Settings {
    /// Threshold implied by the stored baseline and sensitivity
    pub fn threshold(&self) -> f64 {
        crate::sensitivity::threshold(self.baseline, self.sensitivity)
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams::new(self.threshold(), self.hysteresis, self.pre_infusion_delay_ms)
    }
}

pub struct SettingsLoader<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    logger: DebugLogger,
}

impl<'a, S: KeyValueStore + ?Sized> SettingsLoader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            logger: DebugLogger::default(),
        }
    }

    /// Route migration diagnostics through `logger`.
    pub fn with_logger(mut self, logger: DebugLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Migrate if needed, then read every setting.
    pub fn load(&self) -> Settings {
        if let Err(err) = self.migrate() {
            log_storage_error(&err, "settings migration");
        }

        let defaults = Settings::default();
        Settings {
            debug_mode: self.read_bool(keys::DEBUG_MODE, defaults.debug_mode),
            last_shot_ms: self.read_last_shot(),
            baseline: self.read_baseline(defaults.baseline),
            sensitivity: self.read_sensitivity(defaults.sensitivity),
            hysteresis: self
                .read_int(keys::HYSTERESIS_LEVEL)
                .map(|v| clamp_hysteresis(v.clamp(0, u32::MAX as i64) as u32))
                .unwrap_or(defaults.hysteresis),
            pre_infusion_delay_ms: self
                .read_int(keys::PRE_INFUSION_DELAY)
                .map(|v| clamp_pre_infusion(v.max(0) as u64))
                .unwrap_or(defaults.pre_infusion_delay_ms),
            has_seen_onboarding: self.read_bool(keys::HAS_SEEN_ONBOARDING, false),
            is_supporter: self.read_bool(keys::IS_SUPPORTER, false),
        }
    }

    /// Stored schema version; a missing key means a legacy (v0) install.
    pub fn version(&self) -> Result<u32, StorageError> {
        match self.store.get(keys::SETTINGS_VERSION)? {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| StorageError::InvalidValue {
                    key: keys::SETTINGS_VERSION.to_string(),
                    value: raw,
                }),
        }
    }

    /// Bring the store up to [`CURRENT_SETTINGS_VERSION`].
    ///
    /// Returns the version the store was at before migrating.
    pub fn migrate(&self) -> Result<u32, StorageError> {
        let from = self.version().unwrap_or_else(|err| {
            log_storage_error(&err, "settings version");
            0
        });
        if from >= CURRENT_SETTINGS_VERSION {
            return Ok(from);
        }

        if let Some(raw) = self.store.get(keys::CALIBRATION_SENSITIVITY)? {
            if let Some(level) = SensitivityLevel::from_legacy(&raw) {
                debug_log!(
                    self.logger,
                    "[SettingsLoader] Migrating sensitivity {} -> {}",
                    raw,
                    level.get()
                );
                self.store
                    .set(keys::CALIBRATION_SENSITIVITY, &level.get().to_string())?;
            }
        }

        self.store.set(
            keys::SETTINGS_VERSION,
            &CURRENT_SETTINGS_VERSION.to_string(),
        )?;
        debug_log!(
            self.logger,
            "[SettingsLoader] Settings migrated v{} -> v{}",
            from,
            CURRENT_SETTINGS_VERSION
        );
        Ok(from)
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                log_storage_error(&err, key);
                None
            }
        }
    }

    fn invalid(&self, key: &str, value: &str) {
        let err = StorageError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        log_storage_error(&err, "settings load");
    }

    fn read_bool(&self, key: &str, default: bool) -> bool {
        match self.read_raw(key) {
            None => default,
            Some(raw) => match raw.trim() {
                "true" => true,
                "false" => false,
                _ => {
                    self.invalid(key, &raw);
                    default
                }
            },
        }
    }

    /// Integer setting; accepts a float representation and rounds it.
    fn read_int(&self, key: &str) -> Option<i64> {
        let raw = self.read_raw(key)?;
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value.round() as i64),
            _ => {
                self.invalid(key, &raw);
                None
            }
        }
    }

    fn read_last_shot(&self) -> Option<u64> {
        self.read_int(keys::LAST_SHOT_TIME).map(|v| v.max(0) as u64)
    }

    fn read_baseline(&self, default: f64) -> f64 {
        let Some(raw) = self.read_raw(keys::CALIBRATION_BASELINE) else {
            return default;
        };
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => value,
            _ => {
                self.invalid(keys::CALIBRATION_BASELINE, &raw);
                default
            }
        }
    }

    fn read_sensitivity(&self, default: SensitivityLevel) -> SensitivityLevel {
        let Some(raw) = self.read_raw(keys::CALIBRATION_SENSITIVITY) else {
            return default;
        };
        if let Ok(value) = raw.trim().parse::<f64>() {
            if value.is_finite() {
                return SensitivityLevel::clamped(value.round() as i32);
            }
        }
        // A failed migration write can leave a legacy value behind.
        SensitivityLevel::from_legacy(&raw).unwrap_or_else(|| {
            self.invalid(keys::CALIBRATION_SENSITIVITY, &raw);
            default
        })
    }
}
