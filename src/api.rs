// Public API for flutter_rust_bridge integration
// This module provides FFI functions for Flutter to drive the shot timer engine

#![allow(dead_code)] // FFI functions are called from Dart, not detected by Rust analyzer

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::config::AppConfig;
use crate::engine::{
    BridgeSensorFeed, EngineHandle, SensorFeed, ShotSnapshot, SystemTimeSource, TimeSource,
};
use crate::error::{log_engine_error, log_storage_error, EngineError};
use crate::settings::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::signal::AccelReading;

mod streams;

pub use streams::{event_stream, snapshot_stream};

// Re-export error code constants for FFI exposure
pub use crate::error::{CalibrationErrorCodes, EngineErrorCodes, StorageErrorCodes};

/// Accelerometer feed the host app pushes readings into.
static SENSOR_FEED: Lazy<Arc<BridgeSensorFeed>> = Lazy::new(|| Arc::new(BridgeSensorFeed::new()));

/// The running engine, if `init_engine` has been called.
static ENGINE: Lazy<RwLock<Option<Arc<EngineHandle>>>> = Lazy::new(|| RwLock::new(None));

fn with_engine<T>(f: impl FnOnce(&EngineHandle) -> Result<T, EngineError>) -> Result<T, EngineError> {
    let guard = ENGINE.read().map_err(|_| EngineError::NotRunning)?;
    match guard.as_ref() {
        Some(engine) => f(engine.as_ref()),
        None => Err(EngineError::NotRunning),
    }
}

fn load_platform_config() -> AppConfig {
    #[cfg(target_os = "android")]
    {
        AppConfig::load_android()
    }

    #[cfg(not(target_os = "android"))]
    {
        AppConfig::load()
    }
}

fn open_store(settings_path: &str) -> Arc<dyn KeyValueStore> {
    if settings_path.is_empty() {
        return Arc::new(MemoryStore::new());
    }
    match JsonFileStore::open(PathBuf::from(settings_path)) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            // Detection still works; settings just will not survive a restart.
            log_storage_error(&err, "open settings file");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Get the version of the shot timer core
#[flutter_rust_bridge::frb(sync)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Start the detection engine
///
/// Loads persisted settings from the JSON file at `settings_path` (an empty
/// path keeps settings in memory only), subscribes the accelerometer feed and
/// starts the worker.
///
/// # Errors
/// - `AlreadyRunning` if the engine was already initialised
/// - `SensorUnavailable` if the worker thread could not be started
#[flutter_rust_bridge::frb(sync)]
pub fn init_engine(settings_path: String) -> Result<(), EngineError> {
    crate::debug::init_logging();

    let mut guard = ENGINE.write().map_err(|_| EngineError::NotRunning)?;
    if guard.is_some() {
        return Err(EngineError::AlreadyRunning);
    }

    let store = open_store(&settings_path);
    let feed: Arc<dyn SensorFeed> = SENSOR_FEED.clone();
    let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource::default());
    let engine = EngineHandle::start(load_platform_config(), store, feed, clock)
        .map_err(|err| {
            log_engine_error(&err, "init_engine");
            err
        })?;

    let engine = Arc::new(engine);
    crate::http::spawn_if_enabled(Arc::clone(&engine));
    *guard = Some(engine);
    Ok(())
}

/// Stop the engine and release the accelerometer. Safe to call when not
/// running.
#[flutter_rust_bridge::frb(sync)]
pub fn shutdown_engine() {
    let engine = match ENGINE.write() {
        Ok(mut guard) => guard.take(),
        Err(_) => None,
    };
    if let Some(engine) = engine {
        engine.shutdown();
    }
}

/// Latest state for the UI (status, elapsed time, live deviation, settings)
#[flutter_rust_bridge::frb(sync)]
pub fn get_snapshot() -> Result<ShotSnapshot, EngineError> {
    with_engine(|engine| Ok(engine.snapshot()))
}

/// Push one accelerometer sample (in g) from the platform sensor
///
/// Returns false when the engine is not listening (not initialised or the
/// app is in the background); the sample is dropped.
#[flutter_rust_bridge::frb(sync)]
pub fn push_accelerometer_reading(x: f64, y: f64, z: f64) -> bool {
    SENSOR_FEED.push(AccelReading::new(x, y, z))
}

/// Start the shot timer by hand
#[flutter_rust_bridge::frb(sync)]
pub fn start_timer() -> Result<(), EngineError> {
    with_engine(|engine| engine.start_timer())
}

/// Stop the shot timer by hand
#[flutter_rust_bridge::frb(sync)]
pub fn stop_timer() -> Result<(), EngineError> {
    with_engine(|engine| engine.stop_timer())
}

/// Return the timer to idle; the last shot duration is kept
#[flutter_rust_bridge::frb(sync)]
pub fn reset_timer() -> Result<(), EngineError> {
    with_engine(|engine| engine.reset_timer())
}

/// Begin a 5 second calibration while the machine runs
#[flutter_rust_bridge::frb(sync)]
pub fn calibrate() -> Result<(), EngineError> {
    with_engine(|engine| engine.calibrate())
}

/// Abandon a running calibration, or dismiss a finished one
#[flutter_rust_bridge::frb(sync)]
pub fn cancel_calibration() -> Result<(), EngineError> {
    with_engine(|engine| engine.cancel_calibration())
}

/// Set sensitivity (1 = least sensitive, 20 = most); clamped
#[flutter_rust_bridge::frb(sync)]
pub fn set_sensitivity_level(level: i32) -> Result<(), EngineError> {
    with_engine(|engine| engine.set_sensitivity_level(level))
}

/// Set the stop hysteresis in percent of peak deviation (50..=95); clamped
#[flutter_rust_bridge::frb(sync)]
pub fn set_hysteresis(percent: u32) -> Result<(), EngineError> {
    with_engine(|engine| engine.set_hysteresis(percent))
}

/// Set the pre-infusion grace period in milliseconds (0..=15000); clamped
#[flutter_rust_bridge::frb(sync)]
pub fn set_pre_infusion_delay(delay_ms: u64) -> Result<(), EngineError> {
    with_engine(|engine| engine.set_pre_infusion_delay(delay_ms))
}

/// Toggle verbose debug logging; persisted
#[flutter_rust_bridge::frb(sync)]
pub fn set_debug_mode(enabled: bool) -> Result<(), EngineError> {
    with_engine(|engine| engine.set_debug_mode(enabled))
}

#[flutter_rust_bridge::frb(sync)]
pub fn has_seen_onboarding() -> Result<bool, EngineError> {
    with_engine(|engine| Ok(engine.has_seen_onboarding()))
}

#[flutter_rust_bridge::frb(sync)]
pub fn set_has_seen_onboarding(seen: bool) -> Result<(), EngineError> {
    with_engine(|engine| {
        engine.set_has_seen_onboarding(seen);
        Ok(())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn is_supporter() -> Result<bool, EngineError> {
    with_engine(|engine| Ok(engine.is_supporter()))
}

#[flutter_rust_bridge::frb(sync)]
pub fn set_is_supporter(supporter: bool) -> Result<(), EngineError> {
    with_engine(|engine| {
        engine.set_is_supporter(supporter);
        Ok(())
    })
}

/// App lifecycle: moved to the background
///
/// A running shot is stopped at this instant, calibration is cancelled and
/// the accelerometer is released.
#[flutter_rust_bridge::frb(sync)]
pub fn app_backgrounded() -> Result<(), EngineError> {
    with_engine(|engine| engine.suspend())
}

/// App lifecycle: returned to the foreground; re-subscribes the accelerometer
#[flutter_rust_bridge::frb(sync)]
pub fn app_foregrounded() -> Result<(), EngineError> {
    with_engine(|engine| engine.resume())
}

// Error code constant accessors for Dart/Flutter

/// Get EngineErrorCodes as a structured object with all error code constants
#[flutter_rust_bridge::frb(sync)]
pub fn get_engine_error_codes() -> EngineErrorCodes {
    EngineErrorCodes {}
}

/// Get CalibrationErrorCodes as a structured object with all error code constants
#[flutter_rust_bridge::frb(sync)]
pub fn get_calibration_error_codes() -> CalibrationErrorCodes {
    CalibrationErrorCodes {}
}

/// Get StorageErrorCodes as a structured object with all error code constants
#[flutter_rust_bridge::frb(sync)]
pub fn get_storage_error_codes() -> StorageErrorCodes {
    StorageErrorCodes {}
}

#[cfg(test)]
mod tests;
