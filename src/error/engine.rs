// Engine error types and constants

use crate::error::ErrorCode;
use flutter_rust_bridge::frb;
use log::error;
use std::fmt;

/// Engine error code constants exposed to Dart via FFI
///
/// Error code range: 1001-1004
#[frb(unignore)]
pub struct EngineErrorCodes {}

#[frb]
impl EngineErrorCodes {
    /// Detection engine is already running
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Detection engine is not running
    pub const NOT_RUNNING: i32 = 1002;

    /// Command channel to the engine worker is closed
    pub const CHANNEL_CLOSED: i32 = 1003;

    /// Accelerometer feed could not be subscribed
    pub const SENSOR_UNAVAILABLE: i32 = 1004;

    /// Get ALREADY_RUNNING error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn already_running() -> i32 {
        Self::ALREADY_RUNNING
    }

    /// Get NOT_RUNNING error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn not_running() -> i32 {
        Self::NOT_RUNNING
    }

    /// Get CHANNEL_CLOSED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn channel_closed() -> i32 {
        Self::CHANNEL_CLOSED
    }

    /// Get SENSOR_UNAVAILABLE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn sensor_unavailable() -> i32 {
        Self::SENSOR_UNAVAILABLE
    }
}

/// Log an engine error with the component and context it occurred in.
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, component=EngineHandle, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the detection engine lifecycle.
///
/// Sensor read failures are deliberately absent: a feed that produces no
/// samples simply leaves the state machine where it is.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Detection engine is already running
    AlreadyRunning,

    /// Detection engine is not running
    NotRunning,

    /// Command channel to the engine worker is closed
    ChannelClosed { command: String },

    /// Accelerometer feed could not be subscribed
    SensorUnavailable { reason: String },
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::AlreadyRunning => EngineErrorCodes::ALREADY_RUNNING,
            EngineError::NotRunning => EngineErrorCodes::NOT_RUNNING,
            EngineError::ChannelClosed { .. } => EngineErrorCodes::CHANNEL_CLOSED,
            EngineError::SensorUnavailable { .. } => EngineErrorCodes::SENSOR_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::AlreadyRunning => {
                "Detection engine already running. Call shutdown() first.".to_string()
            }
            EngineError::NotRunning => {
                "Detection engine not running. Call init_engine() first.".to_string()
            }
            EngineError::ChannelClosed { command } => {
                format!("Engine worker stopped before accepting {}", command)
            }
            EngineError::SensorUnavailable { reason } => {
                format!("Accelerometer unavailable: {}", reason)
            }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EngineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(
            EngineError::AlreadyRunning.code(),
            EngineErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(EngineError::NotRunning.code(), EngineErrorCodes::NOT_RUNNING);
        assert_eq!(
            EngineError::ChannelClosed {
                command: "Reset".to_string()
            }
            .code(),
            EngineErrorCodes::CHANNEL_CLOSED
        );
        assert_eq!(
            EngineError::SensorUnavailable {
                reason: "test".to_string()
            }
            .code(),
            EngineErrorCodes::SENSOR_UNAVAILABLE
        );
    }

    #[test]
    fn test_engine_error_messages() {
        assert!(EngineError::AlreadyRunning
            .message()
            .contains("already running"));
        assert!(EngineError::NotRunning.message().contains("not running"));

        let err = EngineError::ChannelClosed {
            command: "StartTimer".to_string(),
        };
        assert_eq!(
            err.message(),
            "Engine worker stopped before accepting StartTimer"
        );

        let err = EngineError::SensorUnavailable {
            reason: "no accelerometer".to_string(),
        };
        assert_eq!(err.message(), "Accelerometer unavailable: no accelerometer");
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::NotRunning;
        let display = format!("{}", err);
        assert!(display.contains("EngineError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_error_code_getters() {
        assert_eq!(EngineErrorCodes::already_running(), 1001);
        assert_eq!(EngineErrorCodes::not_running(), 1002);
        assert_eq!(EngineErrorCodes::channel_closed(), 1003);
        assert_eq!(EngineErrorCodes::sensor_unavailable(), 1004);
    }
}
