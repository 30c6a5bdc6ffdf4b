// Calibration error types and constants

use crate::error::ErrorCode;
use flutter_rust_bridge::frb;
use log::error;
use std::fmt;

/// Calibration error code constants exposed to Dart via FFI
///
/// Error code range: 2001-2003
#[frb(unignore)]
pub struct CalibrationErrorCodes {}

#[frb]
impl CalibrationErrorCodes {
    /// Calibration window closed without a single deviation sample
    pub const EMPTY_SESSION: i32 = 2001;

    /// Operation requires an active calibration session
    pub const NOT_CALIBRATING: i32 = 2002;

    /// Session already produced a baseline and is only being displayed
    pub const ALREADY_FINISHED: i32 = 2003;

    /// Get EMPTY_SESSION error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn empty_session() -> i32 {
        Self::EMPTY_SESSION
    }

    /// Get NOT_CALIBRATING error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn not_calibrating() -> i32 {
        Self::NOT_CALIBRATING
    }

    /// Get ALREADY_FINISHED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn already_finished() -> i32 {
        Self::ALREADY_FINISHED
    }
}

/// Log a calibration error with structured context
///
/// Calibration errors are always recoverable, so this is the only place they
/// surface: the session aborts and the detector resumes after its cooldown.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=Calibrator, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// Error code range: 2001-2003
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// The collection window closed with no deviation samples
    EmptySession { window_ms: u64 },

    /// `finish` was called while no session was collecting
    NotCalibrating,

    /// `finish` was called during the result display hold
    AlreadyFinished,
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::EmptySession { .. } => CalibrationErrorCodes::EMPTY_SESSION,
            CalibrationError::NotCalibrating => CalibrationErrorCodes::NOT_CALIBRATING,
            CalibrationError::AlreadyFinished => CalibrationErrorCodes::ALREADY_FINISHED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::EmptySession { window_ms } => {
                format!("No vibration samples collected in {} ms window", window_ms)
            }
            CalibrationError::NotCalibrating => "Calibration not in progress".to_string(),
            CalibrationError::AlreadyFinished => "Calibration already finished".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::EmptySession { window_ms: 5000 }.code(),
            CalibrationErrorCodes::EMPTY_SESSION
        );
        assert_eq!(
            CalibrationError::NotCalibrating.code(),
            CalibrationErrorCodes::NOT_CALIBRATING
        );
        assert_eq!(
            CalibrationError::AlreadyFinished.code(),
            CalibrationErrorCodes::ALREADY_FINISHED
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::EmptySession { window_ms: 5000 };
        assert_eq!(
            err.message(),
            "No vibration samples collected in 5000 ms window"
        );
        assert!(CalibrationError::NotCalibrating
            .message()
            .contains("not in progress"));
        assert!(CalibrationError::AlreadyFinished
            .message()
            .contains("already finished"));
    }

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::NotCalibrating;
        let display = format!("{}", err);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_error_code_getters() {
        assert_eq!(CalibrationErrorCodes::empty_session(), 2001);
        assert_eq!(CalibrationErrorCodes::not_calibrating(), 2002);
        assert_eq!(CalibrationErrorCodes::already_finished(), 2003);
    }
}
