// Error types for the espresso shot timer core
//
// This module defines custom error types for engine, calibration and settings
// operations, providing structured error handling with error codes suitable
// for FFI communication.
//
// None of these errors are fatal: every failure path in the core degrades to
// "no detection" rather than a crash.

mod calibration;
mod engine;
mod storage;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use engine::{log_engine_error, EngineError, EngineErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
