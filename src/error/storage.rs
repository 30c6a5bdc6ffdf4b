// Settings storage error types and constants

use crate::error::ErrorCode;
use flutter_rust_bridge::frb;
use log::error;
use std::fmt;

/// Storage error code constants exposed to Dart via FFI
///
/// Error code range: 3001-3004
#[frb(unignore)]
pub struct StorageErrorCodes {}

#[frb]
impl StorageErrorCodes {
    /// Backing file could not be read or written
    pub const IO: i32 = 3001;

    /// Backing file content is not a valid settings document
    pub const SERIALIZATION: i32 = 3002;

    /// A stored value could not be parsed into its expected type
    pub const INVALID_VALUE: i32 = 3003;

    /// In-process store lock was poisoned
    pub const LOCK_POISONED: i32 = 3004;

    /// Get IO error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn io() -> i32 {
        Self::IO
    }

    /// Get SERIALIZATION error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn serialization() -> i32 {
        Self::SERIALIZATION
    }

    /// Get INVALID_VALUE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn invalid_value() -> i32 {
        Self::INVALID_VALUE
    }

    /// Get LOCK_POISONED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn lock_poisoned() -> i32 {
        Self::LOCK_POISONED
    }
}

/// Log a persistence failure. The caller always continues with in-memory values.
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component=SettingsStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Settings persistence errors
///
/// Error code range: 3001-3004
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Backing file could not be read or written
    Io { details: String },

    /// Backing file content is not a valid settings document
    Serialization { details: String },

    /// A stored value could not be parsed into its expected type
    InvalidValue { key: String, value: String },

    /// In-process store lock was poisoned
    LockPoisoned,
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Io { .. } => StorageErrorCodes::IO,
            StorageError::Serialization { .. } => StorageErrorCodes::SERIALIZATION,
            StorageError::InvalidValue { .. } => StorageErrorCodes::INVALID_VALUE,
            StorageError::LockPoisoned => StorageErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Io { details } => format!("Settings I/O failed: {}", details),
            StorageError::Serialization { details } => {
                format!("Settings document malformed: {}", details)
            }
            StorageError::InvalidValue { key, value } => {
                format!("Invalid value {:?} for setting {}", value, key)
            }
            StorageError::LockPoisoned => "Settings store lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            details: err.to_string(),
        }
    }
}
