// Espresso Sense Core - Rust shot timer engine
// Accelerometer vibration detection, calibration and shot timing

// Module declarations
pub mod api;
pub mod calibration;
pub mod config;
pub mod debug;
pub mod detection;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod http;
pub mod sensitivity;
pub mod settings;
pub mod signal;
pub mod timer;
