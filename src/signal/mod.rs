// Signal module - accelerometer readings and the rolling deviation window
//
// Pipeline per reading:
// 1. magnitude = sqrt(x² + y² + z²)
// 2. push magnitude into the SignalBuffer (oldest evicted past capacity)
// 3. deviation = population standard deviation of the buffer
//
// The deviation is the vibration-energy signal consumed by calibration and
// shot detection. Gravity contributes a constant offset to the magnitude,
// which the standard deviation removes.

pub mod buffer;
pub mod sample;

pub use buffer::{SignalBuffer, DEFAULT_WINDOW};
pub use sample::AccelReading;
