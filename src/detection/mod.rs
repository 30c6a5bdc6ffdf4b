// Detection module - vibration-driven shot start/stop decisions
//
// The detector reads the live deviation signal and the parameter set, and
// tells the caller when to start or stop the timer. The sensor gate carries
// the suppression windows that follow stops, resets and calibration.

pub mod detector;
pub mod gate;
pub mod params;

pub use detector::{DetectorAction, ShotDetector};
pub use gate::SensorGate;
pub use params::DetectionParams;
