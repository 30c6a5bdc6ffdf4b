// Calibration module - learns a machine's resting vibration baseline
//
// A session collects live deviation samples for a fixed window while
// sensor-driven decisions are held off, then reports the mean (floored) as
// the new baseline together with the post-calibration sensitivity level.

pub mod calibrator;
pub mod progress;

pub use calibrator::{CalibrationOutcome, CalibrationPhase, CalibrationResult, Calibrator};
pub use progress::CalibrationProgress;
