// Progress reporting for the calibration countdown

use serde::{Deserialize, Serialize};

/// Calibration status shown by the UI
///
/// `is_calibrating` stays true through the result display so the overlay
/// remains visible until the hold expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub is_calibrating: bool,
    /// Whole seconds left in the collection window, rounded up
    pub time_left_secs: u32,
    pub is_finished: bool,
}

impl CalibrationProgress {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn collecting(duration_ms: u64, elapsed_ms: u64) -> Self {
        Self {
            is_calibrating: true,
            time_left_secs: seconds_left(duration_ms, elapsed_ms),
            is_finished: false,
        }
    }

    pub fn finished() -> Self {
        Self {
            is_calibrating: true,
            time_left_secs: 0,
            is_finished: true,
        }
    }
}

/// `ceil((duration - elapsed) / 1000)`, never below zero.
pub fn seconds_left(duration_ms: u64, elapsed_ms: u64) -> u32 {
    let remaining = duration_ms.saturating_sub(elapsed_ms);
    remaining.div_ceil(1000) as u32
}
