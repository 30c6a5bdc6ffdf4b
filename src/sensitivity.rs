// Sensitivity model - maps the user-facing level to a threshold multiplier
//
// Level 1 is the least sensitive (threshold = 1.5 × baseline), level 20 the
// most sensitive (threshold = 0.05 × baseline); levels in between are spaced
// linearly.

use serde::{Deserialize, Serialize};

/// Multiplier applied at level 1
pub const MAX_MULTIPLIER: f64 = 1.5;
/// Multiplier applied at level 20
pub const MIN_MULTIPLIER: f64 = 0.05;

/// Threshold multiplier for a sensitivity level.
///
/// Pure function of its input: levels outside [1, 20] are extrapolated, not
/// clamped. Use [`SensitivityLevel`] to obtain an in-range level.
pub fn multiplier(level: i32) -> f64 {
    let position = (level - SensitivityLevel::MIN) as f64
        / (SensitivityLevel::MAX - SensitivityLevel::MIN) as f64;
    MAX_MULTIPLIER - position * (MAX_MULTIPLIER - MIN_MULTIPLIER)
}

/// Trigger threshold derived from a baseline and a sensitivity level.
pub fn threshold(baseline: f64, level: SensitivityLevel) -> f64 {
    baseline * multiplier(level.get())
}

/// Sensitivity level guaranteed to lie in [1, 20].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub struct SensitivityLevel(i32);

impl SensitivityLevel {
    pub const MIN: i32 = 1;
    pub const MAX: i32 = 20;
    /// Level used before any setting has been stored
    pub const FRESH_INSTALL: SensitivityLevel = SensitivityLevel(10);

    /// Clamp an arbitrary integer into the valid range.
    pub fn clamped(level: i32) -> Self {
        Self(level.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(&self) -> i32 {
        self.0
    }

    /// Map a legacy three-step setting onto the 20-step scale.
    ///
    /// Older builds stored one of `LOW`, `MEDIUM`, `HIGH`.
    pub fn from_legacy(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Self(4)),
            "MEDIUM" => Some(Self(10)),
            "HIGH" => Some(Self(17)),
            _ => None,
        }
    }

    pub fn multiplier(&self) -> f64 {
        multiplier(self.0)
    }
}

impl Default for SensitivityLevel {
    fn default() -> Self {
        Self::FRESH_INSTALL
    }
}

impl From<i32> for SensitivityLevel {
    fn from(level: i32) -> Self {
        Self::clamped(level)
    }
}

impl From<SensitivityLevel> for i32 {
    fn from(level: SensitivityLevel) -> Self {
        level.0
    }
}
