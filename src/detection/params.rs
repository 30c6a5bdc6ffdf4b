// Detection parameters - the values the detector reads on every sample
//
// Published as one value so a settings change is a single assignment and the
// detector never sees a threshold from one update paired with a hysteresis
// from another.

use serde::{Deserialize, Serialize};

/// Live parameters consulted by [`ShotDetector`](super::ShotDetector)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Deviation that must be exceeded to start a shot
    pub threshold: f64,
    /// Percentage of the reference level below which brewing is considered over
    pub hysteresis: u32,
    /// Grace period after start during which stop detection is suspended
    pub pre_infusion_delay_ms: u64,
}

impl DetectionParams {
    pub const HYSTERESIS_MIN: u32 = 50;
    pub const HYSTERESIS_MAX: u32 = 95;
    pub const HYSTERESIS_DEFAULT: u32 = 75;
    pub const PRE_INFUSION_MAX_MS: u64 = 15_000;

    /// Build parameters, clamping each value into its valid range.
    pub fn new(threshold: f64, hysteresis: u32, pre_infusion_delay_ms: u64) -> Self {
        Self {
            threshold: if threshold.is_finite() { threshold.max(0.0) } else { 0.0 },
            hysteresis: clamp_hysteresis(hysteresis),
            pre_infusion_delay_ms: clamp_pre_infusion(pre_infusion_delay_ms),
        }
    }

    /// Fraction of the reference level the deviation must stay above.
    pub fn hysteresis_ratio(&self) -> f64 {
        self.hysteresis as f64 / 100.0
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            threshold: crate::sensitivity::threshold(
                crate::settings::DEFAULT_BASELINE,
                crate::sensitivity::SensitivityLevel::default(),
            ),
            hysteresis: Self::HYSTERESIS_DEFAULT,
            pre_infusion_delay_ms: 0,
        }
    }
}

pub fn clamp_hysteresis(value: u32) -> u32 {
    value.clamp(DetectionParams::HYSTERESIS_MIN, DetectionParams::HYSTERESIS_MAX)
}

pub fn clamp_pre_infusion(value: u64) -> u64 {
    value.min(DetectionParams::PRE_INFUSION_MAX_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_ranges() {
        let params = DetectionParams::new(0.04, 20, 60_000);
        assert_eq!(params.hysteresis, 50);
        assert_eq!(params.pre_infusion_delay_ms, 15_000);

        let params = DetectionParams::new(0.04, 99, 3_000);
        assert_eq!(params.hysteresis, 95);
        assert_eq!(params.pre_infusion_delay_ms, 3_000);
    }

    #[test]
    fn test_non_finite_threshold_is_zeroed() {
        assert_eq!(DetectionParams::new(f64::NAN, 75, 0).threshold, 0.0);
        assert_eq!(DetectionParams::new(-1.0, 75, 0).threshold, 0.0);
    }

    #[test]
    fn test_defaults() {
        let params = DetectionParams::default();
        assert_eq!(params.hysteresis, 75);
        assert_eq!(params.pre_infusion_delay_ms, 0);
        assert!((params.threshold - 0.040_658).abs() < 1e-6);
        assert!((params.hysteresis_ratio() - 0.75).abs() < 1e-12);
    }
}
