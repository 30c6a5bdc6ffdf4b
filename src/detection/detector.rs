// ShotDetector - start/stop trigger logic over the live deviation signal
//
// Start: deviation must exceed the threshold continuously for `start_delay_ms`.
// Any dip resets the debounce (no partial credit).
//
// Stop: after the pre-infusion grace period the detector tracks the peak
// deviation and treats the shot as active while
// `deviation > max(threshold, peak) × hysteresis`. When that fails
// continuously for `stop_delay_ms` the stop fires, dated at the first failing
// sample so the recorded duration does not include the debounce lag.
//
// The detector never mutates the shot status itself; it returns a
// [`DetectorAction`] that the caller applies to the timer.

use crate::config::DetectionConfig;
use crate::timer::ShotStatus;

use super::params::DetectionParams;

/// Decision produced for one evaluated sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorAction {
    None,
    Start,
    /// Stop the shot using `end_time` as its end
    Stop { end_time: u64 },
}

#[derive(Debug, Clone)]
pub struct ShotDetector {
    start_delay_ms: u64,
    stop_delay_ms: u64,
    above_since: Option<u64>,
    below_since: Option<u64>,
    peak_deviation: f64,
}

impl ShotDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            start_delay_ms: config.start_delay_ms,
            stop_delay_ms: config.stop_delay_ms,
            above_since: None,
            below_since: None,
            peak_deviation: 0.0,
        }
    }

    /// Peak deviation tracked during the current shot
    pub fn peak_deviation(&self) -> f64 {
        self.peak_deviation
    }

    pub fn is_debouncing(&self) -> bool {
        self.above_since.is_some() || self.below_since.is_some()
    }

    /// Drop both debounce accumulators.
    pub fn clear_debounce(&mut self) {
        self.above_since = None;
        self.below_since = None;
    }

    /// Prepare for a freshly started shot (sensor or manual).
    pub fn on_shot_started(&mut self, threshold: f64) {
        self.clear_debounce();
        self.peak_deviation = threshold;
    }

    /// Evaluate one deviation sample against the current shot state.
    ///
    /// `start_time` is the running shot's start; it is only read while
    /// brewing.
    pub fn evaluate(
        &mut self,
        now: u64,
        deviation: f64,
        status: ShotStatus,
        start_time: Option<u64>,
        params: &DetectionParams,
    ) -> DetectorAction {
        match status {
            ShotStatus::Idle | ShotStatus::Finished => {
                self.below_since = None;
                self.evaluate_start(now, deviation, params)
            }
            ShotStatus::Brewing => {
                self.above_since = None;
                self.evaluate_stop(now, deviation, start_time.unwrap_or(now), params)
            }
        }
    }

    fn evaluate_start(&mut self, now: u64, deviation: f64, params: &DetectionParams) -> DetectorAction {
        if deviation <= params.threshold {
            self.above_since = None;
            return DetectorAction::None;
        }

        match self.above_since {
            None => {
                self.above_since = Some(now);
                DetectorAction::None
            }
            Some(since) if now.saturating_sub(since) > self.start_delay_ms => {
                self.above_since = None;
                DetectorAction::Start
            }
            Some(_) => DetectorAction::None,
        }
    }

    fn evaluate_stop(
        &mut self,
        now: u64,
        deviation: f64,
        start_time: u64,
        params: &DetectionParams,
    ) -> DetectorAction {
        if now.saturating_sub(start_time) < params.pre_infusion_delay_ms {
            self.below_since = None;
            return DetectorAction::None;
        }

        self.peak_deviation = self.peak_deviation.max(deviation);
        let reference = params.threshold.max(self.peak_deviation);
        let still_active = deviation > reference * params.hysteresis_ratio();

        if still_active {
            self.below_since = None;
            return DetectorAction::None;
        }

        match self.below_since {
            None => {
                self.below_since = Some(now);
                DetectorAction::None
            }
            Some(since) if now.saturating_sub(since) > self.stop_delay_ms => {
                self.below_since = None;
                DetectorAction::Stop { end_time: since }
            }
            Some(_) => DetectorAction::None,
        }
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
