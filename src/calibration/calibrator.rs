// Calibrator - fixed-window baseline learning
//
// IDLE → CALIBRATING → FINISHED → IDLE, or CALIBRATING → IDLE on cancel.
// Deadlines are plain timestamps checked from `tick`, so there is never more
// than one pending timeout: restarting simply overwrites the start time.

use crate::config::CalibrationConfig;
use crate::debug::DebugLogger;
use crate::debug_log;
use crate::error::{log_calibration_error, CalibrationError};
use crate::sensitivity::SensitivityLevel;

use super::progress::CalibrationProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    Calibrating { started_at: u64 },
    /// Result is displayed until `hold_until`
    Finished { hold_until: u64 },
}

/// Baseline learned by a completed session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    pub baseline: f64,
    pub sensitivity: SensitivityLevel,
    pub sample_count: usize,
}

/// Transition reported by the calibrator
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    Completed(CalibrationResult),
    /// Collection window closed without usable data
    Aborted(CalibrationError),
    Cancelled,
    /// Result display finished (or was dismissed); back to IDLE
    Cleared,
}

#[derive(Debug, Clone)]
pub struct Calibrator {
    config: CalibrationConfig,
    phase: CalibrationPhase,
    samples: Vec<f64>,
    logger: DebugLogger,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig, logger: DebugLogger) -> Self {
        Self {
            config,
            phase: CalibrationPhase::Idle,
            samples: Vec::new(),
            logger,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// True while deviation samples are being collected.
    pub fn is_collecting(&self) -> bool {
        matches!(self.phase, CalibrationPhase::Calibrating { .. })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Begin (or restart) a collection window at `now`.
    pub fn start(&mut self, now: u64) {
        if self.phase != CalibrationPhase::Idle {
            self.logger.log("[Calibrator] Restarting active calibration");
        }
        self.samples.clear();
        self.phase = CalibrationPhase::Calibrating { started_at: now };
        debug_log!(
            self.logger,
            "[Calibrator] Started at {} ({} ms window)",
            now,
            self.config.duration_ms
        );
    }

    /// Record one deviation sample. Ignored outside the collection window.
    pub fn record(&mut self, deviation: f64) -> bool {
        if !self.is_collecting() || !deviation.is_finite() {
            return false;
        }
        self.samples.push(deviation);
        true
    }

    /// Advance time-based transitions: deadline expiry and display hold.
    pub fn tick(&mut self, now: u64) -> Option<CalibrationOutcome> {
        match self.phase {
            CalibrationPhase::Calibrating { started_at }
                if now.saturating_sub(started_at) >= self.config.duration_ms =>
            {
                Some(match self.finish(now) {
                    Ok(result) => CalibrationOutcome::Completed(result),
                    Err(err) => CalibrationOutcome::Aborted(err),
                })
            }
            CalibrationPhase::Finished { hold_until } if now >= hold_until => {
                self.phase = CalibrationPhase::Idle;
                Some(CalibrationOutcome::Cleared)
            }
            _ => None,
        }
    }

    /// Close the collection window and derive the baseline.
    ///
    /// An empty window returns the calibrator to IDLE and reports
    /// [`CalibrationError::EmptySession`]; callers treat it like a cancel.
    pub fn finish(&mut self, now: u64) -> Result<CalibrationResult, CalibrationError> {
        match self.phase {
            CalibrationPhase::Idle => return Err(CalibrationError::NotCalibrating),
            CalibrationPhase::Finished { .. } => return Err(CalibrationError::AlreadyFinished),
            CalibrationPhase::Calibrating { .. } => {}
        }

        if self.samples.is_empty() {
            self.phase = CalibrationPhase::Idle;
            let err = CalibrationError::EmptySession {
                window_ms: self.config.duration_ms,
            };
            log_calibration_error(&err, "finish");
            return Err(err);
        }

        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        let result = CalibrationResult {
            baseline: mean.max(self.config.baseline_floor),
            sensitivity: SensitivityLevel::clamped(self.config.default_sensitivity),
            sample_count: self.samples.len(),
        };
        self.samples.clear();
        self.phase = CalibrationPhase::Finished {
            hold_until: now.saturating_add(self.config.display_hold_ms),
        };

        debug_log!(
            self.logger,
            "[Calibrator] Finished: {} samples, baseline {:.4}, sensitivity {}",
            result.sample_count,
            result.baseline,
            result.sensitivity.get()
        );
        Ok(result)
    }

    /// Cancel a running session or dismiss a displayed result.
    ///
    /// Returns `None` when already IDLE.
    pub fn cancel(&mut self) -> Option<CalibrationOutcome> {
        match self.phase {
            CalibrationPhase::Idle => None,
            CalibrationPhase::Calibrating { .. } => {
                self.samples.clear();
                self.phase = CalibrationPhase::Idle;
                self.logger.log("[Calibrator] Cancelled");
                Some(CalibrationOutcome::Cancelled)
            }
            CalibrationPhase::Finished { .. } => {
                self.phase = CalibrationPhase::Idle;
                Some(CalibrationOutcome::Cleared)
            }
        }
    }

    pub fn progress(&self, now: u64) -> CalibrationProgress {
        match self.phase {
            CalibrationPhase::Idle => CalibrationProgress::idle(),
            CalibrationPhase::Calibrating { started_at } => CalibrationProgress::collecting(
                self.config.duration_ms,
                now.saturating_sub(started_at),
            ),
            CalibrationPhase::Finished { .. } => CalibrationProgress::finished(),
        }
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CalibrationConfig::default(), DebugLogger::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_session() {
        let mut cal = Calibrator::default();
        cal.start(1_000);
        assert!(cal.is_collecting());

        for dev in [0.02, 0.04, 0.06] {
            assert!(cal.record(dev));
        }
        assert_eq!(cal.tick(5_999), None);

        let outcome = cal.tick(6_000);
        match outcome {
            Some(CalibrationOutcome::Completed(result)) => {
                assert!((result.baseline - 0.04).abs() < 1e-12);
                assert_eq!(result.sensitivity.get(), 12);
                assert_eq!(result.sample_count, 3);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(cal.phase(), CalibrationPhase::Finished { hold_until: 9_000 });
        assert!(!cal.record(0.5));

        assert_eq!(cal.tick(8_999), None);
        assert_eq!(cal.tick(9_000), Some(CalibrationOutcome::Cleared));
        assert_eq!(cal.phase(), CalibrationPhase::Idle);
    }

    #[test]
    fn test_diagnostics_follow_debug_mode() {
        let logger = DebugLogger::new(false);
        let mut cal = Calibrator::new(CalibrationConfig::default(), logger.clone());
        cal.start(0);
        cal.record(0.05);
        cal.finish(5_000).unwrap();
        assert_eq!(logger.emitted(), 0);

        logger.set_enabled(true);
        cal.cancel();
        cal.start(10_000);
        cal.cancel();
        assert_eq!(logger.emitted(), 2);
    }

    #[test]
    fn test_baseline_floor() {
        let mut cal = Calibrator::default();
        cal.start(0);
        cal.record(0.001);
        cal.record(0.0);
        let result = cal.finish(5_000).unwrap();
        assert!((result.baseline - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_empty_session_aborts_to_idle() {
        let mut cal = Calibrator::default();
        cal.start(0);
        let outcome = cal.tick(5_000);
        assert_eq!(
            outcome,
            Some(CalibrationOutcome::Aborted(CalibrationError::EmptySession {
                window_ms: 5_000
            }))
        );
        assert_eq!(cal.phase(), CalibrationPhase::Idle);
    }

    #[test]
    fn test_cancel_discards_samples() {
        let mut cal = Calibrator::default();
        cal.start(0);
        cal.record(0.3);
        assert_eq!(cal.cancel(), Some(CalibrationOutcome::Cancelled));
        assert_eq!(cal.sample_count(), 0);
        assert_eq!(cal.tick(10_000), None);
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let mut cal = Calibrator::default();
        assert_eq!(cal.cancel(), None);
        assert_eq!(cal.phase(), CalibrationPhase::Idle);
    }

    #[test]
    fn test_restart_replaces_deadline() {
        let mut cal = Calibrator::default();
        cal.start(0);
        cal.record(0.5);
        cal.start(3_000);
        assert_eq!(cal.sample_count(), 0);
        cal.record(0.05);

        assert_eq!(cal.tick(5_000), None);
        assert!(matches!(
            cal.tick(8_000),
            Some(CalibrationOutcome::Completed(_))
        ));
    }

    #[test]
    fn test_finish_outside_session() {
        let mut cal = Calibrator::default();
        assert_eq!(cal.finish(0), Err(CalibrationError::NotCalibrating));

        cal.start(0);
        cal.record(0.1);
        cal.finish(5_000).unwrap();
        assert_eq!(cal.finish(5_001), Err(CalibrationError::AlreadyFinished));
    }

    #[test]
    fn test_countdown_progress() {
        let mut cal = Calibrator::default();
        cal.start(0);
        let seconds: Vec<u32> = [0, 1_000, 2_000, 3_000, 4_000, 5_000]
            .iter()
            .map(|&t| cal.progress(t).time_left_secs)
            .collect();
        assert_eq!(seconds, vec![5, 4, 3, 2, 1, 0]);
        assert!(cal.progress(100).is_calibrating);
        assert!(!cal.progress(100).is_finished);
    }
}
