//! DetectionSession: the single owner of all detection state.
//!
//! One long-lived value wires the rolling buffer into either the calibrator
//! or the shot detector, applies the detector's decisions to the timer and
//! keeps the sensor gate. Changing a parameter never rebuilds the buffer; only
//! an explicit subscribe does.
//!
//! Every operation takes the current time in milliseconds and returns the
//! [`SessionEvent`]s it produced, so the session itself never reads a clock.

use crate::calibration::{CalibrationOutcome, Calibrator};
use crate::config::AppConfig;
use crate::debug::DebugLogger;
use crate::debug_log;
use crate::detection::{DetectionParams, DetectorAction, SensorGate, ShotDetector};
use crate::error::ErrorCode;
use crate::sensitivity::{self, SensitivityLevel};
use crate::settings::Settings;
use crate::signal::{AccelReading, SignalBuffer};
use crate::timer::{ShotStatus, TimerEngine};

use super::events::{SessionEvent, ShotSnapshot, ShotTrigger};

pub struct DetectionSession {
    config: AppConfig,
    buffer: Option<SignalBuffer>,
    calibrator: Calibrator,
    detector: ShotDetector,
    timer: TimerEngine,
    gate: SensorGate,
    baseline: f64,
    sensitivity: SensitivityLevel,
    params: DetectionParams,
    current_magnitude: f64,
    current_deviation: f64,
    samples_seen: u64,
    logger: DebugLogger,
}

impl DetectionSession {
    /// Build a session from configuration and persisted settings.
    ///
    /// The session starts unsubscribed; readings are dropped until
    /// [`DetectionSession::subscribe`] is called.
    pub fn new(config: AppConfig, settings: &Settings, logger: DebugLogger) -> Self {
        Self {
            calibrator: Calibrator::new(config.calibration.clone(), logger.clone()),
            detector: ShotDetector::new(&config.detection),
            timer: TimerEngine::with_last_shot(settings.last_shot_ms),
            gate: SensorGate::Open,
            baseline: settings.baseline,
            sensitivity: settings.sensitivity,
            params: settings.detection_params(),
            buffer: None,
            current_magnitude: 0.0,
            current_deviation: 0.0,
            samples_seen: 0,
            logger,
            config,
        }
    }

    pub fn status(&self) -> ShotStatus {
        self.timer.status()
    }

    pub fn params(&self) -> DetectionParams {
        self.params
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn sensitivity(&self) -> SensitivityLevel {
        self.sensitivity
    }

    pub fn gate(&self) -> SensorGate {
        self.gate
    }

    pub fn is_subscribed(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    // ========================================================================
    // SUBSCRIPTION
    // ========================================================================

    /// Start accepting readings with a fresh buffer.
    pub fn subscribe(&mut self) -> Vec<SessionEvent> {
        self.buffer = Some(SignalBuffer::new(self.config.detection.smoothing_window));
        self.detector.clear_debounce();
        self.samples_seen = 0;
        debug_log!(self.logger, "[Session] Subscribed");
        vec![SessionEvent::Subscribed]
    }

    /// Stop accepting readings. Idempotent.
    ///
    /// Drops the buffer and clears every debounce and suppression timestamp
    /// so a later subscribe starts from a clean slate.
    pub fn unsubscribe(&mut self) -> Vec<SessionEvent> {
        self.detector.clear_debounce();
        self.gate.open();
        self.current_deviation = 0.0;
        if self.buffer.take().is_none() {
            return Vec::new();
        }
        debug_log!(self.logger, "[Session] Unsubscribed");
        vec![SessionEvent::Unsubscribed]
    }

    /// App went to the background: end a running shot at `now`, abandon any
    /// calibration and tear the subscription down.
    pub fn suspend(&mut self, now: u64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.timer.status() == ShotStatus::Brewing {
            self.logger
                .warn("[Session] Backgrounded while brewing, forcing stop");
            events.extend(self.end_shot(now, now, ShotTrigger::Background));
        }
        if self.calibrator.is_collecting() {
            events.extend(self.cancel_calibration(now));
        }
        events.extend(self.unsubscribe());
        events
    }

    /// App returned to the foreground.
    ///
    /// A foreground signal without a prior suspend keeps the live buffer and
    /// debounce progress.
    pub fn resume(&mut self, _now: u64) -> Vec<SessionEvent> {
        if self.is_subscribed() {
            return Vec::new();
        }
        self.subscribe()
    }

    // ========================================================================
    // SAMPLE PATH
    // ========================================================================

    /// Process one accelerometer reading that arrived at `now`.
    pub fn on_reading(&mut self, now: u64, reading: AccelReading) -> Vec<SessionEvent> {
        if !reading.is_finite() {
            self.logger.warn("[Session] Dropping non-finite reading");
            return Vec::new();
        }
        let Some(buffer) = self.buffer.as_mut() else {
            return Vec::new();
        };

        let magnitude = reading.magnitude();
        buffer.push(magnitude);
        let deviation = buffer.std_dev();
        self.current_magnitude = magnitude;
        self.current_deviation = deviation;
        self.samples_seen += 1;

        let every = self.config.detection.log_every_n_samples.max(1);
        if self.samples_seen % every == 0 {
            debug_log!(
                self.logger,
                "[Sensor] Mag: {:.3} | Dev: {:.3} | Thresh: {:.3} | State: {}",
                magnitude,
                deviation,
                self.params.threshold,
                self.timer.status().as_str()
            );
        }

        let mut events = self.tick(now);

        if self.calibrator.is_collecting() {
            self.calibrator.record(deviation);
            return events;
        }

        if self.gate.is_suppressed(now) {
            self.detector.clear_debounce();
            return events;
        }

        let action = self.detector.evaluate(
            now,
            deviation,
            self.timer.status(),
            self.timer.start_time(),
            &self.params,
        );
        match action {
            DetectorAction::None => {}
            DetectorAction::Start => {
                self.logger.log("[Detector] Start debounce elapsed, starting timer");
                events.extend(self.begin_shot(now, ShotTrigger::Sensor));
            }
            DetectorAction::Stop { end_time } => {
                self.logger.log("[Detector] Stop debounce elapsed, stopping timer");
                events.extend(self.end_shot(now, end_time, ShotTrigger::Sensor));
            }
        }
        events
    }

    /// Advance time-driven transitions (calibration deadline and display hold).
    pub fn tick(&mut self, now: u64) -> Vec<SessionEvent> {
        match self.calibrator.tick(now) {
            Some(outcome) => self.apply_calibration_outcome(now, outcome),
            None => Vec::new(),
        }
    }

    // ========================================================================
    // TIMER CONTROLS
    // ========================================================================

    pub fn start_timer(&mut self, now: u64) -> Vec<SessionEvent> {
        self.begin_shot(now, ShotTrigger::Manual)
    }

    pub fn stop_timer(&mut self, now: u64) -> Vec<SessionEvent> {
        self.end_shot(now, now, ShotTrigger::Manual)
    }

    pub fn reset_timer(&mut self, now: u64) -> Vec<SessionEvent> {
        self.timer.reset();
        self.detector.clear_debounce();
        self.gate
            .suppress_for(now, self.config.detection.reset_cooldown_ms);
        self.logger.log("[Timer] Reset");
        vec![SessionEvent::TimerReset]
    }

    fn begin_shot(&mut self, now: u64, trigger: ShotTrigger) -> Vec<SessionEvent> {
        if !self.timer.start(now) {
            self.logger.log("[Timer] Start ignored, already brewing");
            return Vec::new();
        }
        self.detector.on_shot_started(self.params.threshold);
        self.logger
            .log(&format!("[Timer] Started at {} ({:?})", now, trigger));
        vec![SessionEvent::ShotStarted { at_ms: now, trigger }]
    }

    fn end_shot(&mut self, now: u64, end_time: u64, trigger: ShotTrigger) -> Vec<SessionEvent> {
        let Some(duration_ms) = self.timer.stop(end_time) else {
            return Vec::new();
        };
        self.detector.clear_debounce();
        self.gate
            .suppress_for(now, self.config.detection.stop_cooldown_ms);
        self.logger.log(&format!(
            "[Timer] Finished: {} ms ({:?})",
            duration_ms, trigger
        ));
        vec![SessionEvent::ShotFinished {
            duration_ms,
            end_ms: end_time,
            trigger,
        }]
    }

    // ========================================================================
    // CALIBRATION
    // ========================================================================

    pub fn calibrate(&mut self, now: u64) -> Vec<SessionEvent> {
        self.calibrator.start(now);
        self.gate.hold();
        self.detector.clear_debounce();
        vec![SessionEvent::CalibrationStarted]
    }

    /// Cancel a running calibration or dismiss a finished one.
    pub fn cancel_calibration(&mut self, now: u64) -> Vec<SessionEvent> {
        match self.calibrator.cancel() {
            Some(outcome) => self.apply_calibration_outcome(now, outcome),
            None => Vec::new(),
        }
    }

    fn apply_calibration_outcome(
        &mut self,
        now: u64,
        outcome: CalibrationOutcome,
    ) -> Vec<SessionEvent> {
        let cal = &self.config.calibration;
        match outcome {
            CalibrationOutcome::Completed(result) => {
                self.gate.release_after(now, cal.finish_cooldown_ms);
                self.baseline = result.baseline;
                self.sensitivity = result.sensitivity;
                self.logger.log(&format!(
                    "[Calibration] Baseline {:.4}, threshold {:.4}",
                    result.baseline,
                    sensitivity::threshold(result.baseline, result.sensitivity)
                ));
                let mut events = vec![SessionEvent::CalibrationCompleted {
                    baseline: result.baseline,
                    sensitivity: result.sensitivity.get(),
                    sample_count: result.sample_count,
                }];
                events.push(self.republish_threshold());
                events
            }
            CalibrationOutcome::Aborted(err) => {
                self.gate.release_after(now, cal.cancel_cooldown_ms);
                vec![SessionEvent::CalibrationAborted {
                    reason: err.message(),
                }]
            }
            CalibrationOutcome::Cancelled => {
                self.gate.release_after(now, cal.cancel_cooldown_ms);
                vec![SessionEvent::CalibrationCancelled]
            }
            CalibrationOutcome::Cleared => vec![SessionEvent::CalibrationCleared],
        }
    }

    // ========================================================================
    // PARAMETERS
    // ========================================================================

    /// Replace the live detection parameters in one assignment.
    pub fn update_parameters(
        &mut self,
        threshold: f64,
        hysteresis: u32,
        pre_infusion_delay_ms: u64,
    ) -> SessionEvent {
        self.params = DetectionParams::new(threshold, hysteresis, pre_infusion_delay_ms);
        self.parameters_event()
    }

    pub fn set_sensitivity_level(&mut self, level: i32) -> SessionEvent {
        self.sensitivity = SensitivityLevel::clamped(level);
        self.republish_threshold()
    }

    pub fn set_baseline(&mut self, baseline: f64) -> SessionEvent {
        if baseline.is_finite() && baseline > 0.0 {
            self.baseline = baseline.max(self.config.calibration.baseline_floor);
        } else {
            self.logger
                .error(&format!("[Session] Ignoring invalid baseline {}", baseline));
        }
        self.republish_threshold()
    }

    pub fn set_hysteresis(&mut self, percent: u32) -> SessionEvent {
        let p = self.params;
        self.update_parameters(p.threshold, percent, p.pre_infusion_delay_ms)
    }

    pub fn set_pre_infusion_delay(&mut self, delay_ms: u64) -> SessionEvent {
        let p = self.params;
        self.update_parameters(p.threshold, p.hysteresis, delay_ms)
    }

    fn republish_threshold(&mut self) -> SessionEvent {
        let p = self.params;
        let threshold = sensitivity::threshold(self.baseline, self.sensitivity);
        self.update_parameters(threshold, p.hysteresis, p.pre_infusion_delay_ms)
    }

    fn parameters_event(&self) -> SessionEvent {
        SessionEvent::ParametersChanged {
            baseline: self.baseline,
            sensitivity: self.sensitivity.get(),
            threshold: self.params.threshold,
            hysteresis: self.params.hysteresis,
            pre_infusion_delay_ms: self.params.pre_infusion_delay_ms,
        }
    }

    // ========================================================================
    // SNAPSHOT
    // ========================================================================

    pub fn snapshot(&self, now: u64) -> ShotSnapshot {
        ShotSnapshot {
            timestamp_ms: now,
            status: self.timer.status(),
            elapsed_ms: self.timer.elapsed_ms(now),
            current_magnitude: self.current_magnitude,
            current_deviation: self.current_deviation,
            last_shot_ms: self.timer.last_shot_ms(),
            baseline: self.baseline,
            threshold: self.params.threshold,
            sensitivity_level: self.sensitivity.get(),
            hysteresis_level: self.params.hysteresis,
            pre_infusion_delay_ms: self.params.pre_infusion_delay_ms,
            calibration: self.calibrator.progress(now),
            sensors_suppressed: self.gate.is_suppressed(now),
            subscribed: self.is_subscribed(),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
