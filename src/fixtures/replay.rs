//! Offline replay of a vibration script through a detection session.
//!
//! Time is virtual: readings, ticks and actions are interleaved by their
//! script offsets, so a 40 s shot replays in milliseconds and always yields
//! the same events.

use serde::Serialize;

use crate::config::AppConfig;
use crate::debug::DebugLogger;
use crate::engine::events::{SessionEvent, ShotSnapshot, ShotTrigger};
use crate::engine::DetectionSession;
use crate::settings::Settings;

use super::script::{ScriptAction, VibrationScript};

/// Event with the script offset at which it was produced
#[derive(Debug, Clone, Serialize)]
pub struct TimedEvent {
    pub at_ms: u64,
    pub event: SessionEvent,
}

/// One completed shot
#[derive(Debug, Clone, Serialize)]
pub struct ShotRecord {
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    pub trigger: ShotTrigger,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub fixture: String,
    pub sample_count: usize,
    pub shots: Vec<ShotRecord>,
    pub baseline: f64,
    pub sensitivity: i32,
    pub final_snapshot: ShotSnapshot,
    pub events: Vec<TimedEvent>,
}

pub struct ScriptRunner {
    config: AppConfig,
    settings: Settings,
    logger: DebugLogger,
}

impl ScriptRunner {
    pub fn new(config: AppConfig, settings: Settings) -> Self {
        Self {
            config,
            settings,
            logger: DebugLogger::default(),
        }
    }

    pub fn with_logger(mut self, logger: DebugLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn run(&self, script: &VibrationScript) -> ReplayReport {
        let mut session =
            DetectionSession::new(self.config.clone(), &self.settings, self.logger.clone());
        let mut events = Vec::new();
        record(&mut events, 0, session.subscribe());

        let readings = script.readings();
        let actions = script.sorted_actions();
        let tick_interval = self.config.sensor.tick_interval_ms.max(1);
        let end = script.duration_ms();

        let mut next_action = 0;
        let mut next_tick = tick_interval;

        for timed in &readings {
            let t = timed.at_ms;
            while next_action < actions.len() && actions[next_action].at_ms <= t {
                let action = &actions[next_action];
                let produced = apply_action(&mut session, action.at_ms, &action.action);
                record(&mut events, action.at_ms, produced);
                next_action += 1;
            }
            while next_tick <= t {
                record(&mut events, next_tick, session.tick(next_tick));
                next_tick += tick_interval;
            }
            record(&mut events, t, session.on_reading(t, timed.reading));
        }

        // Actions and ticks scheduled after the last reading.
        for action in &actions[next_action..] {
            let produced = apply_action(&mut session, action.at_ms, &action.action);
            record(&mut events, action.at_ms, produced);
        }
        while next_tick <= end {
            record(&mut events, next_tick, session.tick(next_tick));
            next_tick += tick_interval;
        }

        ReplayReport {
            fixture: script.name.clone(),
            sample_count: readings.len(),
            shots: collect_shots(&events),
            baseline: session.baseline(),
            sensitivity: session.sensitivity().get(),
            final_snapshot: session.snapshot(end),
            events,
        }
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(AppConfig::default(), Settings::default())
    }
}

fn record(out: &mut Vec<TimedEvent>, at_ms: u64, produced: Vec<SessionEvent>) {
    out.extend(produced.into_iter().map(|event| TimedEvent { at_ms, event }));
}

fn apply_action(session: &mut DetectionSession, now: u64, action: &ScriptAction) -> Vec<SessionEvent> {
    match *action {
        ScriptAction::StartTimer => session.start_timer(now),
        ScriptAction::StopTimer => session.stop_timer(now),
        ScriptAction::ResetTimer => session.reset_timer(now),
        ScriptAction::Calibrate => session.calibrate(now),
        ScriptAction::CancelCalibration => session.cancel_calibration(now),
        ScriptAction::Background => session.suspend(now),
        ScriptAction::Foreground => session.resume(now),
        ScriptAction::SetSensitivity { level } => vec![session.set_sensitivity_level(level)],
        ScriptAction::SetHysteresis { percent } => vec![session.set_hysteresis(percent)],
        ScriptAction::SetPreInfusionDelay { delay_ms } => {
            vec![session.set_pre_infusion_delay(delay_ms)]
        }
    }
}

/// Pair each start with the next finish.
pub fn collect_shots(events: &[TimedEvent]) -> Vec<ShotRecord> {
    let mut shots = Vec::new();
    let mut started: Option<u64> = None;
    for timed in events {
        match timed.event {
            SessionEvent::ShotStarted { at_ms, .. } => started = Some(at_ms),
            SessionEvent::ShotFinished {
                duration_ms,
                end_ms,
                trigger,
            } => {
                if let Some(start_ms) = started.take() {
                    shots.push(ShotRecord {
                        start_ms,
                        end_ms,
                        duration_ms,
                        trigger,
                    });
                }
            }
            _ => {}
        }
    }
    shots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::script::{Segment, TimedAction};

    fn segment(duration_ms: u64, amplitude: f64) -> Segment {
        Segment {
            duration_ms,
            amplitude,
            period_ms: 60,
            noise: 0.0,
            label: None,
        }
    }

    #[test]
    fn test_quiet_script_produces_no_shots() {
        let script = VibrationScript {
            name: "quiet".to_string(),
            description: None,
            seed: 1,
            interval_ms: 20,
            segments: vec![segment(5_000, 0.0)],
            actions: Vec::new(),
        };
        let report = ScriptRunner::default().run(&script);
        assert_eq!(report.sample_count, 250);
        assert!(report.shots.is_empty());
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].at_ms, 0);
        assert_eq!(report.events[0].event, SessionEvent::Subscribed);
    }

    #[test]
    fn test_manual_actions_are_replayed() {
        let script = VibrationScript {
            name: "manual".to_string(),
            description: None,
            seed: 1,
            interval_ms: 20,
            segments: vec![segment(4_000, 0.15)],
            actions: vec![
                TimedAction {
                    at_ms: 3_000,
                    action: ScriptAction::StopTimer,
                },
                TimedAction {
                    at_ms: 100,
                    action: ScriptAction::StartTimer,
                },
            ],
        };
        let report = ScriptRunner::default().run(&script);
        // The manual start lands before the start debounce would have.
        assert_eq!(report.shots.len(), 1);
        assert_eq!(report.shots[0].start_ms, 100);
        assert_eq!(report.shots[0].duration_ms, 2_900);
        assert_eq!(report.shots[0].trigger, ShotTrigger::Manual);
    }

    #[test]
    fn test_calibration_deadline_after_last_reading() {
        let script = VibrationScript {
            name: "late".to_string(),
            description: None,
            seed: 1,
            interval_ms: 20,
            segments: vec![segment(6_000, 0.0)],
            actions: vec![TimedAction {
                at_ms: 2_000,
                action: ScriptAction::Calibrate,
            }],
        };
        let report = ScriptRunner::default().run(&script);
        // Window closes at 7000, after the stream ended: still collecting.
        assert!(report.final_snapshot.calibration.is_calibrating);
        assert!(!report.final_snapshot.calibration.is_finished);
    }
}
