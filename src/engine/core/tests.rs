use std::f64::consts::PI;

use super::*;
use crate::engine::clock::ManualTimeSource;
use crate::engine::sensor::BridgeSensorFeed;
use crate::settings::{keys, MemoryStore};
use crate::timer::ShotStatus;

struct Harness {
    engine: EngineHandle,
    feed: Arc<BridgeSensorFeed>,
    clock: Arc<ManualTimeSource>,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    fn with_store(store: MemoryStore) -> Self {
        let feed = Arc::new(BridgeSensorFeed::new());
        let clock = Arc::new(ManualTimeSource::new());
        let store = Arc::new(store);
        let engine = EngineHandle::start(
            AppConfig::default(),
            store.clone(),
            feed.clone(),
            clock.clone(),
        )
        .unwrap();
        engine.flush().unwrap();
        Self {
            engine,
            feed,
            clock,
            store,
        }
    }

    /// Push one reading every 20 ms from `from_ms` until `to_ms` (exclusive).
    fn vibrate(&self, from_ms: u64, to_ms: u64, amplitude: f64) {
        let mut t = from_ms;
        while t < to_ms {
            self.clock.set(t);
            let phase = 2.0 * PI * (t % 60) as f64 / 60.0;
            let z = 1.0 + amplitude * 2f64.sqrt() * phase.sin();
            assert!(self.feed.push(AccelReading::new(0.0, 0.0, z)));
            t += 20;
        }
        self.engine.flush().unwrap();
    }

    fn stored(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap()
    }
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn test_engine_subscribes_feed_on_start() {
    let h = Harness::new();
    assert!(h.feed.is_subscribed());
    assert!(h.engine.is_running());
    let snapshot = h.engine.snapshot();
    assert!(snapshot.subscribed);
    assert_eq!(snapshot.status, ShotStatus::Idle);
}

#[test]
fn test_sensor_shot_is_timed_and_persisted() {
    let h = Harness::new();
    let mut events = h.engine.subscribe_events();

    h.vibrate(0, 3_000, 0.15);
    assert_eq!(h.engine.snapshot().status, ShotStatus::Brewing);
    h.vibrate(3_000, 4_000, 0.0);

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.status, ShotStatus::Finished);
    let duration = snapshot.last_shot_ms.unwrap();
    assert!((2_800..=3_200).contains(&duration), "duration {}", duration);
    assert_eq!(h.stored(keys::LAST_SHOT_TIME), Some(duration.to_string()));

    let events = drain(&mut events);
    assert!(matches!(
        events[0],
        SessionEvent::ShotStarted {
            trigger: crate::engine::ShotTrigger::Sensor,
            ..
        }
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::ShotFinished { duration_ms, .. } if *duration_ms == duration)));
}

#[test]
fn test_manual_timer_commands() {
    let h = Harness::new();
    let mut events = h.engine.subscribe_events();

    h.clock.set(1_000);
    h.engine.start_timer().unwrap();
    h.engine.flush().unwrap();
    h.clock.set(2_500);
    assert_eq!(h.engine.snapshot().status, ShotStatus::Brewing);

    h.engine.stop_timer().unwrap();
    h.engine.flush().unwrap();
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.status, ShotStatus::Finished);
    assert_eq!(snapshot.last_shot_ms, Some(1_500));
    assert!(snapshot.sensors_suppressed);

    h.engine.reset_timer().unwrap();
    h.engine.flush().unwrap();
    assert_eq!(h.engine.snapshot().status, ShotStatus::Idle);

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::TimerReset));
    assert_eq!(h.stored(keys::LAST_SHOT_TIME).as_deref(), Some("1500"));
}

#[test]
fn test_parameter_commands_are_clamped_and_persisted() {
    let h = Harness::new();
    h.engine.set_sensitivity_level(25).unwrap();
    h.engine.set_hysteresis(200).unwrap();
    h.engine.set_pre_infusion_delay(8_000).unwrap();
    h.engine.flush().unwrap();

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.sensitivity_level, 20);
    assert_eq!(snapshot.hysteresis_level, 95);
    assert_eq!(snapshot.pre_infusion_delay_ms, 8_000);
    assert!((snapshot.threshold - 0.05 * 0.05).abs() < 1e-9);

    assert_eq!(h.stored(keys::CALIBRATION_SENSITIVITY).as_deref(), Some("20"));
    assert_eq!(h.stored(keys::HYSTERESIS_LEVEL).as_deref(), Some("95"));
    assert_eq!(h.stored(keys::PRE_INFUSION_DELAY).as_deref(), Some("8000"));
}

#[test]
fn test_start_loads_and_migrates_settings() {
    let h = Harness::with_store(MemoryStore::with_entries([
        (keys::CALIBRATION_SENSITIVITY, "HIGH"),
        (keys::HYSTERESIS_LEVEL, "60"),
        (keys::LAST_SHOT_TIME, "27500"),
        (keys::HAS_SEEN_ONBOARDING, "true"),
    ]));

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.sensitivity_level, 17);
    assert_eq!(snapshot.hysteresis_level, 60);
    assert_eq!(snapshot.last_shot_ms, Some(27_500));
    assert!(h.engine.has_seen_onboarding());
    assert!(!h.engine.is_supporter());
    assert_eq!(h.stored(keys::SETTINGS_VERSION).as_deref(), Some("1"));
}

#[test]
fn test_debug_toggle_updates_logger_and_store() {
    let h = Harness::new();
    assert!(!h.engine.logger().is_enabled());

    h.engine.set_debug_mode(true).unwrap();
    h.engine.flush().unwrap();
    assert!(h.engine.logger().is_enabled());
    assert_eq!(h.stored(keys::DEBUG_MODE).as_deref(), Some("true"));
}

#[test]
fn test_suspend_stops_shot_and_releases_feed() {
    let h = Harness::new();

    h.clock.set(500);
    h.engine.start_timer().unwrap();
    h.engine.flush().unwrap();
    h.clock.set(4_500);
    h.engine.suspend().unwrap();
    h.engine.flush().unwrap();

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.status, ShotStatus::Finished);
    assert_eq!(snapshot.last_shot_ms, Some(4_000));
    assert!(!snapshot.subscribed);
    assert!(!h.feed.is_subscribed());

    h.engine.resume().unwrap();
    h.engine.flush().unwrap();
    assert!(h.feed.is_subscribed());
    assert!(h.engine.snapshot().subscribed);
}

#[test]
fn test_calibration_completes_on_reading_after_deadline() {
    let h = Harness::new();
    let mut events = h.engine.subscribe_events();

    h.clock.set(0);
    h.engine.calibrate().unwrap();
    h.engine.flush().unwrap();
    assert!(h.engine.snapshot().calibration.is_calibrating);

    h.vibrate(0, 5_020, 0.06);

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.sensitivity_level, 12);
    assert!(snapshot.calibration.is_finished);
    assert!(h.stored(keys::CALIBRATION_BASELINE).is_some());
    assert_eq!(h.stored(keys::CALIBRATION_SENSITIVITY).as_deref(), Some("12"));
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, SessionEvent::CalibrationCompleted { .. })));
}

#[test]
fn test_commands_fail_after_shutdown() {
    let h = Harness::new();
    h.engine.shutdown();
    h.engine.shutdown();

    assert!(!h.feed.is_subscribed());
    assert!(!h.engine.is_running());
    assert_eq!(
        h.engine.start_timer(),
        Err(EngineError::ChannelClosed {
            command: "StartTimer".to_string()
        })
    );
    assert!(h.engine.flush().is_err());
}

#[test]
fn test_commands_are_timed_when_sent() {
    let h = Harness::new();

    h.clock.set(500);
    h.engine.start_timer().unwrap();
    h.clock.set(4_500);
    h.engine.suspend().unwrap();
    // The worker handles both commands only after the clock moved on.
    h.clock.set(9_000);
    h.engine.flush().unwrap();

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.status, ShotStatus::Finished);
    assert_eq!(snapshot.last_shot_ms, Some(4_000));
}

#[test]
fn test_resume_while_listening_keeps_subscription() {
    let h = Harness::new();
    let mut events = h.engine.subscribe_events();

    h.vibrate(0, 300, 0.15);
    h.engine.resume().unwrap();
    h.engine.flush().unwrap();
    assert!(h.feed.is_subscribed());
    assert!(!drain(&mut events).contains(&SessionEvent::Subscribed));

    h.vibrate(300, 1_000, 0.15);
    let started = drain(&mut events).into_iter().find_map(|e| match e {
        SessionEvent::ShotStarted { at_ms, .. } => Some(at_ms),
        _ => None,
    });
    assert_eq!(started, Some(440));
}
