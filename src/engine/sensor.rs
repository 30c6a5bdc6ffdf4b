//! Accelerometer feeds.
//!
//! A feed delivers readings to a sink closure at roughly the requested
//! interval. On device the host app owns the sensor and pushes readings
//! through the API (`BridgeSensorFeed`); on desktop a fixture script can be
//! played back in real time (`ScriptedSensorFeed`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::EngineError;
use crate::fixtures::VibrationScript;
use crate::signal::AccelReading;

/// Receiver for readings produced by a feed.
pub type ReadingSink = Arc<dyn Fn(AccelReading) + Send + Sync>;

/// Source of accelerometer readings.
pub trait SensorFeed: Send + Sync {
    /// Start delivering readings to `sink` every `interval_ms`.
    ///
    /// Subscribing again replaces the previous sink.
    fn subscribe(&self, interval_ms: u64, sink: ReadingSink) -> Result<(), EngineError>;

    /// Stop delivering readings. Idempotent.
    fn unsubscribe(&self);

    fn name(&self) -> &'static str;
}

/// Feed driven by readings the host app pushes in.
#[derive(Default)]
pub struct BridgeSensorFeed {
    sink: Mutex<Option<ReadingSink>>,
}

impl BridgeSensorFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward one reading; returns false when nobody is subscribed.
    pub fn push(&self, reading: AccelReading) -> bool {
        let sink = match self.sink.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return false,
        };
        match sink {
            Some(sink) => {
                sink(reading);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

impl SensorFeed for BridgeSensorFeed {
    fn subscribe(&self, interval_ms: u64, sink: ReadingSink) -> Result<(), EngineError> {
        let mut guard = self.sink.lock().map_err(|_| EngineError::SensorUnavailable {
            reason: "bridge feed lock poisoned".to_string(),
        })?;
        *guard = Some(sink);
        log::info!("[BridgeSensorFeed] Subscribed ({} ms requested)", interval_ms);
        Ok(())
    }

    fn unsubscribe(&self) {
        if let Ok(mut guard) = self.sink.lock() {
            if guard.take().is_some() {
                log::info!("[BridgeSensorFeed] Unsubscribed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "bridge"
    }
}

struct Playback {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Feed that plays a vibration script in real time on its own thread.
///
/// The script's own `interval_ms` sets the pacing; the requested interval is
/// only logged. Playback restarts from the beginning on every subscribe and
/// ends silently when the script runs out.
pub struct ScriptedSensorFeed {
    script: VibrationScript,
    playback: Mutex<Option<Playback>>,
}

impl ScriptedSensorFeed {
    pub fn new(script: VibrationScript) -> Self {
        Self {
            script,
            playback: Mutex::new(None),
        }
    }

    /// True while the playback thread is still producing readings.
    pub fn is_playing(&self) -> bool {
        self.playback
            .lock()
            .map(|g| g.as_ref().is_some_and(|p| !p.thread.is_finished()))
            .unwrap_or(false)
    }
}

impl SensorFeed for ScriptedSensorFeed {
    fn subscribe(&self, interval_ms: u64, sink: ReadingSink) -> Result<(), EngineError> {
        self.unsubscribe();

        let readings = self.script.readings();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let name = self.script.name.clone();

        let thread = std::thread::Builder::new()
            .name("scripted-sensor".to_string())
            .spawn(move || {
                let started = Instant::now();
                for timed in readings {
                    let due = started + Duration::from_millis(timed.at_ms);
                    let now = Instant::now();
                    if due > now {
                        std::thread::sleep(due - now);
                    }
                    if stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    sink(timed.reading);
                }
                log::info!("[ScriptedSensorFeed] Script '{}' finished", name);
            })
            .map_err(|err| EngineError::SensorUnavailable {
                reason: format!("failed to spawn playback thread: {}", err),
            })?;

        log::info!(
            "[ScriptedSensorFeed] Playing '{}' ({} ms requested, {} ms scripted)",
            self.script.name,
            interval_ms,
            self.script.interval_ms
        );

        let mut guard = self.playback.lock().map_err(|_| EngineError::SensorUnavailable {
            reason: "scripted feed lock poisoned".to_string(),
        })?;
        *guard = Some(Playback { stop, thread });
        Ok(())
    }

    fn unsubscribe(&self) {
        let playback = match self.playback.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(playback) = playback {
            playback.stop.store(true, Ordering::SeqCst);
            if playback.thread.join().is_err() {
                log::warn!("[ScriptedSensorFeed] Playback thread panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

impl Drop for ScriptedSensorFeed {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
