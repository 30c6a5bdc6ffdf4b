//! EngineHandle: runs a `DetectionSession` on a dedicated worker.
//!
//! All session mutation happens on one thread that owns a current-thread
//! Tokio runtime. Commands (including sensor readings) arrive over an
//! unbounded channel; a periodic tick drives time-based transitions. State is
//! published as a `ShotSnapshot` on a `watch` channel and discrete
//! `SessionEvent`s go out on a `broadcast` channel shared by the FRB, CLI and
//! HTTP entry points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::config::AppConfig;
use crate::debug::DebugLogger;
use crate::error::{log_engine_error, log_storage_error, EngineError};
use crate::sensitivity::SensitivityLevel;
use crate::settings::{KeyValueStore, Settings, SettingsLoader, SettingsWriter};
use crate::signal::AccelReading;

use super::clock::{millis_since, TimeSource};
use super::events::{SessionEvent, ShotSnapshot};
use super::sensor::{ReadingSink, SensorFeed};
use super::session::DetectionSession;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Work item consumed by the engine worker.
///
/// Time-dependent commands carry the engine time at which they were sent, so
/// queueing delay never shifts a shot boundary.
#[derive(Debug)]
pub enum EngineCommand {
    Reading { at_ms: u64, reading: AccelReading },
    StartTimer { at_ms: u64 },
    StopTimer { at_ms: u64 },
    ResetTimer { at_ms: u64 },
    Calibrate { at_ms: u64 },
    CancelCalibration { at_ms: u64 },
    SetSensitivity(i32),
    SetHysteresis(u32),
    SetPreInfusionDelay(u64),
    SetDebugMode(bool),
    /// App moved to the background
    Suspend { at_ms: u64 },
    /// App returned to the foreground
    Resume { at_ms: u64 },
    /// Acknowledged once every earlier command has been handled
    Barrier(oneshot::Sender<()>),
    Shutdown,
}

impl EngineCommand {
    fn label(&self) -> &'static str {
        match self {
            EngineCommand::Reading { .. } => "Reading",
            EngineCommand::StartTimer { .. } => "StartTimer",
            EngineCommand::StopTimer { .. } => "StopTimer",
            EngineCommand::ResetTimer { .. } => "ResetTimer",
            EngineCommand::Calibrate { .. } => "Calibrate",
            EngineCommand::CancelCalibration { .. } => "CancelCalibration",
            EngineCommand::SetSensitivity(_) => "SetSensitivity",
            EngineCommand::SetHysteresis(_) => "SetHysteresis",
            EngineCommand::SetPreInfusionDelay(_) => "SetPreInfusionDelay",
            EngineCommand::SetDebugMode(_) => "SetDebugMode",
            EngineCommand::Suspend { .. } => "Suspend",
            EngineCommand::Resume { .. } => "Resume",
            EngineCommand::Barrier(_) => "Barrier",
            EngineCommand::Shutdown => "Shutdown",
        }
    }
}

/// Handle to a running engine. Dropping it shuts the worker down.
pub struct EngineHandle {
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    snapshot_rx: watch::Receiver<ShotSnapshot>,
    event_tx: broadcast::Sender<SessionEvent>,
    writer: SettingsWriter,
    logger: DebugLogger,
    time_source: Arc<dyn TimeSource>,
    origin: Instant,
    has_seen_onboarding: AtomicBool,
    is_supporter: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EngineHandle {
    /// Load settings from `store`, subscribe `feed` and start the worker.
    pub fn start(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        feed: Arc<dyn SensorFeed>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, EngineError> {
        let settings = SettingsLoader::new(store.as_ref()).load();
        let writer = SettingsWriter::spawn(store).map_err(|err| {
            log_storage_error(&err, "spawn settings writer");
            EngineError::NotRunning
        })?;
        Self::start_with_settings(config, settings, writer, feed, time_source)
    }

    /// Start the worker from already-loaded settings.
    pub fn start_with_settings(
        config: AppConfig,
        settings: Settings,
        writer: SettingsWriter,
        feed: Arc<dyn SensorFeed>,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, EngineError> {
        let logger = DebugLogger::new(settings.debug_mode);
        let origin = time_source.now();
        let session = DetectionSession::new(config.clone(), &settings, logger.clone());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot(0));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let sink = Self::reading_sink(command_tx.clone(), Arc::clone(&time_source), origin);
        let worker = EngineWorker {
            session,
            config,
            feed,
            sink,
            writer: writer.clone(),
            logger: logger.clone(),
            time_source: Arc::clone(&time_source),
            origin,
            snapshot_tx,
            event_tx: event_tx.clone(),
            last_publish_ms: None,
        };

        // The bridge may call in from threads without a Tokio runtime, so the
        // worker brings its own.
        let thread = std::thread::Builder::new()
            .name("espresso-engine".to_string())
            .spawn(move || worker.run(command_rx))
            .map_err(|err| {
                let engine_err = EngineError::SensorUnavailable {
                    reason: format!("failed to spawn engine worker: {}", err),
                };
                log_engine_error(&engine_err, "EngineHandle::start");
                engine_err
            })?;

        log::info!("[EngineHandle] Engine started");
        Ok(Self {
            command_tx,
            snapshot_rx,
            event_tx,
            writer,
            logger,
            time_source,
            origin,
            has_seen_onboarding: AtomicBool::new(settings.has_seen_onboarding),
            is_supporter: AtomicBool::new(settings.is_supporter),
            worker: Mutex::new(Some(thread)),
        })
    }

    fn reading_sink(
        tx: mpsc::UnboundedSender<EngineCommand>,
        time_source: Arc<dyn TimeSource>,
        origin: Instant,
    ) -> ReadingSink {
        Arc::new(move |reading| {
            let at_ms = millis_since(time_source.as_ref(), origin);
            let _ = tx.send(EngineCommand::Reading { at_ms, reading });
        })
    }

    fn now_ms(&self) -> u64 {
        millis_since(self.time_source.as_ref(), self.origin)
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        let label = command.label();
        self.command_tx
            .send(command)
            .map_err(|_| EngineError::ChannelClosed {
                command: label.to_string(),
            })
    }

    // ========================================================================
    // STATE
    // ========================================================================

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ShotSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<ShotSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn logger(&self) -> &DebugLogger {
        &self.logger
    }

    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    pub fn start_timer(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::StartTimer {
            at_ms: self.now_ms(),
        })
    }

    pub fn stop_timer(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::StopTimer {
            at_ms: self.now_ms(),
        })
    }

    pub fn reset_timer(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::ResetTimer {
            at_ms: self.now_ms(),
        })
    }

    pub fn calibrate(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Calibrate {
            at_ms: self.now_ms(),
        })
    }

    pub fn cancel_calibration(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::CancelCalibration {
            at_ms: self.now_ms(),
        })
    }

    pub fn set_sensitivity_level(&self, level: i32) -> Result<(), EngineError> {
        self.send(EngineCommand::SetSensitivity(level))
    }

    pub fn set_hysteresis(&self, percent: u32) -> Result<(), EngineError> {
        self.send(EngineCommand::SetHysteresis(percent))
    }

    pub fn set_pre_infusion_delay(&self, delay_ms: u64) -> Result<(), EngineError> {
        self.send(EngineCommand::SetPreInfusionDelay(delay_ms))
    }

    pub fn set_debug_mode(&self, enabled: bool) -> Result<(), EngineError> {
        self.send(EngineCommand::SetDebugMode(enabled))
    }

    pub fn suspend(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Suspend {
            at_ms: self.now_ms(),
        })
    }

    pub fn resume(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Resume {
            at_ms: self.now_ms(),
        })
    }

    // ========================================================================
    // APP FLAGS
    // ========================================================================

    pub fn has_seen_onboarding(&self) -> bool {
        self.has_seen_onboarding.load(Ordering::SeqCst)
    }

    pub fn set_has_seen_onboarding(&self, seen: bool) {
        self.has_seen_onboarding.store(seen, Ordering::SeqCst);
        self.writer.has_seen_onboarding(seen);
    }

    pub fn is_supporter(&self) -> bool {
        self.is_supporter.load(Ordering::SeqCst)
    }

    pub fn set_is_supporter(&self, supporter: bool) {
        self.is_supporter.store(supporter, Ordering::SeqCst);
        self.writer.is_supporter(supporter);
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Block until every command sent so far has been handled and its
    /// settings writes applied.
    ///
    /// Must not be called from inside an async runtime.
    pub fn flush(&self) -> Result<(), EngineError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(EngineCommand::Barrier(ack_tx))?;
        ack_rx
            .blocking_recv()
            .map_err(|_| EngineError::ChannelClosed {
                command: "Barrier".to_string(),
            })?;
        self.writer.flush();
        Ok(())
    }

    /// Stop the worker and release the sensor. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(EngineCommand::Shutdown);
        let thread = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(thread) = thread {
            if thread.join().is_err() {
                log::error!("[EngineHandle] Engine worker panicked");
            }
            log::info!("[EngineHandle] Engine stopped");
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ========================================================================
// WORKER
// ========================================================================

struct EngineWorker {
    session: DetectionSession,
    config: AppConfig,
    feed: Arc<dyn SensorFeed>,
    sink: ReadingSink,
    writer: SettingsWriter,
    logger: DebugLogger,
    time_source: Arc<dyn TimeSource>,
    origin: Instant,
    snapshot_tx: watch::Sender<ShotSnapshot>,
    event_tx: broadcast::Sender<SessionEvent>,
    last_publish_ms: Option<u64>,
}

impl EngineWorker {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineCommand>) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                log_engine_error(
                    &EngineError::SensorUnavailable {
                        reason: format!("failed to build runtime: {}", err),
                    },
                    "EngineWorker::run",
                );
                return;
            }
        };

        runtime.block_on(async move {
            self.attach_sensor();
            self.publish_snapshot(true);

            let tick_ms = self.config.sensor.tick_interval_ms.max(1);
            let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    command = rx.recv() => match command {
                        Some(EngineCommand::Shutdown) | None => break,
                        Some(command) => self.handle(command),
                    },
                    _ = ticker.tick() => self.on_tick(),
                }
            }

            self.feed.unsubscribe();
            self.session.unsubscribe();
            self.publish_snapshot(true);
        });
    }

    fn now(&self) -> u64 {
        millis_since(self.time_source.as_ref(), self.origin)
    }

    /// Subscribe the feed, then the session. A feed that cannot subscribe
    /// leaves the engine idle with no readings.
    fn attach_sensor(&mut self) {
        let interval = self.config.sensor.update_interval_ms;
        match self.feed.subscribe(interval, Arc::clone(&self.sink)) {
            Ok(()) => {
                let events = self.session.subscribe();
                self.dispatch(events);
                log::info!(
                    "[EngineWorker] Sensor '{}' subscribed at {} ms",
                    self.feed.name(),
                    interval
                );
            }
            Err(err) => log_engine_error(&err, "attach_sensor"),
        }
    }

    fn handle(&mut self, command: EngineCommand) {
        if let EngineCommand::Reading { at_ms, reading } = command {
            let events = self.session.on_reading(at_ms, reading);
            let changed = !events.is_empty();
            self.dispatch(events);
            self.publish_snapshot(changed);
            return;
        }

        let events = match command {
            EngineCommand::StartTimer { at_ms } => self.session.start_timer(at_ms),
            EngineCommand::StopTimer { at_ms } => self.session.stop_timer(at_ms),
            EngineCommand::ResetTimer { at_ms } => self.session.reset_timer(at_ms),
            EngineCommand::Calibrate { at_ms } => self.session.calibrate(at_ms),
            EngineCommand::CancelCalibration { at_ms } => self.session.cancel_calibration(at_ms),
            EngineCommand::SetSensitivity(level) => {
                let event = self.session.set_sensitivity_level(level);
                self.writer.sensitivity(self.session.sensitivity());
                vec![event]
            }
            EngineCommand::SetHysteresis(percent) => {
                let event = self.session.set_hysteresis(percent);
                self.writer.hysteresis(self.session.params().hysteresis);
                vec![event]
            }
            EngineCommand::SetPreInfusionDelay(delay_ms) => {
                let event = self.session.set_pre_infusion_delay(delay_ms);
                self.writer
                    .pre_infusion_delay(self.session.params().pre_infusion_delay_ms);
                vec![event]
            }
            EngineCommand::SetDebugMode(enabled) => {
                self.logger.set_enabled(enabled);
                self.writer.debug_mode(enabled);
                Vec::new()
            }
            EngineCommand::Suspend { at_ms } => {
                let events = self.session.suspend(at_ms);
                self.feed.unsubscribe();
                events
            }
            EngineCommand::Resume { .. } => {
                if !self.session.is_subscribed() {
                    self.attach_sensor();
                }
                Vec::new()
            }
            EngineCommand::Barrier(ack) => {
                let _ = ack.send(());
                return;
            }
            EngineCommand::Reading { .. } | EngineCommand::Shutdown => return,
        };

        self.dispatch(events);
        self.publish_snapshot(true);
    }

    fn on_tick(&mut self) {
        let now = self.now();
        let events = self.session.tick(now);
        self.dispatch(events);
        self.publish_snapshot(true);
    }

    /// Persist what the events imply, then broadcast them.
    fn dispatch(&mut self, events: Vec<SessionEvent>) {
        for event in events {
            match event {
                SessionEvent::ShotFinished { duration_ms, .. } => {
                    self.writer.last_shot(duration_ms);
                }
                SessionEvent::CalibrationCompleted {
                    baseline,
                    sensitivity,
                    ..
                } => {
                    self.writer.baseline(baseline);
                    self.writer
                        .sensitivity(SensitivityLevel::clamped(sensitivity));
                }
                _ => {}
            }
            let _ = self.event_tx.send(event);
        }
    }

    /// Publish a snapshot; sample-driven updates are throttled unless `force`.
    fn publish_snapshot(&mut self, force: bool) {
        let now = self.now();
        if !force {
            if let Some(last) = self.last_publish_ms {
                if now.saturating_sub(last) < self.config.sensor.snapshot_interval_ms {
                    return;
                }
            }
        }
        self.last_publish_ms = Some(now);
        self.snapshot_tx.send_replace(self.session.snapshot(now));
    }
}

#[cfg(test)]
mod tests;
