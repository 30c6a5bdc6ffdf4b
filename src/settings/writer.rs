// SettingsWriter - fire-and-forget persistence off the detection path
//
// Writes are queued on an unbounded channel and applied by a dedicated
// thread. Failures are logged and dropped; nothing is reported back to the
// sender.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{log_storage_error, StorageError};
use crate::sensitivity::SensitivityLevel;

use super::loader::keys;
use super::store::KeyValueStore;

enum WriteCommand {
    Set { key: &'static str, value: String },
    Remove { key: &'static str },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct SettingsWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl SettingsWriter {
    /// Spawn the writer thread over `store`.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteCommand>();

        std::thread::Builder::new()
            .name("settings-writer".to_string())
            .spawn(move || {
                while let Some(command) = rx.blocking_recv() {
                    match command {
                        WriteCommand::Set { key, value } => {
                            if let Err(err) = store.set(key, &value) {
                                log_storage_error(&err, key);
                            }
                        }
                        WriteCommand::Remove { key } => {
                            if let Err(err) = store.remove(key) {
                                log_storage_error(&err, key);
                            }
                        }
                        WriteCommand::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                log::debug!("[SettingsWriter] Channel closed, writer exiting");
            })?;

        Ok(Self { tx })
    }

    fn send(&self, command: WriteCommand) {
        if self.tx.send(command).is_err() {
            log::warn!("[SettingsWriter] Writer thread gone, dropping write");
        }
    }

    fn set(&self, key: &'static str, value: String) {
        self.send(WriteCommand::Set { key, value });
    }

    pub fn remove(&self, key: &'static str) {
        self.send(WriteCommand::Remove { key });
    }

    pub fn last_shot(&self, duration_ms: u64) {
        self.set(keys::LAST_SHOT_TIME, duration_ms.to_string());
    }

    pub fn baseline(&self, baseline: f64) {
        self.set(keys::CALIBRATION_BASELINE, baseline.to_string());
    }

    pub fn sensitivity(&self, level: SensitivityLevel) {
        self.set(keys::CALIBRATION_SENSITIVITY, level.get().to_string());
    }

    pub fn hysteresis(&self, percent: u32) {
        self.set(keys::HYSTERESIS_LEVEL, percent.to_string());
    }

    pub fn pre_infusion_delay(&self, delay_ms: u64) {
        self.set(keys::PRE_INFUSION_DELAY, delay_ms.to_string());
    }

    pub fn debug_mode(&self, enabled: bool) {
        self.set(keys::DEBUG_MODE, enabled.to_string());
    }

    pub fn has_seen_onboarding(&self, seen: bool) {
        self.set(keys::HAS_SEEN_ONBOARDING, seen.to_string());
    }

    pub fn is_supporter(&self, supporter: bool) {
        self.set(keys::IS_SUPPORTER, supporter.to_string());
    }

    /// Block until every write queued before this call has been applied.
    ///
    /// Must not be called from inside an async runtime.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(WriteCommand::Flush(ack_tx));
        let _ = ack_rx.blocking_recv();
    }
}
