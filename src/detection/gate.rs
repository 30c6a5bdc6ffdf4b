// Sensor gate - suppression window for sensor-driven decisions

use serde::{Deserialize, Serialize};

/// Whether sensor-driven start/stop decisions are currently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorGate {
    #[default]
    Open,
    /// Suppressed until the given timestamp (exclusive)
    Until(u64),
    /// Suppressed until explicitly released (calibration in progress)
    Held,
}

impl SensorGate {
    pub fn is_suppressed(&self, now: u64) -> bool {
        match *self {
            SensorGate::Open => false,
            SensorGate::Until(deadline) => now < deadline,
            SensorGate::Held => true,
        }
    }

    /// Suppress for `duration_ms` from `now`, replacing any earlier window.
    ///
    /// A held gate stays held; only [`SensorGate::release_after`] lifts it.
    pub fn suppress_for(&mut self, now: u64, duration_ms: u64) {
        if *self == SensorGate::Held {
            return;
        }
        *self = SensorGate::Until(now.saturating_add(duration_ms));
    }

    pub fn hold(&mut self) {
        *self = SensorGate::Held;
    }

    /// Release a hold, keeping sensors suppressed for a short cooldown.
    pub fn release_after(&mut self, now: u64, cooldown_ms: u64) {
        *self = SensorGate::Until(now.saturating_add(cooldown_ms));
    }

    pub fn open(&mut self) {
        *self = SensorGate::Open;
    }
}
