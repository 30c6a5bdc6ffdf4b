//! Values published by the engine: session events and state snapshots.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationProgress;
use crate::timer::ShotStatus;

/// What caused a shot transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotTrigger {
    Sensor,
    Manual,
    /// App went to the background while brewing
    Background,
}

/// Event emitted by the detection session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    ShotStarted {
        at_ms: u64,
        trigger: ShotTrigger,
    },
    ShotFinished {
        duration_ms: u64,
        end_ms: u64,
        trigger: ShotTrigger,
    },
    TimerReset,
    CalibrationStarted,
    CalibrationCompleted {
        baseline: f64,
        sensitivity: i32,
        sample_count: usize,
    },
    CalibrationAborted {
        reason: String,
    },
    CalibrationCancelled,
    /// Result display ended; calibrator back to idle
    CalibrationCleared,
    ParametersChanged {
        baseline: f64,
        sensitivity: i32,
        threshold: f64,
        hysteresis: u32,
        pre_infusion_delay_ms: u64,
    },
    Subscribed,
    Unsubscribed,
}

impl SessionEvent {
    /// Events that change what the UI shows immediately.
    pub fn is_state_change(&self) -> bool {
        !matches!(self, SessionEvent::Subscribed | SessionEvent::Unsubscribed)
    }
}

/// Everything the UI renders, captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotSnapshot {
    pub timestamp_ms: u64,
    pub status: ShotStatus,
    pub elapsed_ms: u64,
    pub current_magnitude: f64,
    pub current_deviation: f64,
    pub last_shot_ms: Option<u64>,
    pub baseline: f64,
    pub threshold: f64,
    pub sensitivity_level: i32,
    pub hysteresis_level: u32,
    pub pre_infusion_delay_ms: u64,
    pub calibration: CalibrationProgress,
    pub sensors_suppressed: bool,
    pub subscribed: bool,
}
