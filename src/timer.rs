// Timer engine - owner of the shot state
//
// Only these operations mutate the shot status. The detector decides *when*
// to call them; manual controls call them directly.

use serde::{Deserialize, Serialize};

/// Shot lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShotStatus {
    #[default]
    Idle,
    Brewing,
    Finished,
}

impl ShotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShotStatus::Idle => "IDLE",
            ShotStatus::Brewing => "BREWING",
            ShotStatus::Finished => "FINISHED",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimerEngine {
    status: ShotStatus,
    start_time: Option<u64>,
    elapsed_ms: u64,
    last_shot_ms: Option<u64>,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a persisted last-shot duration (display only).
    pub fn with_last_shot(last_shot_ms: Option<u64>) -> Self {
        Self {
            last_shot_ms,
            ..Self::default()
        }
    }

    pub fn status(&self) -> ShotStatus {
        self.status
    }

    pub fn start_time(&self) -> Option<u64> {
        self.start_time
    }

    pub fn last_shot_ms(&self) -> Option<u64> {
        self.last_shot_ms
    }

    /// Elapsed time as shown to the user: live while brewing, frozen otherwise.
    pub fn elapsed_ms(&self, now: u64) -> u64 {
        match (self.status, self.start_time) {
            (ShotStatus::Brewing, Some(start)) => now.saturating_sub(start),
            _ => self.elapsed_ms,
        }
    }

    /// Enter BREWING at `now`.
    ///
    /// Returns `false` (and changes nothing) when a shot is already running.
    /// Starting from FINISHED clears the previous elapsed display first.
    pub fn start(&mut self, now: u64) -> bool {
        if self.status == ShotStatus::Brewing {
            return false;
        }
        self.status = ShotStatus::Brewing;
        self.start_time = Some(now);
        self.elapsed_ms = 0;
        true
    }

    /// Finish the running shot with `end_time` as its end.
    ///
    /// Returns the recorded duration, or `None` when nothing was brewing.
    pub fn stop(&mut self, end_time: u64) -> Option<u64> {
        if self.status != ShotStatus::Brewing {
            return None;
        }
        let duration = self
            .start_time
            .map(|start| end_time.saturating_sub(start))
            .unwrap_or(0);
        self.status = ShotStatus::Finished;
        self.elapsed_ms = duration;
        self.last_shot_ms = Some(duration);
        Some(duration)
    }

    /// Return to IDLE and clear the elapsed display.
    ///
    /// The last completed shot is kept.
    pub fn reset(&mut self) {
        self.status = ShotStatus::Idle;
        self.start_time = None;
        self.elapsed_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop_records_duration() {
        let mut timer = TimerEngine::new();
        assert!(timer.start(1_000));
        assert_eq!(timer.elapsed_ms(1_500), 500);

        assert_eq!(timer.stop(26_000), Some(25_000));
        assert_eq!(timer.status(), ShotStatus::Finished);
        assert_eq!(timer.last_shot_ms(), Some(25_000));
        assert_eq!(timer.elapsed_ms(99_999), 25_000);
    }

    #[test]
    fn test_stop_before_start_time_clamps_to_zero() {
        let mut timer = TimerEngine::new();
        timer.start(5_000);
        assert_eq!(timer.stop(4_000), Some(0));
    }

    #[test]
    fn test_stop_when_not_brewing_is_noop() {
        let mut timer = TimerEngine::with_last_shot(Some(30_000));
        assert_eq!(timer.stop(10), None);
        assert_eq!(timer.status(), ShotStatus::Idle);
        assert_eq!(timer.last_shot_ms(), Some(30_000));
    }

    #[test]
    fn test_start_while_brewing_is_rejected() {
        let mut timer = TimerEngine::new();
        timer.start(100);
        assert!(!timer.start(200));
        assert_eq!(timer.start_time(), Some(100));
    }

    #[test]
    fn test_restart_from_finished_clears_elapsed() {
        let mut timer = TimerEngine::new();
        timer.start(0);
        timer.stop(20_000);
        assert!(timer.start(40_000));
        assert_eq!(timer.elapsed_ms(40_000), 0);
        assert_eq!(timer.last_shot_ms(), Some(20_000));
    }

    #[test]
    fn test_reset_keeps_last_shot() {
        let mut timer = TimerEngine::new();
        timer.start(0);
        timer.stop(28_000);
        timer.reset();
        assert_eq!(timer.status(), ShotStatus::Idle);
        assert_eq!(timer.elapsed_ms(50_000), 0);
        assert_eq!(timer.last_shot_ms(), Some(28_000));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&ShotStatus::Brewing).unwrap();
        assert_eq!(json, "\"BREWING\"");
        assert_eq!(ShotStatus::Finished.as_str(), "FINISHED");
    }
}
