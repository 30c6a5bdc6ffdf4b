//! Monotonic time sources for the engine.
//!
//! The session works in plain milliseconds; the engine converts `Instant`s
//! into milliseconds since its own start so tests can drive time by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Trait representing a monotonic time source used for sample timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Time source that only moves when told to.
pub struct ManualTimeSource {
    origin: Instant,
    offset_ms: AtomicU64,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.offset_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

/// Milliseconds elapsed between `origin` and the source's current time.
pub fn millis_since(source: &dyn TimeSource, origin: Instant) -> u64 {
    source.now().saturating_duration_since(origin).as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_source_advances() {
        let source = ManualTimeSource::new();
        let origin = source.now();
        source.advance(250);
        source.advance(250);
        assert_eq!(millis_since(&source, origin), 500);
        source.set(20);
        assert_eq!(millis_since(&source, origin), 20);
    }

    #[test]
    fn test_origin_in_future_saturates() {
        let source = ManualTimeSource::new();
        let origin = source.now() + Duration::from_secs(5);
        assert_eq!(millis_since(&source, origin), 0);
    }
}
