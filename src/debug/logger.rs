// Debug Logger - runtime-gated diagnostic output for the detection pipeline
//
// The user-facing debug mode is a persisted setting that can be flipped while
// the engine is running. `log` and `warn` lines are only emitted while the flag
// is set; `error` lines are always emitted.
//
// Usage:
//   - Clone the logger into every component that needs it (clones share the flag)
//   - Use `debug_log!` in hot paths so the message is only formatted when enabled

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, cloneable logger whose `log`/`warn` output follows a live flag.
#[derive(Debug, Clone, Default)]
pub struct DebugLogger {
    enabled: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
}

impl DebugLogger {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Check if debug output is enabled
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Toggle debug output at runtime
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(
                "[DebugLogger] Debug mode {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// Number of gated lines emitted since creation
    pub fn emitted(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn log(&self, message: &str) {
        if !self.is_enabled() {
            return;
        }
        self.counter.fetch_add(1, Ordering::Relaxed);
        tracing::info!("{}", message);
    }

    #[inline]
    pub fn warn(&self, message: &str) {
        if !self.is_enabled() {
            return;
        }
        self.counter.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("{}", message);
    }

    /// Errors bypass the debug gate.
    pub fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Log through a [`DebugLogger`], formatting only when debug mode is on
#[macro_export]
macro_rules! debug_log {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.is_enabled() {
            $logger.log(&format!($($arg)*));
        }
    };
}
