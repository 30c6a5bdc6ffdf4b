//! Diagnostic helpers: the runtime-gated debug logger and process-wide
//! tracing initialisation.

pub mod logger;

pub use logger::DebugLogger;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the platform tracing subscriber once per process.
///
/// `log` records are bridged into `tracing`, so both macro families end up in
/// the same sink (logcat on Android, stderr elsewhere).
pub fn init_logging() {
    INIT.call_once(|| {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "android")] {
                use tracing_subscriber::prelude::*;
                match tracing_android::layer("EspressoSense") {
                    Ok(layer) => {
                        let _ = tracing_subscriber::registry().with(layer).try_init();
                    }
                    Err(err) => eprintln!("[Logging] Failed to create android layer: {}", err),
                }
            } else {
                let _ = tracing_subscriber::fmt()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .try_init();
            }
        }
    });
}
