//! Debug HTTP server surfaced only in debug feature builds.
//!
//! This module spawns a lightweight Axum server that exposes health, the
//! current snapshot, an SSE session event stream and parameter/timer
//! endpoints for bench testing without the app UI.

#[cfg(all(feature = "debug_http", debug_assertions))]
mod routes;
#[cfg(all(feature = "debug_http", debug_assertions))]
mod sse;

use std::sync::Arc;

use crate::engine::EngineHandle;

#[cfg(all(feature = "debug_http", debug_assertions))]
use routes::{run_http_server, DebugHttpState};

#[cfg(all(feature = "debug_http", debug_assertions))]
use log::{error, info, warn};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::net::SocketAddr;
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::thread;

#[cfg(all(feature = "debug_http", debug_assertions))]
static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Spawn the debug HTTP server only when the feature flag and debug builds are enabled.
#[cfg(all(feature = "debug_http", debug_assertions))]
pub fn spawn_if_enabled(handle: Arc<EngineHandle>) {
    if SERVER_STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("[DebugHttp] Server already running");
        return;
    }

    let addr: SocketAddr = std::env::var("ESPRESSO_DEBUG_HTTP_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787)));

    let token =
        std::env::var("ESPRESSO_DEBUG_TOKEN").unwrap_or_else(|_| "espresso-debug".to_string());
    let preview = token.chars().take(4).collect::<String>();

    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("[DebugHttp] Failed to build tokio runtime: {}", err);
                SERVER_STARTED.store(false, Ordering::SeqCst);
                return;
            }
        };

        info!(
            "[DebugHttp] Binding {} (token prefix {}***)",
            addr, preview
        );

        runtime.block_on(async move {
            let state = DebugHttpState::new(handle, token);
            if let Err(err) = run_http_server(state, addr).await {
                error!("[DebugHttp] Server stopped: {:#}", err);
            }
        });
        SERVER_STARTED.store(false, Ordering::SeqCst);
    });
}

#[cfg(not(all(feature = "debug_http", debug_assertions)))]
pub fn spawn_if_enabled(_handle: Arc<EngineHandle>) {
    // Debug HTTP server disabled in this build.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::engine::{BridgeSensorFeed, ManualTimeSource};
    use crate::settings::MemoryStore;

    #[test]
    fn test_spawn_if_enabled_leaves_engine_usable() {
        let handle = EngineHandle::start(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(BridgeSensorFeed::new()),
            Arc::new(ManualTimeSource::new()),
        )
        .unwrap();
        let handle = Arc::new(handle);

        spawn_if_enabled(Arc::clone(&handle));

        assert!(handle.is_running());
        handle.flush().unwrap();
        handle.shutdown();
    }
}
