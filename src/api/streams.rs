use futures::{Stream, StreamExt};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};

use crate::engine::{SessionEvent, ShotSnapshot};
use crate::error::EngineError;

use super::with_engine;

/// Stream of UI snapshots
///
/// Yields the current snapshot immediately, then every published update
/// (~15 fps while samples arrive, 10 Hz ticks, and on every state change).
/// Ends when the engine shuts down.
#[flutter_rust_bridge::frb(ignore)]
pub async fn snapshot_stream() -> Result<impl Stream<Item = ShotSnapshot>, EngineError> {
    let rx = with_engine(|engine| Ok(engine.subscribe_snapshots()))?;
    Ok(WatchStream::new(rx))
}

/// Stream of session events (shot started/finished, calibration results,
/// parameter changes)
///
/// Slow consumers skip events they fell behind on rather than stalling the
/// engine.
#[flutter_rust_bridge::frb(ignore)]
pub async fn event_stream() -> Result<impl Stream<Item = SessionEvent>, EngineError> {
    let rx = with_engine(|engine| Ok(engine.subscribe_events()))?;
    Ok(BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => Some(event),
            Err(err) => {
                log::warn!("[EventStream] {}", err);
                None
            }
        }
    }))
}
