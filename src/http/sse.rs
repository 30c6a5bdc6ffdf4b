use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use crate::engine::EngineHandle;

pub type SessionEventStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// Build a Server-Sent Events stream of session events.
///
/// Each SSE event is named after the session event's `type` tag.
pub fn session_events(handle: &EngineHandle) -> SessionEventStream {
    let stream = BroadcastStream::new(handle.subscribe_events()).filter_map(|result| async move {
        let event = result.ok()?;
        let payload = serde_json::to_value(&event).ok()?;
        let name = payload["type"].as_str().unwrap_or("event").to_string();
        Some(Ok(Event::default().event(name).data(payload.to_string())))
    });

    Sse::new(Box::pin(stream) as Pin<Box<_>>).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(5))
            .text("debug-keepalive"),
    )
}
