//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::EventBus;

/// Turn an EventBus subscription into an SSE stream
///
/// The SSE event name is the event kind (`records_created`, ...) and the data
/// is the JSON-serialized event. When `space_id` is set only events of that
/// space are forwarded. Lagged receivers skip the lost events and keep going.
pub fn event_stream(
    bus: &EventBus,
    space_id: Option<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let stream = BroadcastStream::new(bus.subscribe()).filter_map(move |result| async move {
        match result {
            Ok(event) => {
                if space_id.is_some_and(|id| id != event.space_id()) {
                    return None;
                }
                match serde_json::to_string(&event) {
                    Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                    Err(e) => {
                        warn!("Failed to serialize event: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
