//! Server-sent sync events

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::Stream;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventParams {
    /// Only forward events of this space
    pub space_id: Option<Uuid>,
}

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
    Query(params): Query<EventParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    boardsync_common::sse::event_stream(&state.event_bus, params.space_id)
}
