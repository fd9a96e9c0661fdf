//! Server-Sent Events: library changes, notices and heartbeat

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    pl_common::sse::create_event_sse_stream("pl-media", state.library.event_bus().clone())
}
