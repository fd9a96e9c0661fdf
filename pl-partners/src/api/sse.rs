//! Server-Sent Events
//!
//! Streams every published event (notices, list refreshes, session and form
//! changes) plus a heartbeat.

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
    pl_common::sse::create_event_sse_stream("pl-partners", state.app.event_bus().clone())
}
