//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE stream for both services: forwards EventBus events and sends a
//! heartbeat so clients can show connection status.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Create an SSE stream that relays every event published on `bus`
///
/// # Arguments
/// * `service_name` - Name of the service for logging (e.g., "pl-partners")
/// * `bus` - Event bus to subscribe to
pub fn create_event_sse_stream(
    service_name: &'static str,
    bus: Arc<EventBus>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(data) => {
                            debug!("SSE: Sending {}", name);
                            yield Ok(Event::default().event(name).data(data));
                        }
                        Err(e) => warn!("SSE: Failed to serialize {}: {}", name, e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} client lagged, {} events skipped", service_name, skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: {} event bus closed", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
