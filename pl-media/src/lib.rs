//! pl-media library - drag-and-drop media library
//!
//! Visitors drop image, audio, video and PDF files, then rename or delete
//! them. Items live in memory only.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod library;

pub use error::{MediaError, Result};
pub use library::{MediaFile, MediaLibrary, PreviewKind};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<MediaLibrary>,
}

impl AppState {
    pub fn new(library: Arc<MediaLibrary>) -> Self {
        Self { library }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/events", get(api::event_stream))
        .route(
            "/api/media",
            get(api::media::list_media).post(api::media::upload_media),
        )
        .route(
            "/api/media/:id",
            axum::routing::patch(api::media::rename_media).delete(api::media::delete_media),
        )
        .route("/api/media/:id/content", get(api::media::media_content))
        .layer(DefaultBodyLimit::max(pl_common::multipart::MAX_UPLOAD_BYTES))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
