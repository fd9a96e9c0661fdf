//! pl-partners library - partner list service
//!
//! Signed-in users create, edit and delete partner records (text fields, an
//! ordered image list, an optional audio recording). The workflow is exposed
//! as a JSON HTTP API; state changes and notices stream over SSE.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod app;
pub mod cards;
pub mod deletion;
pub mod error;
pub mod form;
pub mod images;
pub mod loader;
pub mod session;
pub mod uploader;

pub use app::{PartnerApp, PartnerSettings};
pub use error::{AppError, Result};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<PartnerApp>,
    /// Root of the local object store, served under /storage (local backend only)
    pub storage_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(app: Arc<PartnerApp>, storage_dir: Option<PathBuf>) -> Self {
        Self { app, storage_dir }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, patch, post, put};

    let storage_dir = state.storage_dir.clone();

    let api = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/events", get(api::event_stream))
        .route("/api/session", get(api::auth::get_session))
        .route("/api/auth/signup", post(api::auth::sign_up))
        .route("/api/auth/signin", post(api::auth::sign_in))
        .route("/api/auth/signout", post(api::auth::sign_out))
        .route("/api/partners", get(api::partners::list_partners))
        .route("/api/partners/refresh", post(api::partners::refresh_partners))
        .route("/api/partners/:id/delete", post(api::delete::request_delete))
        .route("/api/form", get(api::form::get_form))
        .route("/api/form/open", post(api::form::open_form))
        .route("/api/form/fields", patch(api::form::update_fields))
        .route(
            "/api/form/images",
            put(api::form::select_images).delete(api::form::clear_images),
        )
        .route(
            "/api/form/audio",
            put(api::form::select_audio).delete(api::form::clear_audio),
        )
        .route("/api/form/reorder", post(api::form::reorder_images))
        .route("/api/form/submit", post(api::form::submit_form))
        .route("/api/form/close", post(api::form::close_form))
        .route("/api/delete", get(api::delete::get_delete_state))
        .route("/api/delete/confirm", post(api::delete::confirm_delete))
        .route("/api/delete/cancel", post(api::delete::cancel_delete))
        .layer(DefaultBodyLimit::max(pl_common::multipart::MAX_UPLOAD_BYTES));

    let mut router = Router::new().merge(api).merge(api::health_routes());

    // Uploaded files of the local object store
    if let Some(dir) = storage_dir {
        router = router.nest_service("/storage", ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
