//! Media library endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::library::{DropReport, MediaFile, EMPTY_LIBRARY_MESSAGE};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LibraryView {
    pub items: Vec<MediaFile>,
    /// Shown instead of the grid when there are no items
    pub empty_message: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// GET /api/media
pub async fn list_media(State(state): State<AppState>) -> Json<LibraryView> {
    let items = state.library.list().await;
    Json(LibraryView {
        empty_message: items.is_empty().then_some(EMPTY_LIBRARY_MESSAGE),
        items,
    })
}

/// POST /api/media
///
/// Every file part is one dropped file.
pub async fn upload_media(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DropReport>)> {
    let files = pl_common::multipart::read_files(multipart).await?;
    let report = state.library.add_files(files).await;

    let status = if report.added.is_empty() && !report.rejected.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)))
}

/// PATCH /api/media/:id
pub async fn rename_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<MediaFile>> {
    Ok(Json(state.library.rename(id, &request.name).await?))
}

/// DELETE /api/media/:id
pub async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.library.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/media/:id/content
pub async fn media_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let (mime_type, bytes) = state.library.content(id).await?;
    Ok(([(header::CONTENT_TYPE, mime_type)], bytes).into_response())
}
