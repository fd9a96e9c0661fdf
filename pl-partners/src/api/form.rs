//! Edit form endpoints
//!
//! The server holds a single edit buffer. File selections arrive as
//! multipart bodies; every file part is taken in submission order.

use axum::{
    extract::{Multipart, State},
    Json,
};
use pl_common::backend::FileUpload;
use pl_common::Error as BackendError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::form::{EditBufferView, FieldChanges, SavedPartner};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OpenFormRequest {
    /// Partner to edit; absent for a new record
    #[serde(default)]
    pub partner_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub from_index: usize,
    pub to_index: usize,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub closed: bool,
}

/// POST /api/form/open
pub async fn open_form(
    State(state): State<AppState>,
    body: Option<Json<OpenFormRequest>>,
) -> Result<Json<EditBufferView>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.app.open_form(request.partner_id).await?))
}

/// GET /api/form
pub async fn get_form(State(state): State<AppState>) -> Result<Json<EditBufferView>> {
    Ok(Json(state.app.form().await?))
}

/// PATCH /api/form/fields
pub async fn update_fields(
    State(state): State<AppState>,
    Json(changes): Json<FieldChanges>,
) -> Result<Json<EditBufferView>> {
    let view = state
        .app
        .update_form(|buffer| {
            buffer.apply(changes);
            Ok(())
        })
        .await?;
    Ok(Json(view))
}

/// PUT /api/form/images
///
/// Replaces the pending image selection.
pub async fn select_images(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<EditBufferView>> {
    let files = read_files(multipart).await?;
    let view = state
        .app
        .update_form(|buffer| buffer.set_new_images(files))
        .await?;
    Ok(Json(view))
}

/// DELETE /api/form/images
pub async fn clear_images(State(state): State<AppState>) -> Result<Json<EditBufferView>> {
    let view = state
        .app
        .update_form(|buffer| buffer.set_new_images(Vec::new()))
        .await?;
    Ok(Json(view))
}

/// PUT /api/form/audio
///
/// Takes the first file part as the pending audio.
pub async fn select_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<EditBufferView>> {
    let file = read_files(multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::InvalidInput("no audio file in request".to_string()))?;

    let view = state
        .app
        .update_form(|buffer| buffer.set_new_audio(Some(file)))
        .await?;
    Ok(Json(view))
}

/// DELETE /api/form/audio
pub async fn clear_audio(State(state): State<AppState>) -> Result<Json<EditBufferView>> {
    let view = state
        .app
        .update_form(|buffer| buffer.set_new_audio(None))
        .await?;
    Ok(Json(view))
}

/// POST /api/form/reorder
pub async fn reorder_images(
    State(state): State<AppState>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<EditBufferView>> {
    let view = state
        .app
        .update_form(|buffer| buffer.reorder_images(request.from_index, request.to_index))
        .await?;
    Ok(Json(view))
}

/// POST /api/form/submit
pub async fn submit_form(State(state): State<AppState>) -> Result<Json<SavedPartner>> {
    Ok(Json(state.app.submit_form().await?))
}

/// POST /api/form/close
pub async fn close_form(State(state): State<AppState>) -> Json<CloseResponse> {
    Json(CloseResponse {
        closed: state.app.close_form().await,
    })
}

async fn read_files(multipart: Multipart) -> Result<Vec<FileUpload>> {
    pl_common::multipart::read_files(multipart)
        .await
        .map_err(|e| match e {
            BackendError::InvalidInput(message) => AppError::InvalidInput(message),
            other => AppError::InvalidInput(other.to_string()),
        })
}
