//! Two-step delete endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use pl_common::PartnerRecord;
use serde::Serialize;

use crate::deletion::DeletionState;
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: PartnerRecord,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /api/partners/:id/delete
///
/// Only asks for confirmation; nothing is deleted yet.
pub async fn request_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeletionState>> {
    state.app.request_delete(id).await?;
    Ok(Json(state.app.deletion_state().await))
}

/// GET /api/delete
pub async fn get_delete_state(State(state): State<AppState>) -> Json<DeletionState> {
    Json(state.app.deletion_state().await)
}

/// POST /api/delete/confirm
pub async fn confirm_delete(State(state): State<AppState>) -> Result<Json<DeletedResponse>> {
    let deleted = state.app.confirm_delete().await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// POST /api/delete/cancel
pub async fn cancel_delete(State(state): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.app.cancel_delete().await,
    })
}
