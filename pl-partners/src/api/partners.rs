//! Partner list endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::ListView;
use crate::error::Result;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

/// GET /api/partners
///
/// Loads the list on first use; later calls return the displayed list.
pub async fn list_partners(State(state): State<AppState>) -> Json<ListView> {
    Json(state.app.list().await)
}

/// POST /api/partners/refresh
pub async fn refresh_partners(State(state): State<AppState>) -> Result<Json<RefreshResponse>> {
    let count = state.app.refresh().await?;
    Ok(Json(RefreshResponse { count }))
}
