//! Session and sign-in/sign-up/sign-out endpoints

use axum::{extract::State, http::StatusCode, Json};
use pl_common::backend::User;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::SessionState;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub status: String,
    pub message: String,
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.app.session().await)
}

/// POST /api/auth/signup
///
/// Registers the account without signing in.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<SignUpResponse>)> {
    state
        .app
        .sign_up(&credentials.email, &credentials.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            status: "created".to_string(),
            message: "Check your e-mail to confirm your account".to_string(),
        }),
    ))
}

/// POST /api/auth/signin
pub async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<User>> {
    let user = state
        .app
        .sign_in(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(user))
}

/// POST /api/auth/signout
pub async fn sign_out(State(state): State<AppState>) -> Result<StatusCode> {
    state.app.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}
