//! Error types for pl-partners
//!
//! Four kinds of failure reach the user:
//! - validation: caught before any network call
//! - upload: submit aborted, nothing written
//! - store: operation aborted, underlying message shown
//! - auth gate: refused locally, no network call
//!
//! Each maps to a [`Notice`] and to an HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pl_common::{Error as BackendError, Notice, NoticeVariant};
use serde_json::json;
use thiserror::Error;

/// Main error type for pl-partners
#[derive(Error, Debug)]
pub enum AppError {
    /// Required field missing or malformed
    #[error("{0}")]
    Validation(String),

    /// Mutating action attempted without a signed-in identity
    #[error("Please sign in to add, edit or delete partners")]
    AuthRequired,

    /// Asset upload failed
    #[error("Upload failed: {0}")]
    Upload(#[source] BackendError),

    /// Row store call failed
    #[error("{0}")]
    Store(#[source] BackendError),

    /// Identity provider call failed
    #[error("{0}")]
    Identity(#[source] BackendError),

    /// No partner with this id in the current list
    #[error("Partner not found: {0}")]
    NotFound(i64),

    /// Operation not valid in the current state (no open form, nothing pending)
    #[error("{0}")]
    InvalidState(String),

    /// Malformed request parameter or file
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience Result type using pl-partners AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::AuthRequired => "auth_required",
            AppError::Upload(_) => "upload",
            AppError::Store(_) => "store",
            AppError::Identity(_) => "identity",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::InvalidInput(_) => "invalid_input",
        }
    }

    /// User-facing notice for this failure
    pub fn notice(&self) -> Notice {
        match self {
            AppError::AuthRequired => Notice {
                title: "Sign in required".to_string(),
                description: self.to_string(),
                variant: NoticeVariant::Destructive,
            },
            _ => Notice::error(self.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::Upload(_) | AppError::Store(_) => StatusCode::BAD_GATEWAY,
            AppError::Identity(inner) => match inner {
                BackendError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                BackendError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                BackendError::Api { status, .. } if (400..500).contains(status) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
            "notice": self.notice(),
        }));
        (self.status_code(), body).into_response()
    }
}
