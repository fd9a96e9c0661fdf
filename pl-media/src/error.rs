//! Error types for pl-media

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pl_common::Notice;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("File not found: {0}")]
    NotFound(Uuid),

    #[error("File name must not be empty")]
    EmptyName,

    /// Malformed upload request
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;

impl MediaError {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::NotFound(_) => "not_found",
            MediaError::EmptyName => "validation",
            MediaError::InvalidInput(_) => "invalid_input",
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error(self.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MediaError::NotFound(_) => StatusCode::NOT_FOUND,
            MediaError::EmptyName | MediaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<pl_common::Error> for MediaError {
    fn from(e: pl_common::Error) -> Self {
        match e {
            pl_common::Error::InvalidInput(message) => MediaError::InvalidInput(message),
            other => MediaError::InvalidInput(other.to_string()),
        }
    }
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
            "notice": self.notice(),
        }));
        (self.status_code(), body).into_response()
    }
}
