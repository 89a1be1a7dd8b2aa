use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid path")]
    InvalidPath,

    #[error("Not found")]
    NotFound,
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        match self {
            GalleryError::InvalidPath => (StatusCode::BAD_REQUEST, "Invalid path").into_response(),
            GalleryError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            other => {
                error!("Gallery request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
