use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersonalizeError {
    #[error("Invalid image name: {0:?}")]
    InvalidImageName(String),

    #[error("Invalid client address: {0:?}")]
    InvalidClientAddress(String),

    #[error("Source image not found: {0:?}")]
    SourceNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

impl PersonalizeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidImageName(_) | Self::InvalidClientAddress(_) => StatusCode::BAD_REQUEST,
            Self::SourceNotFound(_) => StatusCode::NOT_FOUND,
            Self::IoError(_) | Self::ImageError(_) | Self::TaskError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PersonalizeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match status {
            StatusCode::BAD_REQUEST => "Bad request",
            StatusCode::NOT_FOUND => "Image not found",
            _ => "Failed to generate image",
        };
        (status, message).into_response()
    }
}
