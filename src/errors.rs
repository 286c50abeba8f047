// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::models::ImageOperation;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream transport error: {0}")]
    Transport(String),

    #[error("Invalid request payload: {0}")]
    Payload(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{}", .0.failure_message())]
    Failed(ImageOperation),
}

impl StudioError {
    /// Network and decode failures, as opposed to an upstream status code.
    pub fn is_transient(&self) -> bool {
        matches!(self, StudioError::Transport(_))
    }

    /// Maps anything that is not a validation or configuration error to the
    /// operation's generic failure so upstream detail never reaches the caller.
    pub fn at_boundary(self, operation: ImageOperation) -> StudioError {
        match self {
            StudioError::Validation(_) | StudioError::Configuration(_) | StudioError::Failed(_) => {
                self
            }
            other => {
                log::error!(
                    "❌ {} failed (transient: {}): {}",
                    operation.as_str(),
                    other.is_transient(),
                    other
                );
                StudioError::Failed(operation)
            }
        }
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(e: reqwest::Error) -> Self {
        StudioError::Transport(e.to_string())
    }
}

impl From<actix_multipart::MultipartError> for StudioError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        StudioError::Payload(e.to_string())
    }
}

impl From<redis::RedisError> for StudioError {
    fn from(e: redis::RedisError) -> Self {
        StudioError::Persistence(e.to_string())
    }
}

impl ResponseError for StudioError {
    fn status_code(&self) -> StatusCode {
        match self {
            StudioError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            StudioError::Validation(_)
            | StudioError::Configuration(_)
            | StudioError::Failed(_) => self.to_string(),
            _ => "Internal server error".to_string(),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}
