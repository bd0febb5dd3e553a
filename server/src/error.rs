use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use todo_core::{FieldError, ValidationError};

use crate::{repository::RepositoryError, response::ApiResponse, store::StoreError};

pub const NOT_FOUND_MESSAGE: &str = "Todo not found";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("Unauthorized")]
    Unauthorized,
    /// Absent, or present but not accessible to the caller.
    #[error("Not found: {0}")]
    NotFound(&'static str),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Request body too large")]
    PayloadTooLarge,
}

impl ApiError {
    pub fn todo_not_found() -> Self {
        ApiError::NotFound(NOT_FOUND_MESSAGE)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Repository(RepositoryError::Store(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, response) = match &self {
            ApiError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::validation(err.errors.clone()),
            ),
            ApiError::Repository(RepositoryError::UnknownUser(_)) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::validation(vec![FieldError::body("owner", "User not found")]),
            ),
            ApiError::Repository(RepositoryError::Store(StoreError::DuplicateKey(field))) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::validation(vec![FieldError::body(
                    *field,
                    format!("A user with this {field} already exists"),
                )]),
            ),
            ApiError::Repository(RepositoryError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::error("Internal server error"),
            ),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, ApiResponse::error("Unauthorized")),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiResponse::error(*msg)),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ApiResponse::error("Method not allowed"),
            ),
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ApiResponse::error("Request body too large"),
            ),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error = %self,
                "API request failed"
            );
        }
        (status_code, Json(response)).into_response()
    }
}
