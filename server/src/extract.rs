//! Body and query extractors that report malformed input as field errors.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request, rejection::BytesRejection},
    http::{StatusCode, request::Parts},
};
use serde::de::DeserializeOwned;
use todo_core::{FieldError, ValidationError};

use crate::error::ApiError;

/// Like `axum::Json`, but a body that fails to deserialize becomes a 400
/// validation error naming the JSON path that broke. An empty body reads
/// as `{}` so required fields are reported by validation instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(bytes_rejection)?;
        let payload: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        parse(payload).map(ValidJson)
    }
}

/// Like `axum::extract::Query`, but an undecodable query string becomes a
/// 400 validation error located in the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|err| {
                let text = err.body_text();
                let message = text
                    .strip_prefix("Failed to deserialize query string: ")
                    .unwrap_or(text.as_str());
                ApiError::Validation(ValidationError::single(FieldError::query(
                    "query", message,
                )))
            })?;
        Ok(ValidQuery(value))
    }
}

fn bytes_rejection(err: BytesRejection) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        body_error("body", err.body_text())
    }
}

fn parse<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ApiError> {
    let mut deserializer = serde_json::Deserializer::from_slice(payload);
    let value: T = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        let field = if path == "." { "body".to_string() } else { path };
        body_error(field, without_position(&err.into_inner()))
    })?;
    deserializer
        .end()
        .map_err(|err| body_error("body", without_position(&err)))?;
    Ok(value)
}

fn body_error(field: impl Into<String>, message: impl Into<String>) -> ApiError {
    ApiError::Validation(ValidationError::single(FieldError::body(field, message)))
}

/// serde_json appends "at line L column C", which means nothing to callers.
fn without_position(err: &serde_json::Error) -> String {
    let message = err.to_string();
    match message.rsplit_once(" at line ") {
        Some((head, _)) => head.to_string(),
        None => message,
    }
}
