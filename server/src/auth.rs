use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use todo_core::User;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_caller_id(req: &Request) -> Option<Uuid> {
    // 1) X-User-Id: <uuid>
    if let Some(value) = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Uuid::parse_str(value).ok();
    }

    // 2) Authorization: Bearer <uuid>
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
        .and_then(|token| Uuid::parse_str(token).ok())
}

pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(caller) = extract_caller_id(&req) else {
        tracing::warn!(
            path = %req.uri().path(),
            method = %req.method(),
            reason = "missing_or_malformed_caller",
            "Unauthorized API request"
        );
        return ApiError::Unauthorized.into_response();
    };

    match state.repo.find_user(caller).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Ok(None) => {
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                caller = %caller,
                reason = "unknown_user",
                "Unauthorized API request"
            );
            ApiError::Unauthorized.into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}
