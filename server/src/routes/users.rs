use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use todo_core::{RegisterUser, User};

use crate::{AppState, error::ApiError, extract::ValidJson, response::ApiResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: User,
}

/// Registration is open; the returned id is what callers present as
/// `X-User-Id` afterwards.
pub async fn register_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterUser>,
) -> Result<(StatusCode, Json<ApiResponse<UserData>>), ApiError> {
    let input = payload.validate()?;
    let user = state.repo.register_user(input, Utc::now()).await?;
    tracing::info!(user_id = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            "User registered successfully",
            UserData { user },
        )),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(register_user))
}
