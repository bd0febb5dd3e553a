use axum::Json;
use serde::{Deserialize, Serialize};

use crate::response::ApiResponse;

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
}

pub async fn health_check() -> Json<ApiResponse<Health>> {
    Json(ApiResponse::success(Health {
        status: "ok".to_string(),
    }))
}
