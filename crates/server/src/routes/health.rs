use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use serde::Serialize;
use services::services::database_validator::{DatabaseValidator, ValidationResult};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, TS)]
pub struct HealthStatus {
    /// `ok`, or `degraded` when the schema is behind the embedded migrations
    pub status: String,
    pub database: ValidationResult,
}

pub async fn health(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<HealthStatus>>, ApiError> {
    let database = DatabaseValidator::new(state.pool().clone()).validate().await?;
    let status = if database.is_ok() { "ok" } else { "degraded" };
    Ok(ResponseJson(ApiResponse::success(HealthStatus {
        status: status.to_string(),
        database,
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
