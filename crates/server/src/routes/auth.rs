use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use services::services::{
    auth::{AuthenticatedUser, LoginRequest, LoginResponse},
    permissions::{self, PermissionGroup},
};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, extract::Json, middleware::CurrentUser};

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    let response = state.auth().login(&payload).await?;
    Ok(ResponseJson(ApiResponse::success(response)))
}

/// GET /api/auth/me
pub async fn me(user: CurrentUser) -> ResponseJson<ApiResponse<AuthenticatedUser>> {
    ResponseJson(ApiResponse::success(user.0))
}

/// GET /api/permissions
/// The catalog the role editor picks from
pub async fn list_permissions(
    user: CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<PermissionGroup>>>, ApiError> {
    user.ensure("roles.view")?;
    Ok(ResponseJson(ApiResponse::success(permissions::catalog())))
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/permissions", get(list_permissions))
}
