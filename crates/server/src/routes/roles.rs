use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::role::{CreateRole, Role, RoleSummary, RoleWithPermissions, UpdateRole};
use tracing::info;
use utils::{pagination::ListQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::CurrentUser,
};

/// GET /api/roles
pub async fn list_roles(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<RoleSummary>>>, ApiError> {
    user.ensure("roles.view")?;
    let page = state.page(&query)?;
    let roles = Role::list(state.pool(), &page).await?;
    let total = Role::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(roles, total)))
}

/// GET /api/roles/{id}
pub async fn get_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<RoleWithPermissions>>, ApiError> {
    user.ensure("roles.view")?;
    let role = Role::find_with_permissions(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Role"))?;
    Ok(ResponseJson(ApiResponse::success(role)))
}

/// POST /api/roles
pub async fn create_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateRole>,
) -> Result<ResponseJson<ApiResponse<RoleWithPermissions>>, ApiError> {
    user.ensure("roles.create")?;
    let role = state.roles().create(&payload).await?;
    info!(user_id = %user.id(), role_id = %role.role.id, "Created role");
    Ok(ResponseJson(ApiResponse::success_with_message(role, "Role created.")))
}

/// PUT /api/roles/{id}
/// Replaces the role's permission set
pub async fn update_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRole>,
) -> Result<ResponseJson<ApiResponse<RoleWithPermissions>>, ApiError> {
    user.ensure("roles.edit")?;
    let role = state.roles().update(id, &payload).await?;
    info!(
        user_id = %user.id(),
        role_id = %id,
        permissions = role.permissions.len(),
        "Updated role"
    );
    Ok(ResponseJson(ApiResponse::success_with_message(role, "Role updated.")))
}

/// DELETE /api/roles/{id}
pub async fn delete_role(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("roles.delete")?;
    state.roles().delete(id).await?;
    info!(user_id = %user.id(), role_id = %id, "Deleted role");
    Ok(ResponseJson(ApiResponse::message("Role deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{id}", get(get_role).put(update_role).delete(delete_role))
}
