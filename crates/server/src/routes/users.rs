use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::user::{CreateUser, UpdateUser, User, UserWithRole};
use tracing::info;
use utils::{pagination::ListQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::CurrentUser,
};

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<UserWithRole>>>, ApiError> {
    user.ensure("usuarios.view")?;
    let page = state.page(&query)?;
    let users = User::list(state.pool(), &page).await?;
    let total = User::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(users, total)))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<UserWithRole>>, ApiError> {
    user.ensure("usuarios.view")?;
    let found = User::find_with_role(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(ResponseJson(ApiResponse::success(found)))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateUser>,
) -> Result<ResponseJson<ApiResponse<UserWithRole>>, ApiError> {
    user.ensure("usuarios.create")?;
    let created = state.users().create(&payload).await?;
    info!(user_id = %user.id(), created_user_id = %created.user.id, "Created user");
    Ok(ResponseJson(ApiResponse::success_with_message(
        created,
        "User created.",
    )))
}

/// PUT /api/users/{id}
/// A blank or missing password keeps the current one
pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> Result<ResponseJson<ApiResponse<UserWithRole>>, ApiError> {
    user.ensure("usuarios.edit")?;
    let updated = state.users().update(id, &payload).await?;
    info!(user_id = %user.id(), updated_user_id = %id, "Updated user");
    Ok(ResponseJson(ApiResponse::success_with_message(
        updated,
        "User updated.",
    )))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("usuarios.delete")?;
    state.users().delete(id, user.id()).await?;
    info!(user_id = %user.id(), deleted_user_id = %id, "Deleted user");
    Ok(ResponseJson(ApiResponse::message("User deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
}
