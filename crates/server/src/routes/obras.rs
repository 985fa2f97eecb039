use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::obra::{CreateObra, Obra, UpdateObra};
use services::services::obras::ObraSummary;
use tracing::info;
use utils::{pagination::ListQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::CurrentUser,
};

/// GET /api/obras
pub async fn list_obras(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Obra>>>, ApiError> {
    user.ensure("obras.view")?;
    let page = state.page(&query)?;
    let obras = Obra::list(state.pool(), &page).await?;
    let total = Obra::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(obras, total)))
}

/// GET /api/obras/{id}
pub async fn get_obra(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Obra>>, ApiError> {
    user.ensure("obras.view")?;
    let obra = Obra::find_by_id(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Obra"))?;
    Ok(ResponseJson(ApiResponse::success(obra)))
}

/// GET /api/obras/{id}/summary
/// Referencing rows and committed purchase-order spend
pub async fn get_obra_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ObraSummary>>, ApiError> {
    user.ensure("obras.view")?;
    let summary = state.obras().summary(id).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

/// POST /api/obras
pub async fn create_obra(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateObra>,
) -> Result<ResponseJson<ApiResponse<Obra>>, ApiError> {
    user.ensure("obras.create")?;
    let obra = state.obras().create(&payload).await?;
    info!(user_id = %user.id(), obra_id = %obra.id, code = %obra.code, "Created obra");
    Ok(ResponseJson(ApiResponse::success_with_message(obra, "Obra created.")))
}

/// PUT /api/obras/{id}
pub async fn update_obra(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateObra>,
) -> Result<ResponseJson<ApiResponse<Obra>>, ApiError> {
    user.ensure("obras.edit")?;
    let obra = state.obras().update(id, &payload).await?;
    info!(user_id = %user.id(), obra_id = %id, status = %obra.status, "Updated obra");
    Ok(ResponseJson(ApiResponse::success_with_message(obra, "Obra updated.")))
}

/// DELETE /api/obras/{id}
pub async fn delete_obra(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("obras.delete")?;
    state.obras().delete(id).await?;
    info!(user_id = %user.id(), obra_id = %id, "Deleted obra");
    Ok(ResponseJson(ApiResponse::message("Obra deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/obras", get(list_obras).post(create_obra))
        .route("/obras/{id}", get(get_obra).put(update_obra).delete(delete_obra))
        .route("/obras/{id}/summary", get(get_obra_summary))
}
