use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::position::{CreatePosition, Position, UpdatePosition};
use services::services::references;
use tracing::info;
use utils::{pagination::ListQuery, response::ApiResponse, validation::Validate};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::CurrentUser,
};

async fn check(state: &AppState, payload: &CreatePosition, except: Option<Uuid>) -> Result<(), ApiError> {
    let mut errors = payload.validate().err().unwrap_or_default();
    if Position::name_taken(state.pool(), &payload.name, except).await? {
        errors.add("name", references::taken("name"));
    }
    Ok(errors.into_result()?)
}

/// GET /api/positions
pub async fn list_positions(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Position>>>, ApiError> {
    user.ensure("cargos.view")?;
    let page = state.page(&query)?;
    let positions = Position::list(state.pool(), &page).await?;
    let total = Position::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(positions, total)))
}

/// GET /api/positions/{id}
pub async fn get_position(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Position>>, ApiError> {
    user.ensure("cargos.view")?;
    let position = Position::find_by_id(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Position"))?;
    Ok(ResponseJson(ApiResponse::success(position)))
}

/// POST /api/positions
pub async fn create_position(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreatePosition>,
) -> Result<ResponseJson<ApiResponse<Position>>, ApiError> {
    user.ensure("cargos.create")?;
    check(&state, &payload, None).await?;
    let position = Position::create(state.pool(), &payload, Uuid::new_v4()).await?;
    info!(user_id = %user.id(), position_id = %position.id, "Created position");
    Ok(ResponseJson(ApiResponse::success_with_message(position, "Position created.")))
}

/// PUT /api/positions/{id}
pub async fn update_position(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePosition>,
) -> Result<ResponseJson<ApiResponse<Position>>, ApiError> {
    user.ensure("cargos.edit")?;
    if Position::find_by_id(state.pool(), id).await?.is_none() {
        return Err(ApiError::NotFound("Position"));
    }
    check(&state, &payload, Some(id)).await?;
    let position = Position::update(state.pool(), id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Position"))?;
    info!(user_id = %user.id(), position_id = %id, daily_rate = position.daily_rate, "Updated position");
    Ok(ResponseJson(ApiResponse::success_with_message(position, "Position updated.")))
}

/// DELETE /api/positions/{id}
pub async fn delete_position(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("cargos.delete")?;
    if Position::find_by_id(state.pool(), id).await?.is_none() {
        return Err(ApiError::NotFound("Position"));
    }
    let workers = Position::worker_count(state.pool(), id).await?;
    if workers > 0 {
        return Err(ApiError::Conflict(format!(
            "The position is assigned to {workers} worker(s)."
        )));
    }
    Position::delete(state.pool(), id).await?;
    info!(user_id = %user.id(), position_id = %id, "Deleted position");
    Ok(ResponseJson(ApiResponse::message("Position deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/positions", get(list_positions).post(create_position))
        .route(
            "/positions/{id}",
            get(get_position).put(update_position).delete(delete_position),
        )
}
