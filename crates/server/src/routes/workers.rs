use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::{
    row_exists,
    worker::{CreateWorker, UpdateWorker, Worker, WorkerWithPosition},
};
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

async fn check(state: &AppState, payload: &CreateWorker, except: Option<Uuid>) -> Result<(), ApiError> {
    let mut errors = payload.validate().err().unwrap_or_default();
    if !row_exists(state.pool(), "positions", payload.position_id).await? {
        errors.add("position_id", references::invalid("position_id"));
    }
    references::check_obra(state.pool(), "obra_id", payload.obra_id, &mut errors).await?;
    if Worker::document_taken(state.pool(), &payload.document_number, except).await? {
        errors.add("document_number", references::taken("document_number"));
    }
    Ok(errors.into_result()?)
}

async fn with_position(state: &AppState, id: Uuid) -> Result<WorkerWithPosition, ApiError> {
    Worker::find_with_position(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Worker"))
}

/// GET /api/workers
pub async fn list_workers(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkerWithPosition>>>, ApiError> {
    user.ensure("trabajadores.view")?;
    let page = state.page(&query)?;
    let workers = Worker::list(state.pool(), &page).await?;
    let total = Worker::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(workers, total)))
}

/// GET /api/workers/{id}
pub async fn get_worker(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<WorkerWithPosition>>, ApiError> {
    user.ensure("trabajadores.view")?;
    Ok(ResponseJson(ApiResponse::success(with_position(&state, id).await?)))
}

/// POST /api/workers
pub async fn create_worker(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateWorker>,
) -> Result<ResponseJson<ApiResponse<WorkerWithPosition>>, ApiError> {
    user.ensure("trabajadores.create")?;
    check(&state, &payload, None).await?;
    let worker = Worker::create(state.pool(), &payload, Uuid::new_v4()).await?;
    info!(user_id = %user.id(), worker_id = %worker.id, "Created worker");
    Ok(ResponseJson(ApiResponse::success_with_message(
        with_position(&state, worker.id).await?,
        "Worker created.",
    )))
}

/// PUT /api/workers/{id}
pub async fn update_worker(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWorker>,
) -> Result<ResponseJson<ApiResponse<WorkerWithPosition>>, ApiError> {
    user.ensure("trabajadores.edit")?;
    if !Worker::exists(state.pool(), id).await? {
        return Err(ApiError::NotFound("Worker"));
    }
    check(&state, &payload, Some(id)).await?;
    Worker::update(state.pool(), id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Worker"))?;
    info!(user_id = %user.id(), worker_id = %id, "Updated worker");
    Ok(ResponseJson(ApiResponse::success_with_message(
        with_position(&state, id).await?,
        "Worker updated.",
    )))
}

/// DELETE /api/workers/{id}
pub async fn delete_worker(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("trabajadores.delete")?;
    if !Worker::exists(state.pool(), id).await? {
        return Err(ApiError::NotFound("Worker"));
    }
    if Worker::usage_count(state.pool(), id).await? > 0 {
        return Err(ApiError::Conflict(
            "The worker has attendance records or training enrollments.".to_string(),
        ));
    }
    Worker::delete(state.pool(), id).await?;
    info!(user_id = %user.id(), worker_id = %id, "Deleted worker");
    Ok(ResponseJson(ApiResponse::message("Worker deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workers", get(list_workers).post(create_worker))
        .route(
            "/workers/{id}",
            get(get_worker).put(update_worker).delete(delete_worker),
        )
}
