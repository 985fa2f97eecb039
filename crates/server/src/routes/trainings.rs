use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::models::training::{
    AddTrainingAttendee, CreateTraining, Training, TrainingAttendee, TrainingDetail,
    TrainingSummary, UpdateTraining, UpdateTrainingAttendee,
};
use tracing::info;
use utils::{pagination::ListQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::CurrentUser,
};

/// GET /api/trainings
pub async fn list_trainings(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<TrainingSummary>>>, ApiError> {
    user.ensure("capacitaciones.view")?;
    let page = state.page(&query)?;
    let trainings = Training::list(state.pool(), &page).await?;
    let total = Training::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(trainings, total)))
}

/// GET /api/trainings/{id}
pub async fn get_training(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TrainingDetail>>, ApiError> {
    user.ensure("capacitaciones.view")?;
    let detail = Training::find_detail(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Training"))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// POST /api/trainings
pub async fn create_training(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateTraining>,
) -> Result<ResponseJson<ApiResponse<TrainingDetail>>, ApiError> {
    user.ensure("capacitaciones.create")?;
    let detail = state.trainings().create(&payload).await?;
    info!(user_id = %user.id(), training_id = %detail.training.id, "Created training");
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Training created.",
    )))
}

/// PUT /api/trainings/{id}
pub async fn update_training(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTraining>,
) -> Result<ResponseJson<ApiResponse<TrainingDetail>>, ApiError> {
    user.ensure("capacitaciones.edit")?;
    let detail = state.trainings().update(id, &payload).await?;
    info!(user_id = %user.id(), training_id = %id, "Updated training");
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Training updated.",
    )))
}

/// DELETE /api/trainings/{id}
pub async fn delete_training(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("capacitaciones.delete")?;
    if Training::delete(state.pool(), id).await? == 0 {
        return Err(ApiError::NotFound("Training"));
    }
    info!(user_id = %user.id(), training_id = %id, "Deleted training");
    Ok(ResponseJson(ApiResponse::message("Training deleted.")))
}

/// GET /api/trainings/{id}/attendees
pub async fn list_attendees(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<TrainingAttendee>>>, ApiError> {
    user.ensure("capacitaciones.view")?;
    let attendees = state.trainings().attendees(id).await?;
    Ok(ResponseJson(ApiResponse::success(attendees)))
}

/// POST /api/trainings/{id}/attendees
pub async fn add_attendee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddTrainingAttendee>,
) -> Result<ResponseJson<ApiResponse<Vec<TrainingAttendee>>>, ApiError> {
    user.ensure("capacitaciones.edit")?;
    let attendees = state.trainings().add_attendee(id, &payload).await?;
    info!(user_id = %user.id(), training_id = %id, worker_id = %payload.worker_id, "Enrolled attendee");
    Ok(ResponseJson(ApiResponse::success(attendees)))
}

/// PATCH /api/trainings/{id}/attendees/{worker_id}
/// Marks attendance and records the evaluation score
pub async fn update_attendee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, worker_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTrainingAttendee>,
) -> Result<ResponseJson<ApiResponse<Vec<TrainingAttendee>>>, ApiError> {
    user.ensure("capacitaciones.edit")?;
    let attendees = state
        .trainings()
        .update_attendee(id, worker_id, &payload)
        .await?;
    info!(
        user_id = %user.id(),
        training_id = %id,
        worker_id = %worker_id,
        attended = payload.attended,
        "Graded attendee"
    );
    Ok(ResponseJson(ApiResponse::success(attendees)))
}

/// DELETE /api/trainings/{id}/attendees/{worker_id}
pub async fn remove_attendee(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, worker_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("capacitaciones.edit")?;
    state.trainings().remove_attendee(id, worker_id).await?;
    info!(user_id = %user.id(), training_id = %id, worker_id = %worker_id, "Removed attendee");
    Ok(ResponseJson(ApiResponse::message("Attendee removed.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trainings", get(list_trainings).post(create_training))
        .route(
            "/trainings/{id}",
            get(get_training).put(update_training).delete(delete_training),
        )
        .route(
            "/trainings/{id}/attendees",
            get(list_attendees).post(add_attendee),
        )
        .route(
            "/trainings/{id}/attendees/{worker_id}",
            patch(update_attendee).delete(remove_attendee),
        )
}
