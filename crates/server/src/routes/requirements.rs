use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::requirement::{
    CreateRequirement, Requirement, RequirementDetail, RequirementSummary, UpdateRequirement,
};
use tracing::info;
use utils::{pagination::ListQuery, response::ApiResponse};
use uuid::Uuid;

use super::ObraFilter;
use crate::{
    AppState,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::CurrentUser,
};

/// GET /api/requirements
pub async fn list_requirements(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<ObraFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<RequirementSummary>>>, ApiError> {
    user.ensure("requerimientos.view")?;
    let page = state.page(&query)?;
    let requirements = Requirement::list(state.pool(), &page, filter.obra_id).await?;
    let total = Requirement::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(requirements, total)))
}

/// GET /api/requirements/{id}
/// Header plus its lines
pub async fn get_requirement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<RequirementDetail>>, ApiError> {
    user.ensure("requerimientos.view")?;
    let detail = Requirement::find_detail(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Requirement"))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// POST /api/requirements
pub async fn create_requirement(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateRequirement>,
) -> Result<ResponseJson<ApiResponse<RequirementDetail>>, ApiError> {
    user.ensure("requerimientos.create")?;
    let detail = state.requirements().create(&payload).await?;
    info!(
        user_id = %user.id(),
        requirement_id = %detail.requirement.id,
        number = %detail.requirement.number,
        "Created requirement"
    );
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Requirement created.",
    )))
}

/// PUT /api/requirements/{id}
pub async fn update_requirement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequirement>,
) -> Result<ResponseJson<ApiResponse<RequirementDetail>>, ApiError> {
    user.ensure("requerimientos.edit")?;
    let detail = state.requirements().update(id, &payload).await?;
    info!(user_id = %user.id(), requirement_id = %id, "Updated requirement");
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Requirement updated.",
    )))
}

/// DELETE /api/requirements/{id}
/// Only pending requirements can be removed; their lines go with them
pub async fn delete_requirement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("requerimientos.delete")?;
    state.requirements().delete(id).await?;
    info!(user_id = %user.id(), requirement_id = %id, "Deleted requirement");
    Ok(ResponseJson(ApiResponse::message("Requirement deleted.")))
}

/// POST /api/requirements/{id}/approve
pub async fn approve_requirement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<RequirementDetail>>, ApiError> {
    user.ensure("requerimientos.approve")?;
    let detail = state.requirements().approve(id).await?;
    info!(user_id = %user.id(), requirement_id = %id, "Approved requirement");
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Requirement approved.",
    )))
}

/// POST /api/requirements/{id}/reject
pub async fn reject_requirement(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<RequirementDetail>>, ApiError> {
    user.ensure("requerimientos.approve")?;
    let detail = state.requirements().reject(id).await?;
    info!(user_id = %user.id(), requirement_id = %id, "Rejected requirement");
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Requirement rejected.",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requirements", get(list_requirements).post(create_requirement))
        .route(
            "/requirements/{id}",
            get(get_requirement)
                .put(update_requirement)
                .delete(delete_requirement),
        )
        .route("/requirements/{id}/approve", post(approve_requirement))
        .route("/requirements/{id}/reject", post(reject_requirement))
}
