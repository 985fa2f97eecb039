use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::quotation::{
    ChangeQuotationStatus, CreateQuotation, Quotation, QuotationDetail, QuotationVariant,
    UpdateQuotation,
};
use serde::Deserialize;
use tracing::info;
use utils::{pagination::ListQuery, response::ApiResponse};
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    extract::{Json, Path, Query},
    middleware::CurrentUser,
};

#[derive(Debug, Default, Deserialize)]
pub struct VariantFilter {
    pub variant: Option<QuotationVariant>,
}

/// GET /api/quotations
pub async fn list_quotations(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<VariantFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<Quotation>>>, ApiError> {
    user.ensure("cotizaciones.view")?;
    let page = state.page(&query)?;
    let quotations = Quotation::list(state.pool(), &page, filter.variant).await?;
    let total = Quotation::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(quotations, total)))
}

/// GET /api/quotations/{id}
pub async fn get_quotation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<QuotationDetail>>, ApiError> {
    user.ensure("cotizaciones.view")?;
    let detail = Quotation::find_detail(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Quotation"))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// POST /api/quotations
pub async fn create_quotation(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateQuotation>,
) -> Result<ResponseJson<ApiResponse<QuotationDetail>>, ApiError> {
    user.ensure("cotizaciones.create")?;
    let detail = state.quotations().create(&payload).await?;
    info!(
        user_id = %user.id(),
        quotation_id = %detail.quotation.id,
        number = %detail.quotation.number,
        total = detail.quotation.total,
        "Created quotation"
    );
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Quotation created.",
    )))
}

/// PUT /api/quotations/{id}
pub async fn update_quotation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuotation>,
) -> Result<ResponseJson<ApiResponse<QuotationDetail>>, ApiError> {
    user.ensure("cotizaciones.edit")?;
    let detail = state.quotations().update(id, &payload).await?;
    info!(user_id = %user.id(), quotation_id = %id, total = detail.quotation.total, "Updated quotation");
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Quotation updated.",
    )))
}

/// POST /api/quotations/{id}/status
pub async fn change_quotation_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeQuotationStatus>,
) -> Result<ResponseJson<ApiResponse<QuotationDetail>>, ApiError> {
    user.ensure("cotizaciones.edit")?;
    let detail = state.quotations().change_status(id, payload.status).await?;
    info!(
        user_id = %user.id(),
        quotation_id = %id,
        status = %detail.quotation.status,
        "Changed quotation status"
    );
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// DELETE /api/quotations/{id}
pub async fn delete_quotation(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("cotizaciones.delete")?;
    state.quotations().delete(id).await?;
    info!(user_id = %user.id(), quotation_id = %id, "Deleted quotation");
    Ok(ResponseJson(ApiResponse::message("Quotation deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotations", get(list_quotations).post(create_quotation))
        .route(
            "/quotations/{id}",
            get(get_quotation)
                .put(update_quotation)
                .delete(delete_quotation),
        )
        .route("/quotations/{id}/status", post(change_quotation_status))
}
