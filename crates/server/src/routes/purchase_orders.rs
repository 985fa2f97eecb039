use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::purchase_order::{
    ChangePurchaseOrderStatus, CreatePurchaseOrder, PurchaseOrder, PurchaseOrderDetail,
    PurchaseOrderSummary, UpdatePurchaseOrder,
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

/// GET /api/purchase-orders
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<ObraFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<PurchaseOrderSummary>>>, ApiError> {
    user.ensure("ordenes_compra.view")?;
    let page = state.page(&query)?;
    let orders = PurchaseOrder::list(state.pool(), &page, filter.obra_id).await?;
    let total = PurchaseOrder::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(orders, total)))
}

/// GET /api/purchase-orders/{id}
pub async fn get_purchase_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<PurchaseOrderDetail>>, ApiError> {
    user.ensure("ordenes_compra.view")?;
    let detail = PurchaseOrder::find_detail(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Purchase order"))?;
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// POST /api/purchase-orders
pub async fn create_purchase_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreatePurchaseOrder>,
) -> Result<ResponseJson<ApiResponse<PurchaseOrderDetail>>, ApiError> {
    user.ensure("ordenes_compra.create")?;
    let detail = state.purchase_orders().create(&payload).await?;
    info!(
        user_id = %user.id(),
        purchase_order_id = %detail.purchase_order.id,
        number = %detail.purchase_order.number,
        total = detail.purchase_order.total,
        "Created purchase order"
    );
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Purchase order created.",
    )))
}

/// PUT /api/purchase-orders/{id}
pub async fn update_purchase_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseOrder>,
) -> Result<ResponseJson<ApiResponse<PurchaseOrderDetail>>, ApiError> {
    user.ensure("ordenes_compra.edit")?;
    let detail = state.purchase_orders().update(id, &payload).await?;
    info!(user_id = %user.id(), purchase_order_id = %id, "Updated purchase order");
    Ok(ResponseJson(ApiResponse::success_with_message(
        detail,
        "Purchase order updated.",
    )))
}

/// POST /api/purchase-orders/{id}/status
pub async fn change_purchase_order_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangePurchaseOrderStatus>,
) -> Result<ResponseJson<ApiResponse<PurchaseOrderDetail>>, ApiError> {
    user.ensure("ordenes_compra.edit")?;
    let detail = state
        .purchase_orders()
        .change_status(id, payload.status)
        .await?;
    info!(
        user_id = %user.id(),
        purchase_order_id = %id,
        status = %detail.purchase_order.status,
        "Changed purchase order status"
    );
    Ok(ResponseJson(ApiResponse::success(detail)))
}

/// DELETE /api/purchase-orders/{id}
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("ordenes_compra.delete")?;
    state.purchase_orders().delete(id).await?;
    info!(user_id = %user.id(), purchase_order_id = %id, "Deleted purchase order");
    Ok(ResponseJson(ApiResponse::message("Purchase order deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/purchase-orders",
            get(list_purchase_orders).post(create_purchase_order),
        )
        .route(
            "/purchase-orders/{id}",
            get(get_purchase_order)
                .put(update_purchase_order)
                .delete(delete_purchase_order),
        )
        .route(
            "/purchase-orders/{id}/status",
            post(change_purchase_order_status),
        )
}
