use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::{
    product::{CreateProduct, Product, ProductWithCategory, UpdateProduct},
    row_exists,
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

async fn check(state: &AppState, payload: &CreateProduct, except: Option<Uuid>) -> Result<(), ApiError> {
    let mut errors = payload.validate().err().unwrap_or_default();
    if !row_exists(state.pool(), "categories", payload.category_id).await? {
        errors.add("category_id", references::invalid("category_id"));
    }
    if Product::code_taken(state.pool(), &payload.code, except).await? {
        errors.add("code", references::taken("code"));
    }
    Ok(errors.into_result()?)
}

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ProductWithCategory>>>, ApiError> {
    user.ensure("productos.view")?;
    let page = state.page(&query)?;
    let products = Product::list(state.pool(), &page).await?;
    let total = Product::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(products, total)))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Product>>, ApiError> {
    user.ensure("productos.view")?;
    let product = Product::find_by_id(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    Ok(ResponseJson(ApiResponse::success(product)))
}

/// POST /api/products
pub async fn create_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateProduct>,
) -> Result<ResponseJson<ApiResponse<Product>>, ApiError> {
    user.ensure("productos.create")?;
    check(&state, &payload, None).await?;
    let product = Product::create(state.pool(), &payload, Uuid::new_v4()).await?;
    info!(user_id = %user.id(), product_id = %product.id, code = %product.code, "Created product");
    Ok(ResponseJson(ApiResponse::success_with_message(product, "Product created.")))
}

/// PUT /api/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProduct>,
) -> Result<ResponseJson<ApiResponse<Product>>, ApiError> {
    user.ensure("productos.edit")?;
    if Product::find_by_id(state.pool(), id).await?.is_none() {
        return Err(ApiError::NotFound("Product"));
    }
    check(&state, &payload, Some(id)).await?;
    let product = Product::update(state.pool(), id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Product"))?;
    info!(user_id = %user.id(), product_id = %id, "Updated product");
    Ok(ResponseJson(ApiResponse::success_with_message(product, "Product updated.")))
}

/// DELETE /api/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("productos.delete")?;
    if Product::find_by_id(state.pool(), id).await?.is_none() {
        return Err(ApiError::NotFound("Product"));
    }
    if Product::usage_count(state.pool(), id).await? > 0 {
        return Err(ApiError::Conflict(
            "The product is used by requirements or purchase orders.".to_string(),
        ));
    }
    Product::delete(state.pool(), id).await?;
    info!(user_id = %user.id(), product_id = %id, "Deleted product");
    Ok(ResponseJson(ApiResponse::message("Product deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
}
