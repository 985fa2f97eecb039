use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::category::{Category, CreateCategory, UpdateCategory};
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

async fn check(
    state: &AppState,
    payload: &CreateCategory,
    except: Option<Uuid>,
) -> Result<(), ApiError> {
    let mut errors = payload.validate().err().unwrap_or_default();
    if Category::name_taken(state.pool(), &payload.name, except).await? {
        errors.add("name", references::taken("name"));
    }
    Ok(errors.into_result()?)
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Category>>>, ApiError> {
    user.ensure("categorias.view")?;
    let page = state.page(&query)?;
    let categories = Category::list(state.pool(), &page).await?;
    let total = Category::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(categories, total)))
}

/// GET /api/categories/{id}
pub async fn get_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    user.ensure("categorias.view")?;
    let category = Category::find_by_id(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    user.ensure("categorias.create")?;
    check(&state, &payload, None).await?;
    let category = Category::create(state.pool(), &payload, Uuid::new_v4()).await?;
    info!(user_id = %user.id(), category_id = %category.id, "Created category");
    Ok(ResponseJson(ApiResponse::success_with_message(
        category,
        "Category created.",
    )))
}

/// PUT /api/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    user.ensure("categorias.edit")?;
    if Category::find_by_id(state.pool(), id).await?.is_none() {
        return Err(ApiError::NotFound("Category"));
    }
    check(&state, &payload, Some(id)).await?;
    let category = Category::update(state.pool(), id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Category"))?;
    info!(user_id = %user.id(), category_id = %id, "Updated category");
    Ok(ResponseJson(ApiResponse::success_with_message(
        category,
        "Category updated.",
    )))
}

/// DELETE /api/categories/{id}
pub async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("categorias.delete")?;
    if Category::find_by_id(state.pool(), id).await?.is_none() {
        return Err(ApiError::NotFound("Category"));
    }
    let products = Category::product_count(state.pool(), id).await?;
    if products > 0 {
        return Err(ApiError::Conflict(format!(
            "The category still has {products} product(s)."
        )));
    }
    Category::delete(state.pool(), id).await?;
    info!(user_id = %user.id(), category_id = %id, "Deleted category");
    Ok(ResponseJson(ApiResponse::message("Category deleted.")))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}
