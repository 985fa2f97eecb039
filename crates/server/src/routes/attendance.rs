use axum::{Router, extract::State, response::Json as ResponseJson, routing::{delete, get}};
use db::models::attendance::{
    Attendance, AttendanceDiscount, AttendanceFilter, AttendanceRow, CreateAttendance,
    CreateAttendanceDiscount, DiscountSummary, DiscountSummaryQuery, UpdateAttendance,
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

/// GET /api/attendance
/// Accepts `obra_id` and `date` on top of the usual window and search
pub async fn list_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
    Query(filter): Query<AttendanceFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<AttendanceRow>>>, ApiError> {
    user.ensure("asistencias.view")?;
    let page = state.page(&query)?;
    let rows = Attendance::list(state.pool(), &page, &filter).await?;
    let total = Attendance::count(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::paginated(rows, total)))
}

/// GET /api/attendance/{id}
pub async fn get_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Attendance>>, ApiError> {
    user.ensure("asistencias.view")?;
    let attendance = Attendance::find_by_id(state.pool(), id)
        .await?
        .ok_or(ApiError::NotFound("Attendance"))?;
    Ok(ResponseJson(ApiResponse::success(attendance)))
}

/// POST /api/attendance
pub async fn create_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateAttendance>,
) -> Result<ResponseJson<ApiResponse<Attendance>>, ApiError> {
    user.ensure("asistencias.create")?;
    let attendance = state.attendance().create(&payload).await?;
    info!(user_id = %user.id(), attendance_id = %attendance.id, "Created attendance");
    Ok(ResponseJson(ApiResponse::success_with_message(
        attendance,
        "Attendance recorded.",
    )))
}

/// PUT /api/attendance/{id}
pub async fn update_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAttendance>,
) -> Result<ResponseJson<ApiResponse<Attendance>>, ApiError> {
    user.ensure("asistencias.edit")?;
    let attendance = state.attendance().update(id, &payload).await?;
    info!(user_id = %user.id(), attendance_id = %id, "Updated attendance");
    Ok(ResponseJson(ApiResponse::success_with_message(
        attendance,
        "Attendance updated.",
    )))
}

/// DELETE /api/attendance/{id}
/// Discounts on the record are removed with it
pub async fn delete_attendance(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("asistencias.delete")?;
    if Attendance::delete(state.pool(), id).await? == 0 {
        return Err(ApiError::NotFound("Attendance"));
    }
    info!(user_id = %user.id(), attendance_id = %id, "Deleted attendance");
    Ok(ResponseJson(ApiResponse::message("Attendance deleted.")))
}

/// GET /api/attendance/{id}/discounts
pub async fn list_discounts(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<AttendanceDiscount>>>, ApiError> {
    user.ensure("asistencias.discounts")?;
    let discounts = state.attendance().discounts(id).await?;
    Ok(ResponseJson(ApiResponse::success(discounts)))
}

/// POST /api/attendance/{id}/discounts
pub async fn add_discount(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateAttendanceDiscount>,
) -> Result<ResponseJson<ApiResponse<AttendanceDiscount>>, ApiError> {
    user.ensure("asistencias.discounts")?;
    let discount = state.attendance().add_discount(id, &payload).await?;
    info!(
        user_id = %user.id(),
        attendance_id = %id,
        discount_id = %discount.id,
        amount = discount.amount,
        "Added discount"
    );
    Ok(ResponseJson(ApiResponse::success_with_message(
        discount,
        "Discount added.",
    )))
}

/// DELETE /api/attendance/{id}/discounts/{discount_id}
pub async fn remove_discount(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((id, discount_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    user.ensure("asistencias.discounts")?;
    state.attendance().remove_discount(id, discount_id).await?;
    info!(user_id = %user.id(), attendance_id = %id, discount_id = %discount_id, "Removed discount");
    Ok(ResponseJson(ApiResponse::message("Discount removed.")))
}

/// GET /api/attendance/discounts/summary?worker_id=&from=&to=
pub async fn discount_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<DiscountSummaryQuery>,
) -> Result<ResponseJson<ApiResponse<DiscountSummary>>, ApiError> {
    user.ensure("asistencias.discounts")?;
    let summary = AttendanceDiscount::summary(state.pool(), &query).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attendance", get(list_attendance).post(create_attendance))
        .route("/attendance/discounts/summary", get(discount_summary))
        .route(
            "/attendance/{id}",
            get(get_attendance).put(update_attendance).delete(delete_attendance),
        )
        .route(
            "/attendance/{id}/discounts",
            get(list_discounts).post(add_discount),
        )
        .route(
            "/attendance/{id}/discounts/{discount_id}",
            delete(remove_discount),
        )
}
