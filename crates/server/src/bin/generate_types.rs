//! Prints TypeScript declarations for every wire type, for the admin frontend.
//!
//! `cargo run --bin generate_types > frontend/src/types/api.ts`

use ts_rs::TS;

fn main() {
    let decls = [
        utils::response::ApiResponse::<()>::decl(),
        utils::pagination::ListQuery::decl(),
        server::error::ErrorBody::decl(),
        server::routes::health::HealthStatus::decl(),
        services::services::database_validator::ValidationResult::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::auth::LoginResponse::decl(),
        services::services::auth::AuthenticatedUser::decl(),
        services::services::permissions::PermissionGroup::decl(),
        services::services::obras::ObraSummary::decl(),
        db::models::category::Category::decl(),
        db::models::category::CreateCategory::decl(),
        db::models::product::Product::decl(),
        db::models::product::ProductWithCategory::decl(),
        db::models::product::CreateProduct::decl(),
        db::models::obra::ObraStatus::decl(),
        db::models::obra::Obra::decl(),
        db::models::obra::CreateObra::decl(),
        db::models::obra::ObraReferences::decl(),
        db::models::position::Position::decl(),
        db::models::position::CreatePosition::decl(),
        db::models::worker::Worker::decl(),
        db::models::worker::WorkerWithPosition::decl(),
        db::models::worker::CreateWorker::decl(),
        db::models::requirement::RequirementStatus::decl(),
        db::models::requirement::Requirement::decl(),
        db::models::requirement::RequirementSummary::decl(),
        db::models::requirement::RequirementItem::decl(),
        db::models::requirement::RequirementDetail::decl(),
        db::models::requirement::CreateRequirementItem::decl(),
        db::models::requirement::CreateRequirement::decl(),
        db::models::purchase_order::Currency::decl(),
        db::models::purchase_order::PurchaseOrderStatus::decl(),
        db::models::purchase_order::PurchaseOrder::decl(),
        db::models::purchase_order::PurchaseOrderSummary::decl(),
        db::models::purchase_order::PurchaseOrderItem::decl(),
        db::models::purchase_order::PurchaseOrderDetail::decl(),
        db::models::purchase_order::CreatePurchaseOrderItem::decl(),
        db::models::purchase_order::CreatePurchaseOrder::decl(),
        db::models::purchase_order::ChangePurchaseOrderStatus::decl(),
        db::models::attendance::AttendanceStatus::decl(),
        db::models::attendance::Attendance::decl(),
        db::models::attendance::AttendanceRow::decl(),
        db::models::attendance::CreateAttendance::decl(),
        db::models::attendance::AttendanceFilter::decl(),
        db::models::attendance::AttendanceDiscount::decl(),
        db::models::attendance::CreateAttendanceDiscount::decl(),
        db::models::attendance::DiscountSummaryQuery::decl(),
        db::models::attendance::DiscountSummary::decl(),
        db::models::training::TrainingType::decl(),
        db::models::training::Training::decl(),
        db::models::training::TrainingSummary::decl(),
        db::models::training::TrainingAttendee::decl(),
        db::models::training::TrainingDetail::decl(),
        db::models::training::CreateTraining::decl(),
        db::models::training::AddTrainingAttendee::decl(),
        db::models::training::UpdateTrainingAttendee::decl(),
        db::models::quotation::QuotationVariant::decl(),
        db::models::quotation::QuotationStatus::decl(),
        db::models::quotation::Quotation::decl(),
        db::models::quotation::QuotationItem::decl(),
        db::models::quotation::QuotationDetail::decl(),
        db::models::quotation::CreateQuotationItem::decl(),
        db::models::quotation::CreateQuotation::decl(),
        db::models::quotation::ChangeQuotationStatus::decl(),
        db::models::role::Role::decl(),
        db::models::role::RoleSummary::decl(),
        db::models::role::RoleWithPermissions::decl(),
        db::models::role::CreateRole::decl(),
        db::models::user::User::decl(),
        db::models::user::UserWithRole::decl(),
        db::models::user::CreateUser::decl(),
        db::models::user::UpdateUser::decl(),
    ];

    println!("// This file was generated by `generate_types`. Do not edit it by hand.\n");
    for decl in decls {
        println!("export {decl}\n");
    }
}
