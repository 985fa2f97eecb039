use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use serde::Serialize;
use services::services::{
    attendance::AttendanceError, auth::AuthError, database_validator::DatabaseValidationError,
    obras::ObraError, purchase_orders::PurchaseOrderError, quotations::QuotationError,
    requirements::RequirementError, roles::RoleError, trainings::TrainingError, users::UserError,
};
use thiserror::Error;
use tracing::{error, warn};
use ts_rs::TS;
use utils::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Obra(#[from] ObraError),
    #[error(transparent)]
    Requirement(#[from] RequirementError),
    #[error(transparent)]
    PurchaseOrder(#[from] PurchaseOrderError),
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Quotation(#[from] QuotationError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Role(#[from] RoleError),
    #[error(transparent)]
    DatabaseValidation(#[from] DatabaseValidationError),
    #[error("{0} not found.")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("Unauthenticated.")]
    Unauthorized,
    #[error("This action is unauthorized.")]
    Forbidden,
    #[error("{0}")]
    InvalidBody(String),
    #[error("{0}")]
    InvalidQuery(String),
}

/// Body of every failed request
#[derive(Debug, Clone, Serialize, TS)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

enum Failure<'a> {
    Invalid(&'a ValidationErrors),
    /// Extractor rejection reported against a single pseudo-field
    Rejected(&'static str),
    Status(StatusCode, &'static str),
    Database(&'a sqlx::Error),
    Internal,
}

const NOT_FOUND: Failure<'static> = Failure::Status(StatusCode::NOT_FOUND, "not_found");
const CONFLICT: Failure<'static> = Failure::Status(StatusCode::CONFLICT, "conflict");
const UNAUTHENTICATED: Failure<'static> =
    Failure::Status(StatusCode::UNAUTHORIZED, "unauthenticated");

impl ApiError {
    fn failure(&self) -> Failure<'_> {
        match self {
            ApiError::Validation(errors) => Failure::Invalid(errors),
            ApiError::Database(err) => Failure::Database(err),
            ApiError::NotFound(_) => NOT_FOUND,
            ApiError::Conflict(_) => CONFLICT,
            ApiError::Unauthorized => UNAUTHENTICATED,
            ApiError::Forbidden => Failure::Status(StatusCode::FORBIDDEN, "forbidden"),
            ApiError::InvalidBody(_) => Failure::Rejected("body"),
            ApiError::InvalidQuery(_) => Failure::Rejected("query"),
            ApiError::Auth(err) => match err {
                AuthError::Database(err) => Failure::Database(err),
                AuthError::InvalidCredentials | AuthError::InvalidToken => UNAUTHENTICATED,
                AuthError::Hash(_) | AuthError::Encode(_) => Failure::Internal,
            },
            ApiError::Obra(err) => match err {
                ObraError::Database(err) => Failure::Database(err),
                ObraError::Validation(errors) => Failure::Invalid(errors),
                ObraError::NotFound => NOT_FOUND,
                ObraError::Referenced(_) => CONFLICT,
            },
            ApiError::Requirement(err) => match err {
                RequirementError::Database(err) => Failure::Database(err),
                RequirementError::Validation(errors) => Failure::Invalid(errors),
                RequirementError::NotFound => NOT_FOUND,
                RequirementError::NotPending(_) => CONFLICT,
            },
            ApiError::PurchaseOrder(err) => match err {
                PurchaseOrderError::Database(err) => Failure::Database(err),
                PurchaseOrderError::Validation(errors) => Failure::Invalid(errors),
                PurchaseOrderError::NotFound => NOT_FOUND,
                PurchaseOrderError::InvalidTransition { .. }
                | PurchaseOrderError::NotDraft
                | PurchaseOrderError::NotDeletable => CONFLICT,
            },
            ApiError::Attendance(err) => match err {
                AttendanceError::Database(err) => Failure::Database(err),
                AttendanceError::Validation(errors) => Failure::Invalid(errors),
                AttendanceError::NotFound | AttendanceError::DiscountNotFound => NOT_FOUND,
            },
            ApiError::Training(err) => match err {
                TrainingError::Database(err) => Failure::Database(err),
                TrainingError::Validation(errors) => Failure::Invalid(errors),
                TrainingError::NotFound | TrainingError::AttendeeNotFound => NOT_FOUND,
            },
            ApiError::Quotation(err) => match err {
                QuotationError::Database(err) => Failure::Database(err),
                QuotationError::Validation(errors) => Failure::Invalid(errors),
                QuotationError::NotFound => NOT_FOUND,
                QuotationError::InvalidTransition { .. } | QuotationError::NotDraft => CONFLICT,
            },
            ApiError::User(err) => match err {
                UserError::Database(err) => Failure::Database(err),
                UserError::Validation(errors) => Failure::Invalid(errors),
                UserError::Auth(AuthError::Database(err)) => Failure::Database(err),
                UserError::Auth(_) => Failure::Internal,
                UserError::NotFound => NOT_FOUND,
                UserError::SelfDelete => CONFLICT,
            },
            ApiError::Role(err) => match err {
                RoleError::Database(err) => Failure::Database(err),
                RoleError::Validation(errors) => Failure::Invalid(errors),
                RoleError::NotFound => NOT_FOUND,
                RoleError::InUse(_) | RoleError::AdminRole => CONFLICT,
            },
            ApiError::DatabaseValidation(DatabaseValidationError::Database(err)) => {
                Failure::Database(err)
            }
        }
    }
}

impl ErrorBody {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            message: message.into(),
            errors: None,
        }
    }

    fn validation(errors: &ValidationErrors) -> Self {
        Self {
            errors: Some(errors.fields().clone()),
            ..Self::new("validation_failed", errors.summary())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.failure() {
            Failure::Invalid(errors) => (StatusCode::UNPROCESSABLE_ENTITY, ErrorBody::validation(errors)),
            Failure::Rejected(field) => {
                let errors = ValidationErrors::single(field, self.to_string());
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorBody::validation(&errors))
            }
            Failure::Status(status, kind) => (status, ErrorBody::new(kind, self.to_string())),
            Failure::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, ErrorBody::new("not_found", "Record not found."))
            }
            Failure::Database(err) if db::is_unique_violation(err) => {
                warn!(error = %err, "Unique constraint rejected a write");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody::new("validation_failed", "The record conflicts with an existing one."),
                )
            }
            Failure::Database(err) if db::is_foreign_key_violation(err) => {
                warn!(error = %err, "Foreign key constraint rejected a write");
                (
                    StatusCode::CONFLICT,
                    ErrorBody::new("conflict", "The record is referenced by other records."),
                )
            }
            Failure::Database(err) => {
                error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("server_error", "Internal server error."),
                )
            }
            Failure::Internal => {
                error!(error = %self, "Unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("server_error", "Internal server error."),
                )
            }
        };
        (status, ResponseJson(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidQuery(rejection.body_text())
    }
}

/// Malformed ids can never match a row
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound("Resource")
    }
}
