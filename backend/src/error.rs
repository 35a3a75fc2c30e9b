//! Error handling for the charcoal distribution backend
//!
//! Every failure leaves the service as an `ErrorResponse` with a
//! machine-readable code and a human-readable message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{DomainError, DomainErrorKind};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Field {0} cannot be changed")]
    ImmutableField(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business rule errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // External service errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation error on a named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } | AppError::ImmutableField(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Domain(err) => match err.kind() {
                DomainErrorKind::NotFound => StatusCode::NOT_FOUND,
                DomainErrorKind::Validation
                | DomainErrorKind::InsufficientStock
                | DomainErrorKind::BalanceExceeded
                | DomainErrorKind::State => StatusCode::BAD_REQUEST,
            },
            AppError::DatabaseError(err) => match constraint_kind(err) {
                Some(ConstraintKind::Unique) => StatusCode::CONFLICT,
                Some(ConstraintKind::Check) | Some(ConstraintKind::ForeignKey) => {
                    StatusCode::BAD_REQUEST
                }
                None if matches!(err, sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
                None => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Storage(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .min()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ConstraintKind {
    Unique,
    Check,
    ForeignKey,
}

fn constraint_kind(err: &sqlx::Error) -> Option<ConstraintKind> {
    let db_err = err.as_database_error()?;
    match db_err.code()?.as_ref() {
        "23505" => Some(ConstraintKind::Unique),
        "23514" => Some(ConstraintKind::Check),
        "23503" => Some(ConstraintKind::ForeignKey),
        _ => None,
    }
}

/// Structured payload for the domain errors clients can act on
fn domain_details(err: &DomainError) -> Option<serde_json::Value> {
    match err {
        DomainError::InsufficientStock { shortfalls } => {
            Some(serde_json::json!({ "shortfalls": shortfalls }))
        }
        DomainError::NoInventoryRecord {
            presentation_id,
            warehouse_id,
        }
        | DomainError::LotNotAssigned {
            presentation_id,
            warehouse_id,
        } => Some(serde_json::json!({
            "presentation_id": presentation_id,
            "warehouse_id": warehouse_id,
        })),
        DomainError::LotMismatch {
            presentation_id,
            warehouse_id,
            requested,
            current,
        } => Some(serde_json::json!({
            "presentation_id": presentation_id,
            "warehouse_id": warehouse_id,
            "requested_lot_id": requested,
            "current_lot_id": current,
        })),
        DomainError::InsufficientLotStock {
            lot_id,
            requested_kg,
            available_kg,
        } => Some(serde_json::json!({
            "lot_id": lot_id,
            "requested_kg": requested_kg,
            "available_kg": available_kg,
        })),
        DomainError::AmountExceedsBalance {
            sale_id,
            pending,
            requested,
        } => Some(serde_json::json!({
            "sale_id": sale_id,
            "pending": pending,
            "requested": requested,
        })),
        DomainError::TotalBelowPaid { total, paid } => {
            Some(serde_json::json!({ "total": total, "paid": paid }))
        }
        DomainError::DepositExceedsUndeposited {
            requested,
            available,
        } => Some(serde_json::json!({
            "requested": requested,
            "available": available,
        })),
        _ => None,
    }
}

impl AppError {
    fn detail(&self, expose_internal: bool) -> ErrorDetail {
        match self {
            AppError::InvalidCredentials => {
                ErrorDetail::new("INVALID_CREDENTIALS", "Invalid username or password")
            }
            AppError::Unauthorized(msg) => ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => ErrorDetail::new("FORBIDDEN", msg.clone()),
            AppError::Validation { field, message } => {
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field.clone())
            }
            AppError::ImmutableField(field) => {
                ErrorDetail::new("IMMUTABLE_FIELD", format!("{} cannot be changed", field))
                    .with_field(field.clone())
            }
            AppError::Conflict { resource, message } => {
                ErrorDetail::new("CONFLICT", message.clone()).with_field(resource.clone())
            }
            AppError::NotFound(resource) => {
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource))
            }
            AppError::Domain(err) => {
                let detail = ErrorDetail::new(err.code(), err.to_string());
                match domain_details(err) {
                    Some(details) => detail.with_details(details),
                    None => detail,
                }
            }
            AppError::DatabaseError(err) => match constraint_kind(err) {
                Some(ConstraintKind::Unique) => {
                    ErrorDetail::new("CONFLICT", "A record with these values already exists")
                }
                Some(ConstraintKind::Check) => {
                    ErrorDetail::new("VALIDATION_ERROR", "A value is outside its allowed range")
                }
                Some(ConstraintKind::ForeignKey) => {
                    ErrorDetail::new("VALIDATION_ERROR", "A referenced record does not exist")
                }
                None if matches!(err, sqlx::Error::RowNotFound) => {
                    ErrorDetail::new("NOT_FOUND", "Record not found")
                }
                None => internal_detail("DATABASE_ERROR", err, expose_internal),
            },
            AppError::Storage(msg) => internal_detail("STORAGE_ERROR", msg, expose_internal),
            AppError::Internal(msg) => internal_detail("INTERNAL_ERROR", msg, expose_internal),
            AppError::InternalError(err) => {
                internal_detail("INTERNAL_ERROR", err, expose_internal)
            }
        }
    }
}

fn internal_detail(
    code: &str,
    cause: &dyn std::fmt::Display,
    expose_internal: bool,
) -> ErrorDetail {
    if expose_internal {
        ErrorDetail::new(code, format!("Internal server error: {}", cause))
    } else {
        ErrorDetail::new(code, "An internal server error occurred")
    }
}

/// Internal error detail is only echoed back outside production
fn expose_internal_errors() -> bool {
    let environment = std::env::var("CDM__ENVIRONMENT")
        .or_else(|_| std::env::var("CDM_ENVIRONMENT"))
        .unwrap_or_else(|_| "development".to_string());
    environment != "production"
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail(expose_internal_errors());

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = %detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::Shortfall;
    use uuid::Uuid;

    #[test]
    fn insufficient_stock_is_bad_request_with_shortfalls() {
        let presentation_id = Uuid::new_v4();
        let err = AppError::from(DomainError::InsufficientStock {
            shortfalls: vec![Shortfall {
                presentation_id,
                warehouse_id: Uuid::new_v4(),
                requested: 8,
                available: 5,
            }],
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let detail = err.detail(false);
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");
        let details = detail.details.unwrap();
        assert_eq!(details["shortfalls"][0]["requested"], 8);
        assert_eq!(details["shortfalls"][0]["available"], 5);
        assert_eq!(
            details["shortfalls"][0]["presentation_id"],
            presentation_id.to_string()
        );
    }

    #[test]
    fn balance_exceeded_carries_pending() {
        let err = AppError::from(DomainError::AmountExceedsBalance {
            sale_id: Uuid::nil(),
            pending: Decimal::new(4000, 2),
            requested: Decimal::new(4001, 2),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let detail = err.detail(false);
        assert_eq!(detail.code, "AMOUNT_EXCEEDS_BALANCE");
        assert_eq!(detail.details.unwrap()["pending"], "40.00");
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::validation("amount", "bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("Sale".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict {
                resource: "presentation".into(),
                message: "dup".into()
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::forbidden("no").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::from(DomainError::AlreadyDelivered).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(DomainError::UnknownSale(Uuid::nil())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::ImmutableField("warehouse_id".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_hidden_in_production() {
        let err = AppError::Internal("db password is hunter2".into());
        assert!(!err.detail(false).message.contains("hunter2"));
        assert!(err.detail(true).message.contains("hunter2"));
    }
}
