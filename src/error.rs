// Error handling module for the Tee Time API
// Maps domain errors to HTTP responses with a consistent JSON body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::booking::error::BookingError;
use crate::booking::store::StoreError;
use crate::catalog::CatalogError;
use crate::pricing::PricingError;

/// Main error type for the API
/// All handlers return Result<T, ApiError>
#[derive(Debug)]
pub enum ApiError {
    /// Request body or query failed `validator` checks
    /// Maps to HTTP 400 Bad Request
    ValidationError(validator::ValidationErrors),

    /// Malformed or unusable request (bad quote, bad party size)
    /// Maps to HTTP 400 Bad Request
    BadRequest {
        error_code: &'static str,
        message: String,
    },

    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// The tee time cannot take this booking
    /// Maps to HTTP 409 Conflict
    Conflict {
        error_code: &'static str,
        message: String,
    },

    /// Coupon rejected for a well-formed request
    /// Maps to HTTP 422 Unprocessable Entity
    Unprocessable {
        error_code: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Maps to HTTP 403 Forbidden
    Forbidden(String),

    /// Database operation errors
    /// Maps to HTTP 500; details are logged, never returned
    DatabaseError(String),

    /// Maps to HTTP 500; details are logged, never returned
    InternalError(String),
}

/// Consistent error response structure
///
/// Carries both a machine-readable `error_code` and a human-readable `message`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR", "SLOT_BLOCKED")
    #[schema(example = "INSUFFICIENT_CAPACITY")]
    pub error_code: String,

    pub message: String,

    /// Field-level validation errors or coupon rejection reason
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,

    /// RFC 3339 timestamp of when the error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    fn new(error_code: &str, message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            error_code: error_code.to_string(),
            message: message.into(),
            details,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Logs expected client errors at debug, business rejections at warn and
    /// 5xx errors at error.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let status = self.status_code();
        let response = match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                ErrorResponse::new(
                    "VALIDATION_ERROR",
                    "Request validation failed",
                    Some(serde_json::to_value(errors).unwrap_or(json!({}))),
                )
            }
            ApiError::BadRequest { error_code, message } => {
                debug!("Bad request ({}): {}", error_code, message);
                ErrorResponse::new(error_code, message.clone(), None)
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                ErrorResponse::new("NOT_FOUND", format!("{} with id {} not found", resource, id), None)
            }
            ApiError::Conflict { error_code, message } => {
                warn!("Conflict ({}): {}", error_code, message);
                ErrorResponse::new(error_code, message.clone(), None)
            }
            ApiError::Unprocessable {
                error_code,
                message,
                details,
            } => {
                debug!("Unprocessable ({}): {}", error_code, message);
                ErrorResponse::new(error_code, message.clone(), details.clone())
            }
            ApiError::Forbidden(message) => {
                warn!("Forbidden: {}", message);
                ErrorResponse::new("FORBIDDEN", message.clone(), None)
            }
            ApiError::DatabaseError(db_error) => {
                error!("Database error: {}", db_error);
                ErrorResponse::new("DATABASE_ERROR", "A database error occurred", None)
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);
                ErrorResponse::new("INTERNAL_ERROR", "An internal server error occurred", None)
            }
        };
        (status, response)
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert validator errors to ApiError
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::DatabaseError(error.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::InvalidEntry(message) => ApiError::BadRequest {
                error_code: "INVALID_CATALOG_ENTRY",
                message,
            },
            CatalogError::EntryNotFound { kind, id, .. } => ApiError::NotFound {
                resource: kind.to_string(),
                id,
            },
            CatalogError::DatabaseError(e) => ApiError::DatabaseError(e.to_string()),
            CatalogError::JsonError(e) => {
                ApiError::InternalError(format!("Catalog document is unreadable: {}", e))
            }
        }
    }
}

impl From<PricingError> for ApiError {
    fn from(error: PricingError) -> Self {
        match error {
            PricingError::Catalog(e) => e.into(),
            PricingError::NoCapacity { .. } => ApiError::Conflict {
                error_code: "SLOT_BLOCKED",
                message: error.to_string(),
            },
            PricingError::BaseProductMissing(_) => ApiError::Conflict {
                error_code: "PRICE_UNAVAILABLE",
                message: error.to_string(),
            },
            PricingError::InvalidQuery(message) => ApiError::BadRequest {
                error_code: "INVALID_REQUEST",
                message,
            },
            PricingError::Overflow(_) => ApiError::InternalError(error.to_string()),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(error: BookingError) -> Self {
        match error {
            BookingError::NotFound { resource, id } => ApiError::NotFound {
                resource: resource.to_string(),
                id,
            },
            BookingError::BlockedSlot { .. } => ApiError::Conflict {
                error_code: "SLOT_BLOCKED",
                message: error.to_string(),
            },
            BookingError::Capacity { .. } => ApiError::Conflict {
                error_code: "INSUFFICIENT_CAPACITY",
                message: error.to_string(),
            },
            BookingError::CouponInvalid { ref code, reason } => ApiError::Unprocessable {
                error_code: "COUPON_INVALID",
                details: Some(json!({ "code": code, "reason": reason })),
                message: error.to_string(),
            },
            BookingError::AuthProfileMissing { .. } => ApiError::Forbidden(error.to_string()),
            BookingError::InvalidRequest(message) => ApiError::BadRequest {
                error_code: "INVALID_REQUEST",
                message,
            },
            BookingError::QuoteInvalid(message) => ApiError::BadRequest {
                error_code: "QUOTE_INVALID",
                message,
            },
            BookingError::Pricing(e) => e.into(),
            BookingError::Store(StoreError::Conflict) => ApiError::Conflict {
                error_code: "WRITE_CONFLICT",
                message: "The tee time is in high demand, please retry".to_string(),
            },
            BookingError::Store(StoreError::Database(e)) => ApiError::DatabaseError(e.to_string()),
        }
    }
}
