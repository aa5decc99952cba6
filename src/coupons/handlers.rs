// HTTP handlers for coupon endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::coupons::models::{CouponContext, ValidateCouponRequest, ValidateCouponResponse};
use crate::coupons::validator::CouponError;
use crate::error::{ApiError, ErrorResponse};
use crate::AppState;

/// Handler for POST /api/coupons/validate
///
/// A rejected coupon is a normal answer (`valid: false` with a reason), not an error.
#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Validation outcome", body = ValidateCouponResponse),
        (status = 400, description = "Malformed coupon code or email", body = ErrorResponse)
    ),
    tag = "coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, ApiError> {
    request.validate()?;

    let context = CouponContext {
        user_id: request.user_id,
        user_email: request.user_email,
    };
    let response = match state.coupons.validate(&request.code, &context).await {
        Ok(coupon) => ValidateCouponResponse {
            valid: true,
            coupon: Some(coupon),
            reason: None,
        },
        Err(CouponError::Rejected { code, reason }) => {
            tracing::debug!("Coupon {} rejected: {}", code, reason);
            ValidateCouponResponse {
                valid: false,
                coupon: None,
                reason: Some(reason),
            }
        }
        Err(CouponError::Store(e)) => return Err(crate::booking::BookingError::Store(e).into()),
    };
    Ok(Json(response))
}
