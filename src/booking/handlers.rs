// HTTP handlers for checkout

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::booking::models::{BookingReceipt, Customer, ReservationRequest};
use crate::error::{ApiError, ErrorResponse};
use crate::quotes::models::from_minor_units;
use crate::quotes::Quote;
use crate::AppState;

/// Request body for POST /api/bookings
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// A quote previously returned by POST /api/quotes, unmodified
    pub quote: Quote,
    pub customer: Customer,
}

impl Validate for CheckoutRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !validator::validate_email(self.customer.email()) {
            let mut error = ValidationError::new("email");
            error.message = Some("customer email must be a valid email address".into());
            errors.add("customer", error);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Handler for POST /api/bookings
/// Redeems a signed quote: reserves the seats, redeems the coupon and grants loyalty in one transaction
#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Booking confirmed", body = BookingReceipt),
        (status = 400, description = "Invalid, tampered or expired quote", body = ErrorResponse),
        (status = 403, description = "No customer profile for the user", body = ErrorResponse),
        (status = 404, description = "Course or tee time not found", body = ErrorResponse),
        (status = 409, description = "Tee time blocked, full, or contended", body = ErrorResponse),
        (status = 422, description = "Coupon rejected", body = ErrorResponse)
    ),
    tag = "bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), ApiError> {
    request.validate()?;
    let CheckoutRequest { quote, customer } = request;

    state.quotes.verify(&quote)?;

    let players = i32::try_from(quote.players).map_err(|_| ApiError::BadRequest {
        error_code: "INVALID_REQUEST",
        message: format!("players out of range: {}", quote.players),
    })?;
    let slot = state
        .inventory
        .get_or_create_slot(&quote.course_id, quote.date, quote.time)
        .await?;

    let receipt = state
        .bookings
        .reserve(ReservationRequest {
            course_id: quote.course_id,
            tee_time_id: slot.id,
            players,
            coupon_code: quote.coupon_code,
            customer,
            total_price: from_minor_units(quote.total),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
