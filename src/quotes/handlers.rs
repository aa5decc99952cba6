// HTTP handlers for quote endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::error::{ApiError, ErrorResponse};
use crate::quotes::{Quote, QuoteRequest};
use crate::AppState;

/// Handler for POST /api/quotes
/// Prices a tee time for a party, applies an optional coupon and signs the result
#[utoipa::path(
    post,
    path = "/api/quotes",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Signed quote, amounts in minor units", body = Quote),
        (status = 400, description = "Invalid input data", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Tee time closed or not priced", body = ErrorResponse),
        (status = 422, description = "Coupon rejected", body = ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    tracing::debug!(
        "Quote requested for {} {} x{}",
        request.course_id,
        request.date,
        request.players
    );
    request.validate()?;

    // Unknown courses are a 404 rather than a missing base price
    state.inventory.course(&request.course_id).await?;

    let quote = state.quotes.quote(&request).await?;
    Ok(Json(quote))
}
