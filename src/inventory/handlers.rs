// HTTP handlers for tee-time listing

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::error::{ApiError, ErrorResponse};
use crate::inventory::models::TeeTimeView;
use crate::AppState;

/// Query parameters for a day's tee times
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TeeTimeQuery {
    /// Course-local date, YYYY-MM-DD
    #[param(value_type = String, example = "2025-07-05")]
    pub date: NaiveDate,
    /// Party size; when present every open slot is priced for it
    #[validate(range(min = 1, max = 8, message = "players must be between 1 and 8"))]
    pub players: Option<u32>,
}

/// Handler for GET /api/courses/{course_id}/tee-times
/// Lists the day's tee times with their current status, priced when `players` is given
#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/tee-times",
    params(
        ("course_id" = String, Path, description = "Course ID"),
        TeeTimeQuery
    ),
    responses(
        (status = 200, description = "Tee times for the day", body = Vec<TeeTimeView>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    ),
    tag = "tee-times"
)]
pub async fn list_tee_times(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Query(query): Query<TeeTimeQuery>,
) -> Result<Json<Vec<TeeTimeView>>, ApiError> {
    tracing::debug!("Listing tee times for {} on {}", course_id, query.date);
    query.validate()?;

    let slots = match query.players {
        Some(players) => {
            state
                .inventory
                .list_priced_slots(&course_id, query.date, players)
                .await?
        }
        None => state.inventory.list_slots(&course_id, query.date).await?,
    };

    tracing::debug!("Returning {} tee times for {}", slots.len(), course_id);
    Ok(Json(slots))
}
