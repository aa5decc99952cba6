use crate::pricing::AppliedRule;
use crate::timefmt::hhmm;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Major currency units to minor units (cents), half away from zero
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

/// Request body for POST /api/quotes
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[validate(length(min = 1, message = "courseId is required"))]
    pub course_id: String,
    #[schema(value_type = String, example = "2025-07-05")]
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "08:00")]
    pub time: NaiveTime,
    #[validate(range(min = 1, max = 8, message = "players must be between 1 and 8"))]
    pub players: u32,
    #[validate(custom = "crate::validation::validate_coupon_code")]
    pub coupon_code: Option<String>,
    pub user_id: Option<String>,
    #[validate(email(message = "userEmail must be a valid email address"))]
    pub user_email: Option<String>,
}

/// A priced, signed and time-boxed offer. Amounts are in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub course_id: String,
    #[schema(value_type = String, example = "2025-07-05")]
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "08:00")]
    pub time: NaiveTime,
    pub players: u32,
    pub coupon_code: Option<String>,
    #[schema(example = 13200)]
    pub price_per_player: i64,
    #[schema(example = 26400)]
    pub subtotal: i64,
    #[schema(example = 2640)]
    pub discount: i64,
    #[schema(example = 1901)]
    pub tax: i64,
    #[schema(example = 25661)]
    pub total: i64,
    #[schema(example = "USD")]
    pub currency: String,
    #[schema(value_type = Vec<Object>)]
    pub applied_rules: Vec<AppliedRule>,
    pub quote_hash: String,
    #[schema(value_type = String)]
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// The fields covered by the quote hash, in a fixed order
    pub fn canonical_fields(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
            self.course_id,
            self.date.format("%Y-%m-%d"),
            self.time.format("%H:%M"),
            self.players,
            self.coupon_code.as_deref().unwrap_or(""),
            self.price_per_player,
            self.subtotal,
            self.discount,
            self.tax,
            self.total,
            self.currency,
            self.expires_at.timestamp()
        )
    }
}
