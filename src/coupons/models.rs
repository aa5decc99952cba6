use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// How a coupon's `discount_value` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percentage of the subtotal (10 = 10% off)
    Percentage,
    /// Fixed amount off the subtotal, in major currency units
    FixedAmount,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::FixedAmount => write!(f, "fixed_amount"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    #[schema(example = "SUMMER10")]
    pub code: String,
    pub discount_type: DiscountType,
    #[schema(value_type = String, example = "10")]
    pub discount_value: Decimal,
    pub usage_limit: Option<i32>,
    pub times_used: i32,
    #[schema(value_type = Option<String>)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.times_used >= limit)
    }

    /// Discount on a subtotal, never more than the subtotal itself
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.discount_value / Decimal::ONE_HUNDRED,
            DiscountType::FixedAmount => self.discount_value,
        };
        raw.max(Decimal::ZERO).min(subtotal)
    }
}

/// Why a coupon was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    NotFound,
    Expired,
    UsageLimitReached,
    /// First-booking-only code used by a customer who has booked before
    Ineligible,
}

impl std::fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CouponRejection::NotFound => "coupon does not exist",
            CouponRejection::Expired => "coupon has expired",
            CouponRejection::UsageLimitReached => "coupon usage limit reached",
            CouponRejection::Ineligible => "coupon is only valid for a first booking",
        };
        write!(f, "{}", reason)
    }
}

/// Who is redeeming the coupon
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponContext {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

/// Request body for POST /api/coupons/validate
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[validate(custom = "crate::validation::validate_coupon_code")]
    #[schema(example = "FIRSTTEE")]
    pub code: String,
    pub user_id: Option<String>,
    #[validate(email(message = "userEmail must be a valid email address"))]
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub coupon: Option<Coupon>,
    pub reason: Option<CouponRejection>,
}
