// Error types for inventory, quoting and reservations

use crate::booking::store::StoreError;
use crate::coupons::models::CouponRejection;
use crate::coupons::validator::CouponError;
use crate::pricing::PricingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// The slot cannot be sold right now (cutoff, past time, block override, hidden course)
    #[error("Tee time {tee_time_id} is blocked: {reason}")]
    BlockedSlot { tee_time_id: String, reason: String },

    #[error("Requested {requested} players but only {available} spots are available")]
    Capacity { requested: i32, available: i32 },

    #[error("Coupon '{code}' is invalid: {reason}")]
    CouponInvalid { code: String, reason: CouponRejection },

    /// A registered customer without a loyalty profile
    #[error("No customer profile for user {user_id}")]
    AuthProfileMissing { user_id: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Tampered, expired or otherwise unusable quote
    #[error("Quote rejected: {0}")]
    QuoteInvalid(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CouponError> for BookingError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::Rejected { code, reason } => BookingError::CouponInvalid { code, reason },
            CouponError::Store(e) => BookingError::Store(e),
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        BookingError::Store(err.into())
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
