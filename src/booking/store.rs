// Booking store contract
//
// Reads used by listings and coupon checks run outside any transaction. A reservation
// runs inside one `BookingTransaction`: rows read through it are locked until commit,
// and dropping it without `commit` discards every write.

use crate::booking::models::{Booking, CustomerProfile};
use crate::coupons::models::Coupon;
use crate::inventory::models::{Course, TeeTimeSlot};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// SQLSTATE for serialization failures
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for detected deadlocks
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Concurrent transactions touched the same rows; the whole transaction may be retried
    #[error("Write conflict, transaction rolled back")]
    Conflict,

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => StoreError::Conflict,
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_course(&self, course_id: &str) -> StoreResult<Option<Course>>;

    /// Slots of one course day ordered by time
    async fn slots_for_day(&self, course_id: &str, date: NaiveDate) -> StoreResult<Vec<TeeTimeSlot>>;

    async fn find_slot(&self, tee_time_id: &str) -> StoreResult<Option<TeeTimeSlot>>;

    /// Insert slots whose id is not stored yet; existing slots are left untouched
    async fn insert_missing_slots(&self, slots: &[TeeTimeSlot]) -> StoreResult<()>;

    /// Lookup by normalized (upper-case) code
    async fn find_coupon(&self, code: &str) -> StoreResult<Option<Coupon>>;

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<CustomerProfile>>;

    async fn has_booking_for_user(&self, user_id: &str) -> StoreResult<bool>;

    /// Case-insensitive on the email
    async fn has_booking_for_email(&self, email: &str) -> StoreResult<bool>;

    async fn begin(&self) -> StoreResult<Box<dyn BookingTransaction>>;
}

#[async_trait]
pub trait BookingTransaction: Send {
    async fn slot_for_update(&mut self, tee_time_id: &str) -> StoreResult<Option<TeeTimeSlot>>;

    async fn coupon_for_update(&mut self, code: &str) -> StoreResult<Option<Coupon>>;

    async fn profile_for_update(&mut self, user_id: &str) -> StoreResult<Option<CustomerProfile>>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn update_slot(&mut self, slot: &TeeTimeSlot) -> StoreResult<()>;

    async fn update_coupon(&mut self, coupon: &Coupon) -> StoreResult<()>;

    async fn update_profile(&mut self, profile: &CustomerProfile) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
