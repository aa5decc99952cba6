// PostgreSQL booking store
//
// Reservation transactions run at SERIALIZABLE isolation and lock the rows they read
// with SELECT ... FOR UPDATE. Serialization failures surface as `StoreError::Conflict`.

use crate::booking::models::{Booking, CustomerProfile};
use crate::booking::store::{BookingStore, BookingTransaction, StoreResult};
use crate::coupons::models::Coupon;
use crate::inventory::models::{Course, TeeTimeSlot};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};

const SLOT_COLUMNS: &str =
    "id, course_id, date, time, max_players, booked_players, available_spots, status, booking_ids";
const COUPON_COLUMNS: &str =
    "code, discount_type, discount_value, usage_limit, times_used, expires_at";
const PROFILE_COLUMNS: &str =
    "user_id, email, loyalty_points, first_booking_achieved, total_bookings";

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_course(&self, course_id: &str) -> StoreResult<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, name, hidden, interval_minutes, first_tee_time, last_tee_time, max_players
            FROM courses
            WHERE id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn slots_for_day(&self, course_id: &str, date: NaiveDate) -> StoreResult<Vec<TeeTimeSlot>> {
        let slots = sqlx::query_as::<_, TeeTimeSlot>(&format!(
            "SELECT {} FROM tee_time_slots WHERE course_id = $1 AND date = $2 ORDER BY time",
            SLOT_COLUMNS
        ))
        .bind(course_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    async fn find_slot(&self, tee_time_id: &str) -> StoreResult<Option<TeeTimeSlot>> {
        let slot = sqlx::query_as::<_, TeeTimeSlot>(&format!(
            "SELECT {} FROM tee_time_slots WHERE id = $1",
            SLOT_COLUMNS
        ))
        .bind(tee_time_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(slot)
    }

    async fn insert_missing_slots(&self, slots: &[TeeTimeSlot]) -> StoreResult<()> {
        if slots.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for slot in slots {
            sqlx::query(
                r#"
                INSERT INTO tee_time_slots
                    (id, course_id, date, time, max_players, booked_players, available_spots, status, booking_ids)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&slot.id)
            .bind(&slot.course_id)
            .bind(slot.date)
            .bind(slot.time)
            .bind(slot.max_players)
            .bind(slot.booked_players)
            .bind(slot.available_spots)
            .bind(slot.status)
            .bind(&slot.booking_ids)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!("Materialized up to {} tee times", slots.len());
        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE code = $1",
            COUPON_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<CustomerProfile>> {
        let profile = sqlx::query_as::<_, CustomerProfile>(&format!(
            "SELECT {} FROM customer_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn has_booking_for_user(&self, user_id: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn has_booking_for_email(&self, email: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE lower(customer_email) = lower($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn begin(&self) -> StoreResult<Box<dyn BookingTransaction>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgBookingTransaction { tx }))
    }
}

/// Rolled back by sqlx when dropped without commit
struct PgBookingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTransaction for PgBookingTransaction {
    async fn slot_for_update(&mut self, tee_time_id: &str) -> StoreResult<Option<TeeTimeSlot>> {
        let slot = sqlx::query_as::<_, TeeTimeSlot>(&format!(
            "SELECT {} FROM tee_time_slots WHERE id = $1 FOR UPDATE",
            SLOT_COLUMNS
        ))
        .bind(tee_time_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(slot)
    }

    async fn coupon_for_update(&mut self, code: &str) -> StoreResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE code = $1 FOR UPDATE",
            COUPON_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(coupon)
    }

    async fn profile_for_update(&mut self, user_id: &str) -> StoreResult<Option<CustomerProfile>> {
        let profile = sqlx::query_as::<_, CustomerProfile>(&format!(
            "SELECT {} FROM customer_profiles WHERE user_id = $1 FOR UPDATE",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(profile)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, confirmation_number, course_id, tee_time_id, players, total_price,
                 coupon_code, status, user_id, customer_email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.confirmation_number)
        .bind(&booking.course_id)
        .bind(&booking.tee_time_id)
        .bind(booking.players)
        .bind(booking.total_price)
        .bind(&booking.coupon_code)
        .bind(booking.status)
        .bind(&booking.user_id)
        .bind(&booking.customer_email)
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_slot(&mut self, slot: &TeeTimeSlot) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE tee_time_slots
            SET booked_players = $2, available_spots = $3, status = $4, booking_ids = $5
            WHERE id = $1
            "#,
        )
        .bind(&slot.id)
        .bind(slot.booked_players)
        .bind(slot.available_spots)
        .bind(slot.status)
        .bind(&slot.booking_ids)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_coupon(&mut self, coupon: &Coupon) -> StoreResult<()> {
        sqlx::query("UPDATE coupons SET times_used = $2 WHERE code = $1")
            .bind(&coupon.code)
            .bind(coupon.times_used)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn update_profile(&mut self, profile: &CustomerProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE customer_profiles
            SET loyalty_points = $2, first_booking_achieved = $3, total_bookings = $4
            WHERE user_id = $1
            "#,
        )
        .bind(&profile.user_id)
        .bind(profile.loyalty_points)
        .bind(profile.first_booking_achieved)
        .bind(profile.total_bookings)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
