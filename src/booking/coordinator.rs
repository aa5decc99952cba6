// Booking Transaction Coordinator
//
// `reserve` is one all-or-nothing transaction over the slot, the coupon and the
// customer's loyalty profile. Write conflicts roll the transaction back and the whole
// attempt is retried. Notifications are enqueued only after commit.

use crate::booking::error::{BookingError, BookingResult};
use crate::booking::models::{
    generate_confirmation_number, Booking, BookingReceipt, BookingStatus, Customer,
    ReservationRequest,
};
use crate::booking::store::{BookingStore, StoreError};
use crate::config::{LoyaltyPolicy, ReservationPolicy};
use crate::coupons::models::CouponRejection;
use crate::coupons::validator::check_redeemable;
use crate::inventory::models::SlotStatus;
use crate::inventory::service::{time_block_reason, TeeTimeInventory};
use crate::metrics::{OperationType, PerformanceMetrics};
use crate::notifications::{BookingEvent, NotificationDispatcher};
use crate::validation::normalize_coupon_code;
use chrono::{Local, NaiveDateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Base delay between conflict retries; grows linearly with the attempt number
const RETRY_BASE_DELAY_MS: u64 = 10;

pub struct BookingCoordinator {
    store: Arc<dyn BookingStore>,
    inventory: Arc<TeeTimeInventory>,
    notifications: NotificationDispatcher,
    loyalty: LoyaltyPolicy,
    reservations: ReservationPolicy,
    metrics: PerformanceMetrics,
}

impl BookingCoordinator {
    pub fn new(
        store: Arc<dyn BookingStore>,
        inventory: Arc<TeeTimeInventory>,
        notifications: NotificationDispatcher,
        loyalty: LoyaltyPolicy,
        reservations: ReservationPolicy,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            store,
            inventory,
            notifications,
            loyalty,
            reservations,
            metrics,
        }
    }

    pub async fn reserve(&self, request: ReservationRequest) -> BookingResult<BookingReceipt> {
        self.reserve_at(request, Local::now().naive_local()).await
    }

    /// Reserve as of `now` (course-local time)
    pub async fn reserve_at(
        &self,
        request: ReservationRequest,
        now: NaiveDateTime,
    ) -> BookingResult<BookingReceipt> {
        let _timer = self.metrics.start(OperationType::Reservation);

        if request.players <= 0 {
            return Err(BookingError::InvalidRequest(
                "players must be at least 1".to_string(),
            ));
        }
        if request.customer.email().trim().is_empty() {
            return Err(BookingError::InvalidRequest(
                "customer email is required".to_string(),
            ));
        }

        let course = self.inventory.course(&request.course_id).await?;
        if course.hidden {
            return Err(BookingError::BlockedSlot {
                tee_time_id: request.tee_time_id.clone(),
                reason: "course is not accepting bookings".to_string(),
            });
        }

        // Overrides live in the catalog, outside the transaction
        let slot = self
            .store
            .find_slot(&request.tee_time_id)
            .await?
            .filter(|slot| slot.course_id == request.course_id)
            .ok_or_else(|| BookingError::NotFound {
                resource: "Tee time",
                id: request.tee_time_id.clone(),
            })?;
        if let Some(reason) = self.inventory.block_reason(&slot, now).await? {
            tracing::warn!("Reservation on blocked tee time {}: {}", slot.id, reason);
            return Err(BookingError::BlockedSlot {
                tee_time_id: slot.id,
                reason,
            });
        }

        let max_attempts = self.reservations.max_attempts.max(1);
        let mut attempt = 1;
        let booking = loop {
            match self.try_reserve(&request, now).await {
                Err(BookingError::Store(StoreError::Conflict)) if attempt < max_attempts => {
                    self.metrics.record_reservation_retry();
                    tracing::warn!(
                        "Write conflict reserving {} (attempt {}/{}), retrying",
                        request.tee_time_id,
                        attempt,
                        max_attempts
                    );
                    let jitter = rand::thread_rng().gen_range(0..RETRY_BASE_DELAY_MS);
                    let delay = RETRY_BASE_DELAY_MS * u64::from(attempt) + jitter;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(BookingError::Store(StoreError::Conflict)) => {
                    tracing::error!(
                        "Giving up reserving {} after {} write conflicts",
                        request.tee_time_id,
                        max_attempts
                    );
                    return Err(BookingError::Store(StoreError::Conflict));
                }
                Err(e) => {
                    tracing::warn!("Reservation on {} rejected: {}", request.tee_time_id, e);
                    return Err(e);
                }
                Ok(booking) => break booking,
            }
        };

        tracing::info!(
            "Booked {} players on {} ({}), confirmation {}",
            booking.players,
            booking.tee_time_id,
            booking.id,
            booking.confirmation_number
        );
        self.notifications.dispatch(BookingEvent::from(&booking));

        Ok(BookingReceipt {
            booking_id: booking.id,
            confirmation_number: booking.confirmation_number,
        })
    }

    /// One transactional attempt. Any early return drops the transaction, rolling it back.
    async fn try_reserve(&self, request: &ReservationRequest, now: NaiveDateTime) -> BookingResult<Booking> {
        let mut tx = self.store.begin().await?;

        let mut slot = tx
            .slot_for_update(&request.tee_time_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                resource: "Tee time",
                id: request.tee_time_id.clone(),
            })?;

        if slot.status == SlotStatus::Blocked {
            return Err(BookingError::BlockedSlot {
                tee_time_id: slot.id,
                reason: "tee time is blocked".to_string(),
            });
        }
        if let Some(reason) = time_block_reason(self.inventory.policy(), slot.date, slot.time, now) {
            return Err(BookingError::BlockedSlot {
                tee_time_id: slot.id,
                reason: reason.to_string(),
            });
        }
        if request.players > slot.available_spots {
            return Err(BookingError::Capacity {
                requested: request.players,
                available: slot.available_spots,
            });
        }

        let coupon_code = match request.coupon_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                let code = normalize_coupon_code(code);
                let mut coupon = tx.coupon_for_update(&code).await?.ok_or_else(|| {
                    BookingError::CouponInvalid {
                        code: code.clone(),
                        reason: CouponRejection::NotFound,
                    }
                })?;
                check_redeemable(&coupon, Utc::now()).map_err(|reason| {
                    BookingError::CouponInvalid {
                        code: code.clone(),
                        reason,
                    }
                })?;
                coupon.times_used += 1;
                tx.update_coupon(&coupon).await?;
                Some(coupon.code)
            }
            _ => None,
        };

        let booking = Booking {
            id: Uuid::new_v4(),
            confirmation_number: generate_confirmation_number(),
            course_id: request.course_id.clone(),
            tee_time_id: slot.id.clone(),
            players: request.players,
            total_price: request.total_price,
            coupon_code,
            status: BookingStatus::Confirmed,
            user_id: request.customer.user_id().map(str::to_string),
            customer_email: request.customer.email().trim().to_string(),
            created_at: Utc::now(),
        };
        tx.insert_booking(&booking).await?;

        slot.reserve_seats(booking.id, booking.players)
            .map_err(|_| BookingError::Capacity {
                requested: request.players,
                available: slot.available_spots,
            })?;
        tx.update_slot(&slot).await?;

        if let Customer::Registered { ref user_id, .. } = request.customer {
            let mut profile = tx.profile_for_update(user_id).await?.ok_or_else(|| {
                BookingError::AuthProfileMissing {
                    user_id: user_id.clone(),
                }
            })?;
            profile.record_booking(self.loyalty.booking_bonus_points);
            tx.update_profile(&profile).await?;
        }

        tx.commit().await?;
        Ok(booking)
    }
}
