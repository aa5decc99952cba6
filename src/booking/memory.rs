// In-memory booking store
//
// Transactions take the state lock for their whole lifetime and work on a copy,
// which replaces the shared state on commit. That makes every transaction
// serializable and every abandoned transaction a clean rollback.

use crate::booking::models::{Booking, CustomerProfile};
use crate::booking::store::{BookingStore, BookingTransaction, StoreError, StoreResult};
use crate::coupons::models::Coupon;
use crate::inventory::models::{Course, TeeTimeSlot};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    courses: HashMap<String, Course>,
    slots: HashMap<String, TeeTimeSlot>,
    coupons: HashMap<String, Coupon>,
    profiles: HashMap<String, CustomerProfile>,
    bookings: Vec<Booking>,
}

#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<MemoryState>>,
    injected_conflicts: Arc<AtomicU32>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_course(&self, course: Course) {
        self.state.lock().await.courses.insert(course.id.clone(), course);
    }

    /// Stored under the upper-cased code
    pub async fn upsert_coupon(&self, mut coupon: Coupon) {
        coupon.code = crate::validation::normalize_coupon_code(&coupon.code);
        self.state.lock().await.coupons.insert(coupon.code.clone(), coupon);
    }

    pub async fn upsert_profile(&self, profile: CustomerProfile) {
        self.state
            .lock()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile);
    }

    pub async fn upsert_slot(&self, slot: TeeTimeSlot) {
        self.state.lock().await.slots.insert(slot.id.clone(), slot);
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.clone()
    }

    /// Make the next `count` commits fail with a write conflict
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_course(&self, course_id: &str) -> StoreResult<Option<Course>> {
        Ok(self.state.lock().await.courses.get(course_id).cloned())
    }

    async fn slots_for_day(&self, course_id: &str, date: NaiveDate) -> StoreResult<Vec<TeeTimeSlot>> {
        let state = self.state.lock().await;
        let mut slots: Vec<_> = state
            .slots
            .values()
            .filter(|slot| slot.course_id == course_id && slot.date == date)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.time);
        Ok(slots)
    }

    async fn find_slot(&self, tee_time_id: &str) -> StoreResult<Option<TeeTimeSlot>> {
        Ok(self.state.lock().await.slots.get(tee_time_id).cloned())
    }

    async fn insert_missing_slots(&self, slots: &[TeeTimeSlot]) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        for slot in slots {
            state
                .slots
                .entry(slot.id.clone())
                .or_insert_with(|| slot.clone());
        }
        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        Ok(self.state.lock().await.coupons.get(code).cloned())
    }

    async fn find_profile(&self, user_id: &str) -> StoreResult<Option<CustomerProfile>> {
        Ok(self.state.lock().await.profiles.get(user_id).cloned())
    }

    async fn has_booking_for_user(&self, user_id: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .iter()
            .any(|booking| booking.user_id.as_deref() == Some(user_id)))
    }

    async fn has_booking_for_email(&self, email: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .iter()
            .any(|booking| booking.customer_email.eq_ignore_ascii_case(email)))
    }

    async fn begin(&self) -> StoreResult<Box<dyn BookingTransaction>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            injected_conflicts: Arc::clone(&self.injected_conflicts),
        }))
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    injected_conflicts: Arc<AtomicU32>,
}

#[async_trait]
impl BookingTransaction for MemoryTransaction {
    async fn slot_for_update(&mut self, tee_time_id: &str) -> StoreResult<Option<TeeTimeSlot>> {
        Ok(self.working.slots.get(tee_time_id).cloned())
    }

    async fn coupon_for_update(&mut self, code: &str) -> StoreResult<Option<Coupon>> {
        Ok(self.working.coupons.get(code).cloned())
    }

    async fn profile_for_update(&mut self, user_id: &str) -> StoreResult<Option<CustomerProfile>> {
        Ok(self.working.profiles.get(user_id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.working.bookings.push(booking.clone());
        Ok(())
    }

    async fn update_slot(&mut self, slot: &TeeTimeSlot) -> StoreResult<()> {
        self.working.slots.insert(slot.id.clone(), slot.clone());
        Ok(())
    }

    async fn update_coupon(&mut self, coupon: &Coupon) -> StoreResult<()> {
        self.working.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn update_profile(&mut self, profile: &CustomerProfile) -> StoreResult<()> {
        self.working
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let injected = self
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Conflict);
        }

        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
