// Coupon Validator
//
// Checks, in order: existence, expiry, usage limit, and for the designated
// first-booking code, that the customer has never booked before.

use crate::booking::store::{BookingStore, StoreError};
use crate::config::CouponPolicy;
use crate::coupons::models::{Coupon, CouponContext, CouponRejection};
use crate::validation::normalize_coupon_code;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CouponError {
    #[error("Coupon '{code}' rejected: {reason}")]
    Rejected { code: String, reason: CouponRejection },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Expiry and usage-limit checks, the part re-run inside a reservation
pub fn check_redeemable(coupon: &Coupon, now: DateTime<Utc>) -> Result<(), CouponRejection> {
    if coupon.is_expired(now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::UsageLimitReached);
    }
    Ok(())
}

pub struct CouponValidator {
    store: Arc<dyn BookingStore>,
    policy: CouponPolicy,
}

impl CouponValidator {
    pub fn new(store: Arc<dyn BookingStore>, policy: CouponPolicy) -> Self {
        Self { store, policy }
    }

    /// Whether `code` is the configured first-booking coupon, in any casing
    pub fn is_first_booking_code(&self, code: &str) -> bool {
        normalize_coupon_code(code) == normalize_coupon_code(&self.policy.first_booking_code)
    }

    /// Validate a code for a customer. Read-only: never changes usage counts.
    pub async fn validate(&self, code: &str, context: &CouponContext) -> Result<Coupon, CouponError> {
        let code = normalize_coupon_code(code);
        let reject = |reason| CouponError::Rejected {
            code: code.clone(),
            reason,
        };

        let coupon = self
            .store
            .find_coupon(&code)
            .await?
            .ok_or_else(|| reject(CouponRejection::NotFound))?;

        check_redeemable(&coupon, Utc::now()).map_err(reject)?;

        if self.is_first_booking_code(&code) && !self.is_eligible_for_first_booking(context).await? {
            tracing::debug!("First-booking coupon {} refused for returning customer", code);
            return Err(reject(CouponRejection::Ineligible));
        }

        Ok(coupon)
    }

    async fn is_eligible_for_first_booking(&self, context: &CouponContext) -> Result<bool, StoreError> {
        if let Some(ref user_id) = context.user_id {
            if let Some(profile) = self.store.find_profile(user_id).await? {
                if profile.first_booking_achieved {
                    return Ok(false);
                }
            }
            return Ok(!self.store.has_booking_for_user(user_id).await?);
        }

        match context.user_email {
            Some(ref email) if !email.trim().is_empty() => {
                Ok(!self.store.has_booking_for_email(email.trim()).await?)
            }
            // Nobody to check history against
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::memory::InMemoryBookingStore;
    use crate::booking::models::{Booking, BookingStatus, CustomerProfile};
    use crate::booking::store::{BookingStore, BookingTransaction};
    use crate::coupons::models::DiscountType;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coupon(code: &str) -> Coupon {
        Coupon {
            code: code.to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            usage_limit: Some(5),
            times_used: 0,
            expires_at: None,
        }
    }

    fn guest(email: &str) -> CouponContext {
        CouponContext {
            user_id: None,
            user_email: Some(email.to_string()),
        }
    }

    fn member(user_id: &str) -> CouponContext {
        CouponContext {
            user_id: Some(user_id.to_string()),
            user_email: None,
        }
    }

    async fn add_booking(store: &InMemoryBookingStore, user_id: Option<&str>, email: &str) {
        let booking = Booking {
            id: Uuid::new_v4(),
            confirmation_number: "TRG-ABC123".to_string(),
            course_id: "pebble".to_string(),
            tee_time_id: "pebble_2025-07-05_0800".to_string(),
            players: 2,
            total_price: dec!(200),
            coupon_code: None,
            status: BookingStatus::Confirmed,
            user_id: user_id.map(str::to_string),
            customer_email: email.to_string(),
            created_at: Utc::now(),
        };
        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();
    }

    fn validator(store: &InMemoryBookingStore) -> CouponValidator {
        CouponValidator::new(Arc::new(store.clone()), CouponPolicy::default())
    }

    fn rejection(result: Result<Coupon, CouponError>) -> Option<CouponRejection> {
        match result {
            Err(CouponError::Rejected { reason, .. }) => Some(reason),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_valid_coupon_is_case_insensitive() {
        let store = InMemoryBookingStore::new();
        store.upsert_coupon(coupon("SUMMER10")).await;

        let found = validator(&store).validate(" summer10 ", &guest("a@b.com")).await.unwrap();
        assert_eq!(found.code, "SUMMER10");
    }

    #[tokio::test]
    async fn test_rejections_in_order() {
        let store = InMemoryBookingStore::new();
        let v = validator(&store);
        assert_eq!(
            rejection(v.validate("NOPE", &guest("a@b.com")).await),
            Some(CouponRejection::NotFound)
        );

        // Expired wins over exhausted
        let mut stale = coupon("STALE");
        stale.expires_at = Some(Utc::now() - Duration::days(1));
        stale.usage_limit = Some(1);
        stale.times_used = 1;
        store.upsert_coupon(stale).await;
        assert_eq!(
            rejection(v.validate("STALE", &guest("a@b.com")).await),
            Some(CouponRejection::Expired)
        );

        let mut used = coupon("USED");
        used.usage_limit = Some(3);
        used.times_used = 3;
        store.upsert_coupon(used).await;
        assert_eq!(
            rejection(v.validate("USED", &guest("a@b.com")).await),
            Some(CouponRejection::UsageLimitReached)
        );
    }

    #[tokio::test]
    async fn test_first_booking_code_for_guests() {
        let store = InMemoryBookingStore::new();
        store.upsert_coupon(coupon("FIRSTTEE")).await;
        let v = validator(&store);

        assert!(v.validate("FIRSTTEE", &guest("new@b.com")).await.is_ok());

        add_booking(&store, None, "Returning@B.com").await;
        assert_eq!(
            rejection(v.validate("FIRSTTEE", &guest("returning@b.com")).await),
            Some(CouponRejection::Ineligible)
        );
        assert_eq!(
            rejection(v.validate("FIRSTTEE", &CouponContext::default()).await),
            Some(CouponRejection::Ineligible)
        );
    }

    #[tokio::test]
    async fn test_configured_first_booking_code_in_any_casing() {
        let store = InMemoryBookingStore::new();
        store.upsert_coupon(coupon("WELCOME")).await;
        let v = CouponValidator::new(
            Arc::new(store.clone()),
            CouponPolicy {
                first_booking_code: "welcome".to_string(),
            },
        );
        assert!(v.is_first_booking_code(" Welcome "));
        assert!(!v.is_first_booking_code("SUMMER10"));

        add_booking(&store, None, "back@b.com").await;
        assert_eq!(
            rejection(v.validate("WELCOME", &guest("back@b.com")).await),
            Some(CouponRejection::Ineligible)
        );
        assert!(v.validate("welcome", &guest("new@b.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_first_booking_code_for_members() {
        let store = InMemoryBookingStore::new();
        store.upsert_coupon(coupon("FIRSTTEE")).await;
        let v = validator(&store);

        store.upsert_profile(CustomerProfile::new("fresh", "f@b.com")).await;
        assert!(v.validate("FIRSTTEE", &member("fresh")).await.is_ok());

        let mut achieved = CustomerProfile::new("achiever", "a@b.com");
        achieved.first_booking_achieved = true;
        store.upsert_profile(achieved).await;
        assert_eq!(
            rejection(v.validate("FIRSTTEE", &member("achiever")).await),
            Some(CouponRejection::Ineligible)
        );

        store.upsert_profile(CustomerProfile::new("booked", "b@b.com")).await;
        add_booking(&store, Some("booked"), "b@b.com").await;
        assert_eq!(
            rejection(v.validate("FIRSTTEE", &member("booked")).await),
            Some(CouponRejection::Ineligible)
        );
    }

    #[tokio::test]
    async fn test_validation_does_not_consume_usage() {
        let store = InMemoryBookingStore::new();
        let mut once = coupon("ONCE");
        once.usage_limit = Some(1);
        store.upsert_coupon(once).await;
        let v = validator(&store);

        let first = v.validate("ONCE", &guest("a@b.com")).await.unwrap();
        let second = v.validate("ONCE", &guest("a@b.com")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.find_coupon("ONCE").await.unwrap().unwrap().times_used, 0);
    }
}
