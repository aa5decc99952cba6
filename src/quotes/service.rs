// Quote Service
//
// Validates the coupon, resolves the price, applies the discount and tax, and signs the
// result. Checkout trusts a verified quote's totals; they are not re-derived.

use crate::booking::error::{BookingError, BookingResult};
use crate::config::QuotePolicy;
use crate::coupons::models::CouponContext;
use crate::coupons::validator::CouponValidator;
use crate::metrics::{OperationType, PerformanceMetrics};
use crate::pricing::{PriceQuery, PricingEngine};
use crate::quotes::models::{to_minor_units, Quote, QuoteRequest};
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub struct QuoteService {
    pricing: Arc<PricingEngine>,
    coupons: Arc<CouponValidator>,
    policy: QuotePolicy,
    metrics: PerformanceMetrics,
}

impl QuoteService {
    pub fn new(
        pricing: Arc<PricingEngine>,
        coupons: Arc<CouponValidator>,
        policy: QuotePolicy,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            pricing,
            coupons,
            policy,
            metrics,
        }
    }

    pub async fn quote(&self, request: &QuoteRequest) -> BookingResult<Quote> {
        let _timer = self.metrics.start(OperationType::Quote);

        if request.players == 0 {
            return Err(BookingError::InvalidRequest(
                "players must be at least 1".to_string(),
            ));
        }

        let coupon = match request.coupon_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                let context = CouponContext {
                    user_id: request.user_id.clone(),
                    user_email: request.user_email.clone(),
                };
                Some(self.coupons.validate(code, &context).await?)
            }
            _ => None,
        };

        let lead_time = request.date.and_time(request.time) - Local::now().naive_local();
        let query = PriceQuery {
            lead_time_hours: Some(lead_time.num_hours()),
            ..PriceQuery::new(&request.course_id, request.date, request.time, request.players)
        };
        let resolution = self.pricing.resolve(&query).await?;

        let discount = coupon
            .as_ref()
            .map(|coupon| coupon.discount_for(resolution.total_price))
            .unwrap_or(Decimal::ZERO);

        let price_per_player = minor(resolution.final_price_per_player)?;
        let subtotal = minor(resolution.total_price)?;
        let discount = minor(discount)?.min(subtotal);
        let tax = minor(Decimal::new(subtotal - discount, 2) * self.policy.tax_rate)?;

        let mut quote = Quote {
            course_id: request.course_id.clone(),
            date: request.date,
            time: request.time,
            players: request.players,
            coupon_code: coupon.map(|coupon| coupon.code),
            price_per_player,
            subtotal,
            discount,
            tax,
            total: subtotal - discount + tax,
            currency: resolution.currency,
            applied_rules: resolution.applied_rules,
            quote_hash: String::new(),
            expires_at: Utc::now() + self.policy.ttl,
        };
        quote.quote_hash = self.sign(&quote);

        tracing::debug!(
            "Quoted {} {} {} x{}: total {} {}",
            quote.course_id,
            quote.date,
            quote.time.format("%H:%M"),
            quote.players,
            quote.total,
            quote.currency
        );
        Ok(quote)
    }

    /// SHA-256 over the secret and the quote's canonical fields, hex encoded
    pub fn sign(&self, quote: &Quote) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.policy.secret.as_bytes());
        hasher.update(b"|");
        hasher.update(quote.canonical_fields().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn verify(&self, quote: &Quote) -> BookingResult<()> {
        self.verify_at(quote, Utc::now())
    }

    pub fn verify_at(&self, quote: &Quote, now: DateTime<Utc>) -> BookingResult<()> {
        if self.sign(quote) != quote.quote_hash {
            tracing::warn!("Rejected quote with mismatching hash for course {}", quote.course_id);
            return Err(BookingError::QuoteInvalid(
                "quote hash does not match its contents".to_string(),
            ));
        }
        if quote.expires_at <= now {
            return Err(BookingError::QuoteInvalid("quote has expired".to_string()));
        }
        if quote.total < 0 || quote.total != quote.subtotal - quote.discount + quote.tax {
            return Err(BookingError::QuoteInvalid(
                "quote totals are inconsistent".to_string(),
            ));
        }
        Ok(())
    }
}

fn minor(amount: Decimal) -> BookingResult<i64> {
    to_minor_units(amount)
        .ok_or_else(|| BookingError::InvalidRequest(format!("amount {} is out of range", amount)))
}
