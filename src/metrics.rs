// Performance Metrics for the tee-time core
//
// Tracks price-cache hit rates, execution times of pricing, listing, quoting and
// reservation, and reservation write-conflict retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Performance threshold for slow operations (100ms)
const SLOW_OPERATION_THRESHOLD_MS: u64 = 100;

/// Type of operation being timed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    PriceResolution,
    SlotListing,
    Quote,
    Reservation,
}

impl OperationType {
    fn label(&self) -> &'static str {
        match self {
            OperationType::PriceResolution => "price resolution",
            OperationType::SlotListing => "slot listing",
            OperationType::Quote => "quote",
            OperationType::Reservation => "reservation",
        }
    }
}

#[derive(Debug, Default)]
struct OperationStats {
    count: AtomicU64,
    total_time_us: AtomicU64,
    slow: AtomicU64,
}

impl OperationStats {
    fn record(&self, duration: Duration) -> bool {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        let slow = duration.as_millis() as u64 > SLOW_OPERATION_THRESHOLD_MS;
        if slow {
            self.slow.fetch_add(1, Ordering::Relaxed);
        }
        slow
    }

    fn avg_ms(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        let total_us = self.total_time_us.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            (total_us as f64 / count as f64) / 1000.0
        }
    }
}

#[derive(Debug, Default)]
struct MetricsInner {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    reservation_retries: AtomicU64,
    price_resolution: OperationStats,
    slot_listing: OperationStats,
    quote: OperationStats,
    reservation: OperationStats,
}

impl MetricsInner {
    fn stats(&self, operation: OperationType) -> &OperationStats {
        match operation {
            OperationType::PriceResolution => &self.price_resolution,
            OperationType::SlotListing => &self.slot_listing,
            OperationType::Quote => &self.quote,
            OperationType::Reservation => &self.reservation,
        }
    }
}

/// Performance metrics shared by the pricing engine, inventory, quotes and bookings
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    inner: Arc<MetricsInner>,
}

impl PerformanceMetrics {
    /// Create a new PerformanceMetrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a price cache hit
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a price cache miss
    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reservation attempt retried after a write conflict
    pub fn record_reservation_retry(&self) {
        self.inner.reservation_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Get cache hit rate (0.0 to 1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Start timing an operation; the duration is recorded when the timer drops
    pub fn start(&self, operation: OperationType) -> OperationTimer {
        OperationTimer {
            start: Instant::now(),
            operation,
            metrics: self.clone(),
        }
    }

    fn record(&self, operation: OperationType, duration: Duration) {
        if self.inner.stats(operation).record(duration) {
            tracing::warn!("Slow {}: {}ms", operation.label(), duration.as_millis());
        }
    }

    /// Average duration of an operation type in milliseconds
    pub fn avg_time_ms(&self, operation: OperationType) -> f64 {
        self.inner.stats(operation).avg_ms()
    }

    /// Get metrics summary
    pub fn summary(&self) -> MetricsSummary {
        let inner = &self.inner;
        MetricsSummary {
            cache_hit_rate: self.cache_hit_rate(),
            cache_hits: inner.cache_hits.load(Ordering::Relaxed),
            cache_misses: inner.cache_misses.load(Ordering::Relaxed),
            price_resolutions: inner.price_resolution.count.load(Ordering::Relaxed),
            avg_price_resolution_ms: inner.price_resolution.avg_ms(),
            slow_price_resolutions: inner.price_resolution.slow.load(Ordering::Relaxed),
            slot_listings: inner.slot_listing.count.load(Ordering::Relaxed),
            avg_slot_listing_ms: inner.slot_listing.avg_ms(),
            quotes: inner.quote.count.load(Ordering::Relaxed),
            avg_quote_ms: inner.quote.avg_ms(),
            reservations: inner.reservation.count.load(Ordering::Relaxed),
            avg_reservation_ms: inner.reservation.avg_ms(),
            slow_reservations: inner.reservation.slow.load(Ordering::Relaxed),
            reservation_retries: inner.reservation_retries.load(Ordering::Relaxed),
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            "Tee-time core metrics:\n\
             Price cache: {:.1}% hit rate ({} hits, {} misses)\n\
             Pricing: {} resolutions, avg {:.2}ms, {} slow\n\
             Listings: {} requests, avg {:.2}ms\n\
             Quotes: {} issued, avg {:.2}ms\n\
             Reservations: {} attempts, avg {:.2}ms, {} slow, {} conflict retries",
            summary.cache_hit_rate * 100.0,
            summary.cache_hits,
            summary.cache_misses,
            summary.price_resolutions,
            summary.avg_price_resolution_ms,
            summary.slow_price_resolutions,
            summary.slot_listings,
            summary.avg_slot_listing_ms,
            summary.quotes,
            summary.avg_quote_ms,
            summary.reservations,
            summary.avg_reservation_ms,
            summary.slow_reservations,
            summary.reservation_retries,
        );
    }
}

/// Timer for tracking operation duration
pub struct OperationTimer {
    start: Instant,
    operation: OperationType,
    metrics: PerformanceMetrics,
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        self.metrics.record(self.operation, self.start.elapsed());
    }
}

/// Summary of performance metrics
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub cache_hit_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub price_resolutions: u64,
    pub avg_price_resolution_ms: f64,
    pub slow_price_resolutions: u64,
    pub slot_listings: u64,
    pub avg_slot_listing_ms: f64,
    pub quotes: u64,
    pub avg_quote_ms: f64,
    pub reservations: u64,
    pub avg_reservation_ms: f64,
    pub slow_reservations: u64,
    pub reservation_retries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_metrics_creation() {
        let metrics = PerformanceMetrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);
        assert_eq!(metrics.avg_time_ms(OperationType::Reservation), 0.0);
    }

    #[test]
    fn test_cache_metrics() {
        let metrics = PerformanceMetrics::new();

        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        assert_eq!(metrics.cache_hit_rate(), 2.0 / 3.0);
    }

    #[test]
    fn test_operation_timer_records_once() {
        let metrics = PerformanceMetrics::new();

        {
            let _timer = metrics.start(OperationType::Quote);
            thread::sleep(Duration::from_millis(10));
        }

        let summary = metrics.summary();
        assert_eq!(summary.quotes, 1);
        assert!(summary.avg_quote_ms >= 10.0);
    }

    #[test]
    fn test_slow_operation_detection() {
        let metrics = PerformanceMetrics::new();

        {
            let _timer = metrics.start(OperationType::PriceResolution);
            thread::sleep(Duration::from_millis(150));
        }

        let summary = metrics.summary();
        assert_eq!(summary.slow_price_resolutions, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = PerformanceMetrics::new();
        let clone = metrics.clone();

        clone.record_reservation_retry();
        assert_eq!(metrics.summary().reservation_retries, 1);
    }
}
