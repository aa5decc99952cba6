// Booking notifications
//
// Receipts and alerts go out after a reservation commits. The coordinator only enqueues
// an event; a background worker fans it out to every sink, each delivery in its own
// task with its own retries. A failed or slow sink never reaches the booking response.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery via {sink} failed: {message}")]
    Delivery { sink: String, message: String },
}

/// What a committed booking tells the outside world
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub booking_id: Uuid,
    pub confirmation_number: String,
    pub course_id: String,
    pub tee_time_id: String,
    pub players: i32,
    pub total_price: Decimal,
    pub customer_email: String,
    pub user_id: Option<String>,
}

impl From<&crate::booking::models::Booking> for BookingEvent {
    fn from(booking: &crate::booking::models::Booking) -> Self {
        Self {
            booking_id: booking.id,
            confirmation_number: booking.confirmation_number.clone(),
            course_id: booking.course_id.clone(),
            tee_time_id: booking.tee_time_id.clone(),
            players: booking.players,
            total_price: booking.total_price,
            customer_email: booking.customer_email.clone(),
            user_id: booking.user_id.clone(),
        }
    }
}

/// A delivery channel (receipt email, SMS, admin alert)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, event: &BookingEvent) -> Result<(), NotificationError>;
}

/// Writes booking events to the application log
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &BookingEvent) -> Result<(), NotificationError> {
        tracing::info!(
            booking_id = %event.booking_id,
            confirmation = %event.confirmation_number,
            tee_time = %event.tee_time_id,
            players = event.players,
            "Booking confirmed"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

/// Queue in front of the notification worker; cheap to clone
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<BookingEvent>,
}

impl NotificationDispatcher {
    /// Spawn the worker on the current runtime
    pub fn start(sinks: Vec<Arc<dyn NotificationSink>>, retry: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(receiver, sinks, retry));
        Self { sender }
    }

    /// Enqueue an event. Never blocks and never fails the caller.
    pub fn dispatch(&self, event: BookingEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(
                "Notification worker stopped, dropping event for booking {}",
                e.0.booking_id
            );
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<BookingEvent>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    retry: RetryPolicy,
) {
    tracing::info!("Notification worker started with {} sinks", sinks.len());

    while let Some(event) = receiver.recv().await {
        for sink in &sinks {
            tokio::spawn(deliver_with_retry(
                Arc::clone(sink),
                event.clone(),
                retry.clone(),
            ));
        }
    }

    tracing::info!("Notification channel closed, worker stopping");
}

async fn deliver_with_retry(sink: Arc<dyn NotificationSink>, event: BookingEvent, retry: RetryPolicy) {
    let attempts = retry.max_attempts.max(1);

    for attempt in 1..=attempts {
        match sink.deliver(&event).await {
            Ok(()) => {
                tracing::debug!(
                    "Delivered booking {} via {} (attempt {})",
                    event.booking_id,
                    sink.name(),
                    attempt
                );
                return;
            }
            Err(e) if attempt < attempts => {
                tracing::warn!("{} (attempt {}/{}), retrying", e, attempt, attempts);
                tokio::time::sleep(retry.base_delay * 2u32.pow(attempt - 1)).await;
            }
            Err(e) => {
                tracing::error!(
                    "Giving up on notification for booking {}: {}",
                    event.booking_id,
                    e
                );
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    fn event() -> BookingEvent {
        BookingEvent {
            booking_id: Uuid::new_v4(),
            confirmation_number: "TRG-ABC123".to_string(),
            course_id: "pebble".to_string(),
            tee_time_id: "pebble_2025-07-05_0800".to_string(),
            players: 2,
            total_price: dec!(240),
            customer_email: "a@b.com".to_string(),
            user_id: None,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_events_reach_every_sink() {
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        let sinks: Vec<Arc<dyn NotificationSink>> =
            vec![first.clone(), second.clone(), Arc::new(LogNotificationSink)];
        let dispatcher = NotificationDispatcher::start(sinks, fast_retry());

        dispatcher.dispatch(event());
        assert_eq!(first.wait_for(1, Duration::from_secs(1)).await, 1);
        assert_eq!(second.wait_for(1, Duration::from_secs(1)).await, 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried() {
        let sink = Arc::new(RecordingSink::failing(2));
        let sinks: Vec<Arc<dyn NotificationSink>> = vec![sink.clone()];
        let dispatcher = NotificationDispatcher::start(sinks, fast_retry());

        dispatcher.dispatch(event());
        assert_eq!(sink.wait_for(1, Duration::from_secs(1)).await, 1);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sink_gives_up_after_max_attempts() {
        let broken = Arc::new(RecordingSink::failing(u32::MAX));
        let healthy = Arc::new(RecordingSink::default());
        let sinks: Vec<Arc<dyn NotificationSink>> = vec![broken.clone(), healthy.clone()];
        let dispatcher = NotificationDispatcher::start(sinks, fast_retry());

        dispatcher.dispatch(event());
        assert_eq!(healthy.wait_for(1, Duration::from_secs(1)).await, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(broken.attempts.load(Ordering::SeqCst), 3);
        assert!(broken.delivered.lock().await.is_empty());
    }
}
