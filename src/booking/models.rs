use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

const CONFIRMATION_PREFIX: &str = "TRG-";
const CONFIRMATION_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CONFIRMATION_LENGTH: usize = 6;

/// `TRG-` followed by six random base-36 characters. Not checked for uniqueness.
pub fn generate_confirmation_number() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CONFIRMATION_LENGTH)
        .map(|_| CONFIRMATION_ALPHABET[rng.gen_range(0..CONFIRMATION_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", CONFIRMATION_PREFIX, suffix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub confirmation_number: String,
    pub course_id: String,
    pub tee_time_id: String,
    pub players: i32,
    pub total_price: Decimal,
    pub coupon_code: Option<String>,
    pub status: BookingStatus,
    /// Set for registered customers, empty for guests
    pub user_id: Option<String>,
    pub customer_email: String,
    pub created_at: DateTime<Utc>,
}

/// Loyalty state of a registered customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub user_id: String,
    pub email: String,
    pub loyalty_points: i64,
    pub first_booking_achieved: bool,
    pub total_bookings: i32,
}

impl CustomerProfile {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            loyalty_points: 0,
            first_booking_achieved: false,
            total_bookings: 0,
        }
    }

    /// Award the booking bonus and record the first-booking achievement
    pub fn record_booking(&mut self, bonus_points: i64) {
        self.loyalty_points += bonus_points;
        self.first_booking_achieved = true;
        self.total_bookings += 1;
    }
}

/// The party making a reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Customer {
    Registered {
        #[serde(rename = "userId")]
        user_id: String,
        email: String,
    },
    Guest {
        email: String,
    },
}

impl Customer {
    pub fn email(&self) -> &str {
        match self {
            Customer::Registered { email, .. } | Customer::Guest { email } => email,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Customer::Registered { user_id, .. } => Some(user_id),
            Customer::Guest { .. } => None,
        }
    }
}

/// Everything `reserve` needs, already priced
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub course_id: String,
    pub tee_time_id: String,
    pub players: i32,
    pub coupon_code: Option<String>,
    pub customer: Customer,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub booking_id: Uuid,
    #[schema(example = "TRG-7K2Q9X")]
    pub confirmation_number: String,
}
