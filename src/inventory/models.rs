use crate::timefmt::{hhmm, time_code};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Default number of players a tee time holds
pub const DEFAULT_MAX_PLAYERS: i32 = 4;

/// Slot lifecycle: `available -> partial -> booked`, plus `blocked` from any state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Partial,
    Booked,
    Blocked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Partial => "partial",
            SlotStatus::Booked => "booked",
            SlotStatus::Blocked => "blocked",
        }
    }

    /// Status implied by the seat counts of an unblocked slot
    pub fn from_counts(max_players: i32, booked_players: i32) -> Self {
        if booked_players >= max_players {
            SlotStatus::Booked
        } else if booked_players > 0 {
            SlotStatus::Partial
        } else {
            SlotStatus::Available
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Course settings that shape the daily tee sheet
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    /// Hidden courses list no tee times and accept no reservations
    pub hidden: bool,
    pub interval_minutes: i32,
    #[serde(with = "hhmm")]
    pub first_tee_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub last_tee_time: NaiveTime,
    pub max_players: i32,
}

impl Course {
    /// Tee times from first to last tee time inclusive, stepping by the interval
    pub fn tee_times(&self) -> Vec<NaiveTime> {
        let mut times = vec![];
        if self.first_tee_time > self.last_tee_time {
            return times;
        }
        if self.interval_minutes <= 0 {
            times.push(self.first_tee_time);
            return times;
        }

        let step = chrono::Duration::minutes(i64::from(self.interval_minutes));
        let mut current = self.first_tee_time;
        loop {
            times.push(current);
            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 || next > self.last_tee_time {
                break;
            }
            current = next;
        }
        times
    }
}

/// Deterministic tee-time id: `{courseId}_{YYYY-MM-DD}_{HHMM}`
pub fn slot_id(course_id: &str, date: NaiveDate, time: NaiveTime) -> String {
    format!("{}_{}_{}", course_id, date.format("%Y-%m-%d"), time_code(time))
}

/// One bookable tee time and its seat accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeeTimeSlot {
    pub id: String,
    pub course_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub max_players: i32,
    pub booked_players: i32,
    pub available_spots: i32,
    pub status: SlotStatus,
    pub booking_ids: Vec<Uuid>,
}

impl TeeTimeSlot {
    /// A fresh slot with no bookings
    pub fn new(course_id: &str, date: NaiveDate, time: NaiveTime, max_players: i32, blocked: bool) -> Self {
        Self {
            id: slot_id(course_id, date, time),
            course_id: course_id.to_string(),
            date,
            time,
            max_players,
            booked_players: 0,
            available_spots: max_players,
            status: if blocked {
                SlotStatus::Blocked
            } else {
                SlotStatus::from_counts(max_players, 0)
            },
            booking_ids: vec![],
        }
    }

    /// Take `players` seats for a booking, keeping counts and status consistent.
    ///
    /// Callers check `players <= available_spots` first; this only guards against
    /// corrupting the counts.
    pub fn reserve_seats(&mut self, booking_id: Uuid, players: i32) -> Result<(), String> {
        if players <= 0 {
            return Err("players must be at least 1".to_string());
        }
        if players > self.available_spots {
            return Err(format!(
                "{} players requested but only {} spots available",
                players, self.available_spots
            ));
        }

        self.booked_players += players;
        self.available_spots = self.max_players - self.booked_players;
        self.booking_ids.push(booking_id);
        if self.status != SlotStatus::Blocked {
            self.status = SlotStatus::from_counts(self.max_players, self.booked_players);
        }
        Ok(())
    }

    /// Seat counts and stored status agree with each other
    pub fn is_consistent(&self) -> bool {
        let counts_ok = self.available_spots == self.max_players - self.booked_players
            && self.booked_players >= 0
            && self.available_spots >= 0;
        let status_ok = self.status == SlotStatus::Blocked
            || self.status == SlotStatus::from_counts(self.max_players, self.booked_players);
        counts_ok && status_ok
    }
}

/// Listing entry for one tee time, with the status as currently reported
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeeTimeView {
    #[schema(example = "pebble_2025-07-05_0800")]
    pub id: String,
    pub course_id: String,
    #[schema(value_type = String, example = "2025-07-05")]
    pub date: NaiveDate,
    #[schema(example = "08:00")]
    pub time: String,
    pub max_players: i32,
    pub booked_players: i32,
    pub available_spots: i32,
    pub status: SlotStatus,
    /// Per-player price for the requested party size when the slot is priced
    #[schema(value_type = Option<String>, example = "132.00")]
    pub price_per_player: Option<rust_decimal::Decimal>,
    #[schema(value_type = Option<String>, example = "264.00")]
    pub total_price: Option<rust_decimal::Decimal>,
    pub currency: Option<String>,
}

impl TeeTimeView {
    pub fn from_slot(slot: &TeeTimeSlot, status: SlotStatus) -> Self {
        Self {
            id: slot.id.clone(),
            course_id: slot.course_id.clone(),
            date: slot.date,
            time: crate::timefmt::format_time(slot.time),
            max_players: slot.max_players,
            booked_players: slot.booked_players,
            available_spots: slot.available_spots,
            status,
            price_per_player: None,
            total_price: None,
            currency: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 5).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn course(first: NaiveTime, last: NaiveTime, interval: i32) -> Course {
        Course {
            id: "pebble".to_string(),
            name: "Pebble".to_string(),
            hidden: false,
            interval_minutes: interval,
            first_tee_time: first,
            last_tee_time: last,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }

    #[test]
    fn test_tee_times_grid_is_inclusive() {
        let times = course(time(7, 0), time(8, 0), 10).tee_times();
        assert_eq!(times.len(), 7);
        assert_eq!(times.first(), Some(&time(7, 0)));
        assert_eq!(times.last(), Some(&time(8, 0)));

        let times = course(time(7, 0), time(7, 55), 10).tee_times();
        assert_eq!(times.last(), Some(&time(7, 50)));
    }

    #[test]
    fn test_tee_times_stops_at_midnight() {
        let times = course(time(23, 30), time(23, 59), 20).tee_times();
        assert_eq!(times, vec![time(23, 30), time(23, 50)]);
    }

    #[test]
    fn test_slot_id_format() {
        assert_eq!(slot_id("pebble", date(), time(7, 5)), "pebble_2025-07-05_0705");
    }

    #[test]
    fn test_reserve_seats_transitions() {
        let mut slot = TeeTimeSlot::new("pebble", date(), time(8, 0), 4, false);
        assert_eq!(slot.status, SlotStatus::Available);

        slot.reserve_seats(Uuid::new_v4(), 3).unwrap();
        assert_eq!(slot.status, SlotStatus::Partial);
        assert_eq!(slot.available_spots, 1);

        slot.reserve_seats(Uuid::new_v4(), 1).unwrap();
        assert_eq!(slot.status, SlotStatus::Booked);
        assert_eq!(slot.available_spots, 0);
        assert_eq!(slot.booking_ids.len(), 2);

        assert!(slot.reserve_seats(Uuid::new_v4(), 1).is_err());
        assert_eq!(slot.booked_players, 4);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&SlotStatus::Partial).unwrap(), "\"partial\"");
        assert_eq!(SlotStatus::Blocked.to_string(), "blocked");
    }

    proptest! {
        #[test]
        fn prop_reservations_keep_slot_consistent(
            max_players in 1i32..=8,
            requests in proptest::collection::vec(1i32..=4, 0..10),
        ) {
            let mut slot = TeeTimeSlot::new("pebble", date(), time(8, 0), max_players, false);
            let mut accepted = 0;

            for players in requests {
                let before = slot.clone();
                match slot.reserve_seats(Uuid::new_v4(), players) {
                    Ok(()) => accepted += players,
                    Err(_) => prop_assert_eq!(&slot, &before),
                }
                prop_assert!(slot.is_consistent());
            }

            prop_assert_eq!(slot.booked_players, accepted);
            prop_assert!(slot.booked_players <= slot.max_players);
            prop_assert_eq!(slot.status == SlotStatus::Booked, slot.available_spots == 0);
        }
    }
}
