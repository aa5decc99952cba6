// Tee-Time Inventory
//
// Slots are materialized lazily, a whole course day at a time, the first time the day
// is queried. Listings report an effective status on top of the stored one: time
// cutoffs and block overrides show as `blocked` without being written back.

use crate::booking::error::{BookingError, BookingResult};
use crate::booking::store::BookingStore;
use crate::catalog::{CourseCatalog, RuleCatalogStore};
use crate::config::InventoryPolicy;
use crate::inventory::models::{slot_id, Course, SlotStatus, TeeTimeSlot, TeeTimeView};
use crate::metrics::{OperationType, PerformanceMetrics};
use crate::pricing::{PricingEngine, PricingError};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::Arc;

/// Why a slot reports `blocked` at a given moment, if it does
pub fn time_block_reason(
    policy: &InventoryPolicy,
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
) -> Option<&'static str> {
    let today = now.date();
    if date < today {
        return Some("date has passed");
    }
    if date == today {
        if now.time() >= policy.daily_cutoff {
            return Some("same-day cutoff has passed");
        }
        if time <= now.time() {
            return Some("tee time has passed");
        }
    }
    None
}

pub struct TeeTimeInventory {
    store: Arc<dyn BookingStore>,
    catalog: Arc<RuleCatalogStore>,
    pricing: Arc<PricingEngine>,
    policy: InventoryPolicy,
    metrics: PerformanceMetrics,
}

impl TeeTimeInventory {
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<RuleCatalogStore>,
        pricing: Arc<PricingEngine>,
        policy: InventoryPolicy,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            store,
            catalog,
            pricing,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &InventoryPolicy {
        &self.policy
    }

    pub async fn course(&self, course_id: &str) -> BookingResult<Course> {
        self.store
            .find_course(course_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                resource: "Course",
                id: course_id.to_string(),
            })
    }

    /// Every slot of a course day, creating the ones not stored yet.
    ///
    /// Slots already in the past when created start out `blocked`.
    async fn materialize_day(
        &self,
        course: &Course,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> BookingResult<Vec<TeeTimeSlot>> {
        let grid = course.tee_times();
        let existing = self.store.slots_for_day(&course.id, date).await?;
        if existing.len() >= grid.len() {
            return Ok(existing);
        }

        let missing: Vec<TeeTimeSlot> = grid
            .into_iter()
            .filter(|time| !existing.iter().any(|slot| slot.time == *time))
            .map(|time| {
                let passed = date < now.date() || (date == now.date() && time <= now.time());
                TeeTimeSlot::new(&course.id, date, time, course.max_players, passed)
            })
            .collect();

        tracing::debug!(
            "Materializing {} tee times for course {} on {}",
            missing.len(),
            course.id,
            date
        );
        self.store.insert_missing_slots(&missing).await?;
        Ok(self.store.slots_for_day(&course.id, date).await?)
    }

    /// The slot at `time`, materializing its day first if needed
    pub async fn get_or_create_slot(
        &self,
        course_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> BookingResult<TeeTimeSlot> {
        self.get_or_create_slot_at(course_id, date, time, Local::now().naive_local())
            .await
    }

    pub async fn get_or_create_slot_at(
        &self,
        course_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        now: NaiveDateTime,
    ) -> BookingResult<TeeTimeSlot> {
        let id = slot_id(course_id, date, time);
        if let Some(slot) = self.store.find_slot(&id).await? {
            return Ok(slot);
        }

        let course = self.course(course_id).await?;
        if !course.tee_times().contains(&time) {
            return Err(BookingError::InvalidRequest(format!(
                "{} is not a tee time of course {}",
                time.format("%H:%M"),
                course_id
            )));
        }

        self.materialize_day(&course, date, now)
            .await?
            .into_iter()
            .find(|slot| slot.id == id)
            .ok_or(BookingError::NotFound {
                resource: "Tee time",
                id,
            })
    }

    /// Status the slot reports at `now`, with the reason when it is blocked
    pub fn effective_status(
        &self,
        slot: &TeeTimeSlot,
        catalog: &CourseCatalog,
        now: NaiveDateTime,
    ) -> (SlotStatus, Option<String>) {
        if slot.status == SlotStatus::Blocked {
            return (SlotStatus::Blocked, Some("tee time is blocked".to_string()));
        }
        if let Some(reason) = time_block_reason(&self.policy, slot.date, slot.time, now) {
            return (SlotStatus::Blocked, Some(reason.to_string()));
        }
        if let Some(special) = catalog.blocking_override(slot.date, slot.time) {
            return (
                SlotStatus::Blocked,
                Some(format!("closed by '{}'", special.name)),
            );
        }
        (slot.status, None)
    }

    /// Reason the slot cannot be sold at `now`, if any; loads the course catalog
    pub async fn block_reason(
        &self,
        slot: &TeeTimeSlot,
        now: NaiveDateTime,
    ) -> BookingResult<Option<String>> {
        let catalog = self
            .catalog
            .catalog(&slot.course_id)
            .await
            .map_err(PricingError::from)?;
        Ok(self.effective_status(slot, &catalog, now).1)
    }

    /// Same-day slots starting inside the minimum lead window are not listed
    fn is_listed(&self, slot: &TeeTimeSlot, now: NaiveDateTime) -> bool {
        if slot.date != now.date() {
            return true;
        }
        let earliest = now + Duration::minutes(self.policy.min_lead_minutes);
        slot.date.and_time(slot.time) >= earliest
    }

    pub async fn list_slots(&self, course_id: &str, date: NaiveDate) -> BookingResult<Vec<TeeTimeView>> {
        self.list_slots_at(course_id, date, Local::now().naive_local()).await
    }

    /// Listed slots of a course day. A hidden course lists nothing.
    pub async fn list_slots_at(
        &self,
        course_id: &str,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> BookingResult<Vec<TeeTimeView>> {
        let _timer = self.metrics.start(OperationType::SlotListing);

        let course = self.course(course_id).await?;
        if course.hidden {
            tracing::debug!("Course {} is hidden, listing no tee times", course_id);
            return Ok(vec![]);
        }

        let slots = self.materialize_day(&course, date, now).await?;
        let catalog = self
            .catalog
            .catalog(course_id)
            .await
            .map_err(PricingError::from)?;

        Ok(slots
            .iter()
            .filter(|slot| self.is_listed(slot, now))
            .map(|slot| TeeTimeView::from_slot(slot, self.effective_status(slot, &catalog, now).0))
            .collect())
    }

    pub async fn list_priced_slots(
        &self,
        course_id: &str,
        date: NaiveDate,
        players: u32,
    ) -> BookingResult<Vec<TeeTimeView>> {
        self.list_priced_slots_at(course_id, date, players, Local::now().naive_local())
            .await
    }

    /// Listed slots with prices for a party size, resolved in one batch.
    ///
    /// Blocked slots carry no price.
    pub async fn list_priced_slots_at(
        &self,
        course_id: &str,
        date: NaiveDate,
        players: u32,
        now: NaiveDateTime,
    ) -> BookingResult<Vec<TeeTimeView>> {
        if players == 0 {
            return Err(BookingError::InvalidRequest(
                "players must be at least 1".to_string(),
            ));
        }

        let mut views = self.list_slots_at(course_id, date, now).await?;
        let times: Vec<NaiveTime> = views
            .iter()
            .filter(|view| view.status != SlotStatus::Blocked)
            .filter_map(|view| crate::timefmt::parse_time(&view.time).ok())
            .collect();
        if times.is_empty() {
            return Ok(views);
        }

        let prices: HashMap<String, _> = self
            .pricing
            .resolve_day(course_id, date, &times, players)
            .await?
            .into_iter()
            .filter_map(|slot_price| match slot_price.price {
                Ok(resolution) => Some((crate::timefmt::format_time(slot_price.time), resolution)),
                Err(e) => {
                    tracing::debug!("No price for {} {}: {}", course_id, slot_price.time, e);
                    None
                }
            })
            .collect();

        for view in views.iter_mut() {
            if let Some(resolution) = prices.get(&view.time) {
                view.price_per_player = Some(resolution.final_price_per_player);
                view.total_price = Some(resolution.total_price);
                view.currency = Some(resolution.currency.clone());
            }
        }
        Ok(views)
    }
}
