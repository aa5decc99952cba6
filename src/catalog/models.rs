// Catalog models
//
// Per-course pricing catalog: seasons, time bands, price rules, special overrides and
// the base green fee. The whole catalog is persisted as one document per course, so the
// serde shape below is also the persistence contract.

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::timefmt::{hhmm, option_hhmm};
use chrono::{NaiveDate, NaiveTime, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Smallest rounding step a rule may use (one cent)
pub const MIN_ROUND_STEP: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
/// Upper bound on any configured per-player amount
pub const MAX_CATALOG_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
/// Upper bound on a multiplier rule
pub const MAX_MULTIPLIER: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Common shape of catalog collections keyed by id
pub trait CatalogEntry {
    /// Human-readable entry kind used in errors and logs
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Date interval with a priority; the highest-priority active season covering a date wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Season {
    /// Inclusive on both ends
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.active && self.start_date <= date && date <= self.end_date
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.start_date > self.end_date {
            return Err(CatalogError::InvalidEntry(format!(
                "season '{}' ends before it starts",
                self.id
            )));
        }
        Ok(())
    }
}

impl CatalogEntry for Season {
    const KIND: &'static str = "season";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Time-of-day interval with a label (e.g. "Twilight")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBand {
    pub id: String,
    pub label: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl TimeBand {
    /// Half-open: `start_time <= time < end_time`
    pub fn covers(&self, time: NaiveTime) -> bool {
        self.active && self.start_time <= time && time < self.end_time
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.start_time >= self.end_time {
            return Err(CatalogError::InvalidEntry(format!(
                "time band '{}' must start before it ends",
                self.id
            )));
        }
        Ok(())
    }
}

impl CatalogEntry for TimeBand {
    const KIND: &'static str = "time band";

    fn id(&self) -> &str {
        &self.id
    }
}

/// How a price rule transforms the running price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleOperation {
    /// Replace the running price
    Fixed(Decimal),
    /// Add to the running price (negative values discount)
    Delta(Decimal),
    /// Scale the running price
    Multiplier(Decimal),
}

impl RuleOperation {
    /// `None` when the result does not fit in a `Decimal`
    pub fn apply(&self, price: Decimal) -> Option<Decimal> {
        match self {
            RuleOperation::Fixed(value) => Some(*value),
            RuleOperation::Delta(value) => price.checked_add(*value),
            RuleOperation::Multiplier(value) => price.checked_mul(*value),
        }
    }
}

/// A priority-ordered pricing rule gated by optional filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,

    #[serde(default)]
    pub season_id: Option<String>,
    #[serde(default)]
    pub dow: Option<Vec<Weekday>>,
    #[serde(default)]
    pub time_band_id: Option<String>,

    // Dynamic filters. Stored and round-tripped, never evaluated.
    #[serde(default)]
    pub lead_time_min_hours: Option<i64>,
    #[serde(default)]
    pub lead_time_max_hours: Option<i64>,
    #[serde(default)]
    pub occupancy_min_pct: Option<i32>,
    #[serde(default)]
    pub occupancy_max_pct: Option<i32>,
    #[serde(default)]
    pub players_min: Option<i32>,
    #[serde(default)]
    pub players_max: Option<i32>,

    pub operation: RuleOperation,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub round_to: Option<Decimal>,
}

/// What a rule's static filters are matched against
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub season_id: Option<&'a str>,
    pub time_band_id: Option<&'a str>,
}

impl PriceRule {
    /// True when the rule is active, in its effective window, and every static filter it
    /// sets matches the resolved season, weekday and time band
    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        if !self.active {
            return false;
        }
        if self.effective_from.is_some_and(|from| ctx.date < from) {
            return false;
        }
        if self.effective_to.is_some_and(|to| ctx.date > to) {
            return false;
        }
        if let Some(ref season_id) = self.season_id {
            if ctx.season_id != Some(season_id.as_str()) {
                return false;
            }
        }
        if let Some(ref days) = self.dow {
            if !days.is_empty() && !days.contains(&ctx.weekday) {
                return false;
            }
        }
        if let Some(ref band_id) = self.time_band_id {
            if ctx.time_band_id != Some(band_id.as_str()) {
                return false;
            }
        }
        true
    }

    /// Whether any lead-time, occupancy or party-size filter is set
    pub fn has_dynamic_filters(&self) -> bool {
        self.lead_time_min_hours.is_some()
            || self.lead_time_max_hours.is_some()
            || self.occupancy_min_pct.is_some()
            || self.occupancy_max_pct.is_some()
            || self.players_min.is_some()
            || self.players_max.is_some()
    }

    /// Operation, then clamp to `[min_price, max_price]`, then round to `round_to`.
    /// `None` on arithmetic overflow.
    pub fn apply(&self, price: Decimal) -> Option<Decimal> {
        let mut next = self.operation.apply(price)?;
        if let Some(min) = self.min_price {
            next = next.max(min);
        }
        if let Some(max) = self.max_price {
            next = next.min(max);
        }
        if let Some(step) = self.round_to {
            next = round_to_step(next, step)?;
        }
        Some(next)
    }

    fn validate(&self) -> CatalogResult<()> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(CatalogError::InvalidEntry(format!(
                    "price rule '{}' has minPrice above maxPrice",
                    self.id
                )));
            }
        }
        if self.round_to.is_some_and(|step| step < MIN_ROUND_STEP || step > MAX_CATALOG_PRICE) {
            return Err(CatalogError::InvalidEntry(format!(
                "price rule '{}' must round to a step between {} and {}",
                self.id, MIN_ROUND_STEP, MAX_CATALOG_PRICE
            )));
        }
        for bound in [self.min_price, self.max_price].into_iter().flatten() {
            check_amount(&format!("price rule '{}' clamp", self.id), bound)?;
        }
        if let (Some(from), Some(to)) = (self.effective_from, self.effective_to) {
            if from > to {
                return Err(CatalogError::InvalidEntry(format!(
                    "price rule '{}' has an empty effective window",
                    self.id
                )));
            }
        }
        match self.operation {
            RuleOperation::Multiplier(value) | RuleOperation::Fixed(value)
                if value < Decimal::ZERO =>
            {
                Err(CatalogError::InvalidEntry(format!(
                    "price rule '{}' must not use a negative fixed price or multiplier",
                    self.id
                )))
            }
            RuleOperation::Multiplier(value) if value > MAX_MULTIPLIER => {
                Err(CatalogError::InvalidEntry(format!(
                    "price rule '{}' multiplier exceeds {}",
                    self.id, MAX_MULTIPLIER
                )))
            }
            RuleOperation::Fixed(value) | RuleOperation::Delta(value) => {
                check_amount(&format!("price rule '{}'", self.id), value.abs())
            }
            RuleOperation::Multiplier(_) => Ok(()),
        }
    }
}

impl CatalogEntry for PriceRule {
    const KIND: &'static str = "price rule";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Round half away from zero to the nearest multiple of `step`; `None` on overflow
pub fn round_to_step(value: Decimal, step: Decimal) -> Option<Decimal> {
    if step <= Decimal::ZERO {
        return Some(value);
    }
    value
        .checked_div(step)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(step)
}

fn check_amount(what: &str, amount: Decimal) -> CatalogResult<()> {
    if amount > MAX_CATALOG_PRICE {
        return Err(CatalogError::InvalidEntry(format!(
            "{} exceeds {}",
            what, MAX_CATALOG_PRICE
        )));
    }
    Ok(())
}

/// What a matching override does to the slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "overrideType", rename_all = "snake_case")]
pub enum OverrideAction {
    /// The slot cannot be sold
    Block,
    /// The slot sells at this per-player price, bypassing every rule
    Price { price: Decimal },
}

/// Date (and optional time) window of maximal pricing precedence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialOverride {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub priority: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default, with = "option_hhmm", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "option_hhmm", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(flatten)]
    pub action: OverrideAction,
}

impl SpecialOverride {
    /// Dates and times are both inclusive so a single tee time can be targeted
    pub fn covers(&self, date: NaiveDate, time: NaiveTime) -> bool {
        self.active
            && self.start_date <= date
            && date <= self.end_date
            && self.start_time.map_or(true, |start| time >= start)
            && self.end_time.map_or(true, |end| time <= end)
    }

    pub fn is_block(&self) -> bool {
        matches!(self.action, OverrideAction::Block)
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.start_date > self.end_date {
            return Err(CatalogError::InvalidEntry(format!(
                "override '{}' ends before it starts",
                self.id
            )));
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(CatalogError::InvalidEntry(format!(
                    "override '{}' has an empty time window",
                    self.id
                )));
            }
        }
        if let OverrideAction::Price { price } = self.action {
            if price < Decimal::ZERO {
                return Err(CatalogError::InvalidEntry(format!(
                    "override '{}' must not have a negative price",
                    self.id
                )));
            }
            check_amount(&format!("override '{}' price", self.id), price)?;
        }
        Ok(())
    }
}

impl CatalogEntry for SpecialOverride {
    const KIND: &'static str = "special override";

    fn id(&self) -> &str {
        &self.id
    }
}

/// The course's base green fee per player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseProduct {
    pub green_fee_base_usd: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// Everything the pricing engine knows about one course
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCatalog {
    #[serde(default)]
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub time_bands: Vec<TimeBand>,
    #[serde(default)]
    pub price_rules: Vec<PriceRule>,
    #[serde(default)]
    pub special_overrides: Vec<SpecialOverride>,
    #[serde(default)]
    pub base_product: Option<BaseProduct>,
}

impl CourseCatalog {
    /// Highest-priority active override covering the slot; ties go to catalog order
    pub fn winning_override(&self, date: NaiveDate, time: NaiveTime) -> Option<&SpecialOverride> {
        self.special_overrides
            .iter()
            .filter(|o| o.covers(date, time))
            .fold(None, |best: Option<&SpecialOverride>, candidate| match best {
                Some(current) if current.priority >= candidate.priority => Some(current),
                _ => Some(candidate),
            })
    }

    /// The override blocking this slot, if the winning override is a block
    pub fn blocking_override(&self, date: NaiveDate, time: NaiveTime) -> Option<&SpecialOverride> {
        self.winning_override(date, time).filter(|o| o.is_block())
    }

    /// Highest-priority active season covering the date; ties go to catalog order
    pub fn season_for(&self, date: NaiveDate) -> Option<&Season> {
        self.seasons
            .iter()
            .filter(|s| s.covers(date))
            .fold(None, |best: Option<&Season>, candidate| match best {
                Some(current) if current.priority >= candidate.priority => Some(current),
                _ => Some(candidate),
            })
    }

    /// First active time band covering the time
    pub fn time_band_for(&self, time: NaiveTime) -> Option<&TimeBand> {
        self.time_bands.iter().find(|band| band.covers(time))
    }

    /// Validate every entry and id uniqueness within each collection
    pub fn validate(&self) -> CatalogResult<()> {
        ensure_unique_ids(&self.seasons)?;
        ensure_unique_ids(&self.time_bands)?;
        ensure_unique_ids(&self.price_rules)?;
        ensure_unique_ids(&self.special_overrides)?;

        self.seasons.iter().try_for_each(Season::validate)?;
        self.time_bands.iter().try_for_each(TimeBand::validate)?;
        self.price_rules.iter().try_for_each(PriceRule::validate)?;
        self.special_overrides.iter().try_for_each(SpecialOverride::validate)?;

        if let Some(ref base) = self.base_product {
            if base.green_fee_base_usd < Decimal::ZERO {
                return Err(CatalogError::InvalidEntry(
                    "base green fee must be non-negative".to_string(),
                ));
            }
            check_amount("base green fee", base.green_fee_base_usd)?;
        }
        Ok(())
    }
}

fn ensure_unique_ids<T: CatalogEntry>(entries: &[T]) -> CatalogResult<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.id().trim().is_empty() {
            return Err(CatalogError::InvalidEntry(format!("{} with empty id", T::KIND)));
        }
        if !seen.insert(entry.id()) {
            return Err(CatalogError::InvalidEntry(format!(
                "duplicate {} id '{}'",
                T::KIND,
                entry.id()
            )));
        }
    }
    Ok(())
}

/// Insert or replace an entry by id, keeping catalog order for replacements
pub fn upsert_entry<T: CatalogEntry>(entries: &mut Vec<T>, entry: T) {
    match entries.iter_mut().find(|existing| existing.id() == entry.id()) {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

/// Remove an entry by id; returns false when nothing matched
pub fn remove_entry<T: CatalogEntry>(entries: &mut Vec<T>, id: &str) -> bool {
    let before = entries.len();
    entries.retain(|entry| entry.id() != id);
    entries.len() != before
}
