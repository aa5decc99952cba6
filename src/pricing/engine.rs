// Pricing Rule Engine
//
// Resolves a per-player green fee for (course, date, time, players):
// 1. The winning special override either blocks the slot or fixes its price
// 2. Otherwise start from the course's base green fee
// 3. Resolve the season and time band
// 4. Select active rules whose static filters match
// 5. Apply them by descending priority, clamping and rounding after each step
// 6. Multiply by the player count

use crate::catalog::models::{CourseCatalog, OverrideAction, RuleContext};
use crate::catalog::RuleCatalogStore;
use crate::metrics::{OperationType, PerformanceMetrics};
use crate::pricing::cache::{PriceCache, PriceCacheKey};
use crate::pricing::error::{PricingError, PricingResult};
use chrono::{Datelike, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const OVERRIDE_CURRENCY: &str = "USD";

/// Input to a price resolution
#[derive(Debug, Clone)]
pub struct PriceQuery {
    pub course_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub players: u32,
    pub lead_time_hours: Option<i64>,
    /// Accepted for rule filters that are not evaluated; never part of the cache key
    pub occupancy_percent: Option<i32>,
}

impl PriceQuery {
    pub fn new(course_id: impl Into<String>, date: NaiveDate, time: NaiveTime, players: u32) -> Self {
        Self {
            course_id: course_id.into(),
            date,
            time,
            players,
            lead_time_hours: None,
            occupancy_percent: None,
        }
    }

    fn cache_key(&self) -> PriceCacheKey {
        PriceCacheKey {
            course_id: self.course_id.clone(),
            date: self.date,
            time: self.time,
            players: self.players,
            lead_time_hours: self.lead_time_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedRuleKind {
    PriceRule,
    SpecialOverride,
}

/// One step of the resolution, kept for auditability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRule {
    pub rule_id: String,
    pub name: String,
    pub kind: AppliedRuleKind,
    pub priority: i32,
    pub price_before: Option<Decimal>,
    pub price_after: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResolution {
    pub final_price_per_player: Decimal,
    pub total_price: Decimal,
    pub applied_rules: Vec<AppliedRule>,
    pub currency: String,
    pub season_id: Option<String>,
    pub time_band_id: Option<String>,
}

/// Resolve a price against an already loaded catalog. Pure and deterministic.
pub fn resolve_with_catalog(
    catalog: &CourseCatalog,
    query: &PriceQuery,
) -> PricingResult<PriceResolution> {
    if query.players == 0 {
        return Err(PricingError::InvalidQuery(
            "players must be at least 1".to_string(),
        ));
    }
    let players = Decimal::from(query.players);

    if let Some(special) = catalog.winning_override(query.date, query.time) {
        return match special.action {
            OverrideAction::Block => Err(PricingError::NoCapacity {
                override_id: special.id.clone(),
            }),
            OverrideAction::Price { price } => Ok(PriceResolution {
                final_price_per_player: price,
                total_price: price
                    .checked_mul(players)
                    .ok_or_else(|| PricingError::Overflow(format!("override '{}'", special.id)))?,
                applied_rules: vec![AppliedRule {
                    rule_id: special.id.clone(),
                    name: special.name.clone(),
                    kind: AppliedRuleKind::SpecialOverride,
                    priority: special.priority,
                    price_before: None,
                    price_after: price,
                }],
                currency: catalog
                    .base_product
                    .as_ref()
                    .map(|base| base.currency.clone())
                    .unwrap_or_else(|| OVERRIDE_CURRENCY.to_string()),
                season_id: None,
                time_band_id: None,
            }),
        };
    }

    let base = catalog
        .base_product
        .as_ref()
        .ok_or_else(|| PricingError::BaseProductMissing(query.course_id.clone()))?;

    let season = catalog.season_for(query.date);
    let band = catalog.time_band_for(query.time);
    let context = RuleContext {
        date: query.date,
        weekday: query.date.weekday(),
        season_id: season.map(|s| s.id.as_str()),
        time_band_id: band.map(|b| b.id.as_str()),
    };

    let mut rules: Vec<_> = catalog
        .price_rules
        .iter()
        .filter(|rule| rule.matches(&context))
        .collect();
    // Stable, so equal priorities keep catalog order
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut price = base.green_fee_base_usd;
    let mut applied_rules = Vec::with_capacity(rules.len());
    for rule in rules {
        if rule.has_dynamic_filters() {
            tracing::debug!("Rule {} applied without evaluating its dynamic filters", rule.id);
        }
        let next = rule
            .apply(price)
            .ok_or_else(|| PricingError::Overflow(format!("rule '{}'", rule.id)))?;
        applied_rules.push(AppliedRule {
            rule_id: rule.id.clone(),
            name: rule.name.clone(),
            kind: AppliedRuleKind::PriceRule,
            priority: rule.priority,
            price_before: Some(price),
            price_after: next,
        });
        price = next;
    }

    let total_price = price
        .checked_mul(players)
        .ok_or_else(|| PricingError::Overflow("party total".to_string()))?;

    Ok(PriceResolution {
        final_price_per_player: price,
        total_price,
        applied_rules,
        currency: base.currency.clone(),
        season_id: season.map(|s| s.id.clone()),
        time_band_id: band.map(|b| b.id.clone()),
    })
}

/// Price of one slot of a batched day resolution
#[derive(Debug)]
pub struct SlotPrice {
    pub time: NaiveTime,
    pub price: PricingResult<PriceResolution>,
}

pub struct PricingEngine {
    catalog: Arc<RuleCatalogStore>,
    cache: Arc<dyn PriceCache>,
    metrics: PerformanceMetrics,
}

impl PricingEngine {
    pub fn new(
        catalog: Arc<RuleCatalogStore>,
        cache: Arc<dyn PriceCache>,
        metrics: PerformanceMetrics,
    ) -> Self {
        Self {
            catalog,
            cache,
            metrics,
        }
    }

    /// Resolve a price, served from the cache when a fresh entry exists.
    ///
    /// Concurrent misses for the same key each compute independently. The cache
    /// generation is read before the catalog so a result computed from a catalog
    /// replaced mid-flight is not stored.
    pub async fn resolve(&self, query: &PriceQuery) -> PricingResult<PriceResolution> {
        let _timer = self.metrics.start(OperationType::PriceResolution);
        let key = query.cache_key();

        if let Some(hit) = self.cache.get(&key).await {
            self.metrics.record_cache_hit();
            return Ok(hit);
        }
        self.metrics.record_cache_miss();

        let generation = self.cache.generation(&query.course_id).await;
        let catalog = self.catalog.catalog(&query.course_id).await?;
        let resolution = resolve_with_catalog(&catalog, query)?;
        tracing::debug!(
            "Resolved {} {} {} x{}: {} per player ({} rules)",
            query.course_id,
            query.date,
            query.time.format("%H:%M"),
            query.players,
            resolution.final_price_per_player,
            resolution.applied_rules.len()
        );

        if let Some(generation) = generation {
            self.cache.put(key, resolution.clone(), generation).await;
        }
        Ok(resolution)
    }

    /// Resolve every listed time of one day with a single catalog load.
    ///
    /// A catalog load failure fails the whole batch; per-slot outcomes (a blocking
    /// override, a missing base product) are reported per slot.
    pub async fn resolve_day(
        &self,
        course_id: &str,
        date: NaiveDate,
        times: &[NaiveTime],
        players: u32,
    ) -> PricingResult<Vec<SlotPrice>> {
        let generation = self.cache.generation(course_id).await;
        let catalog = self.catalog.catalog(course_id).await?;
        let mut prices = Vec::with_capacity(times.len());

        for &time in times {
            let _timer = self.metrics.start(OperationType::PriceResolution);
            let query = PriceQuery::new(course_id, date, time, players);
            let key = query.cache_key();

            let price = match self.cache.get(&key).await {
                Some(hit) => {
                    self.metrics.record_cache_hit();
                    Ok(hit)
                }
                None => {
                    self.metrics.record_cache_miss();
                    let resolved = resolve_with_catalog(&catalog, &query);
                    if let (Ok(resolution), Some(generation)) = (&resolved, generation) {
                        self.cache.put(key, resolution.clone(), generation).await;
                    }
                    resolved
                }
            };
            prices.push(SlotPrice { time, price });
        }

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{
        BaseProduct, PriceRule, RuleOperation, Season, SpecialOverride, TimeBand,
    };
    use crate::catalog::InMemoryCatalogRepository;
    use crate::pricing::cache::InMemoryPriceCache;
    use crate::pricing::cache::PriceCacheKey;
    use async_trait::async_trait;
    use chrono::Weekday;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn rule(id: &str, priority: i32, operation: RuleOperation) -> PriceRule {
        PriceRule {
            id: id.to_string(),
            name: id.to_string(),
            active: true,
            priority,
            effective_from: None,
            effective_to: None,
            season_id: None,
            dow: None,
            time_band_id: None,
            lead_time_min_hours: None,
            lead_time_max_hours: None,
            occupancy_min_pct: None,
            occupancy_max_pct: None,
            players_min: None,
            players_max: None,
            operation,
            min_price: None,
            max_price: None,
            round_to: None,
        }
    }

    fn special(id: &str, priority: i32, action: OverrideAction) -> SpecialOverride {
        SpecialOverride {
            id: id.to_string(),
            name: id.to_string(),
            active: true,
            priority,
            start_date: date(2025, 7, 5),
            end_date: date(2025, 7, 5),
            start_time: None,
            end_time: None,
            action,
        }
    }

    fn base_catalog(fee: Decimal) -> CourseCatalog {
        CourseCatalog {
            base_product: Some(BaseProduct {
                green_fee_base_usd: fee,
                currency: "USD".to_string(),
            }),
            ..Default::default()
        }
    }

    // 2025-07-05 is a Saturday
    fn saturday_query(players: u32) -> PriceQuery {
        PriceQuery::new("pebble", date(2025, 7, 5), time(9, 0), players)
    }

    #[test]
    fn test_rules_apply_in_descending_priority() {
        let mut catalog = base_catalog(dec!(100));
        // Listed low priority first to prove ordering is by priority, not catalog order
        catalog.price_rules.push(rule("surge", 70, RuleOperation::Multiplier(dec!(1.1))));
        catalog.price_rules.push(rule("weekend", 80, RuleOperation::Delta(dec!(20))));

        let resolution = resolve_with_catalog(&catalog, &saturday_query(2)).unwrap();
        assert_eq!(resolution.final_price_per_player, dec!(132.0));
        assert_eq!(resolution.total_price, dec!(264.0));
        let ids: Vec<_> = resolution.applied_rules.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["weekend", "surge"]);
    }

    #[test]
    fn test_filters_select_rules() {
        let mut catalog = base_catalog(dec!(100));
        catalog.seasons.push(Season {
            id: "summer".to_string(),
            name: "Summer".to_string(),
            start_date: date(2025, 6, 1),
            end_date: date(2025, 8, 31),
            priority: 1,
            active: true,
        });
        catalog.time_bands.push(TimeBand {
            id: "morning".to_string(),
            label: "Morning".to_string(),
            start_time: time(6, 0),
            end_time: time(12, 0),
            active: true,
        });

        let mut summer = rule("summer", 50, RuleOperation::Delta(dec!(25)));
        summer.season_id = Some("summer".to_string());
        let mut weekday = rule("weekday", 40, RuleOperation::Delta(dec!(-10)));
        weekday.dow = Some(vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]);
        let mut twilight = rule("twilight", 30, RuleOperation::Multiplier(dec!(0.5)));
        twilight.time_band_id = Some("twilight".to_string());
        let mut morning = rule("morning", 20, RuleOperation::Delta(dec!(5)));
        morning.time_band_id = Some("morning".to_string());
        catalog.price_rules = vec![summer, weekday, twilight, morning];

        let resolution = resolve_with_catalog(&catalog, &saturday_query(1)).unwrap();
        assert_eq!(resolution.final_price_per_player, dec!(130));
        assert_eq!(resolution.season_id.as_deref(), Some("summer"));
        assert_eq!(resolution.time_band_id.as_deref(), Some("morning"));
        assert_eq!(resolution.applied_rules.len(), 2);
    }

    #[test]
    fn test_clamp_and_round_each_step() {
        let mut catalog = base_catalog(dec!(100));
        let mut discount = rule("discount", 10, RuleOperation::Multiplier(dec!(0.333)));
        discount.min_price = Some(dec!(40));
        discount.round_to = Some(dec!(5));
        catalog.price_rules.push(discount);

        // 33.3 -> clamp 40 -> round 40
        let resolution = resolve_with_catalog(&catalog, &saturday_query(1)).unwrap();
        assert_eq!(resolution.final_price_per_player, dec!(40));
    }

    #[test]
    fn test_price_override_bypasses_rules() {
        let mut catalog = base_catalog(dec!(100));
        catalog.price_rules.push(rule("surge", 100, RuleOperation::Multiplier(dec!(2))));
        catalog
            .special_overrides
            .push(special("charity", 5, OverrideAction::Price { price: dec!(45) }));

        let resolution = resolve_with_catalog(&catalog, &saturday_query(4)).unwrap();
        assert_eq!(resolution.final_price_per_player, dec!(45));
        assert_eq!(resolution.total_price, dec!(180));
        assert_eq!(resolution.applied_rules.len(), 1);
        assert_eq!(resolution.applied_rules[0].kind, AppliedRuleKind::SpecialOverride);
    }

    #[test]
    fn test_block_override_wins_by_priority() {
        let mut catalog = base_catalog(dec!(100));
        catalog
            .special_overrides
            .push(special("charity", 5, OverrideAction::Price { price: dec!(45) }));
        catalog
            .special_overrides
            .push(special("tournament", 50, OverrideAction::Block));

        let result = resolve_with_catalog(&catalog, &saturday_query(1));
        assert!(matches!(
            result,
            Err(PricingError::NoCapacity { ref override_id }) if override_id == "tournament"
        ));
    }

    #[test]
    fn test_missing_base_product() {
        let catalog = CourseCatalog::default();
        let result = resolve_with_catalog(&catalog, &saturday_query(1));
        assert!(matches!(result, Err(PricingError::BaseProductMissing(_))));
    }

    #[test]
    fn test_zero_players_rejected() {
        let catalog = base_catalog(dec!(100));
        let result = resolve_with_catalog(&catalog, &saturday_query(0));
        assert!(matches!(result, Err(PricingError::InvalidQuery(_))));
    }

    #[test]
    fn test_rule_overflow_is_an_error() {
        let mut catalog = base_catalog(Decimal::MAX);
        catalog.price_rules.push(rule("surge", 10, RuleOperation::Multiplier(dec!(2))));

        let result = resolve_with_catalog(&catalog, &saturday_query(1));
        assert!(matches!(result, Err(PricingError::Overflow(ref what)) if what.contains("surge")));
    }

    #[test]
    fn test_party_total_overflow_is_an_error() {
        let catalog = base_catalog(Decimal::MAX / dec!(2));
        assert!(matches!(
            resolve_with_catalog(&catalog, &saturday_query(4)),
            Err(PricingError::Overflow(_))
        ));

        let mut catalog = base_catalog(dec!(100));
        catalog
            .special_overrides
            .push(special("gala", 5, OverrideAction::Price { price: Decimal::MAX }));
        assert!(matches!(
            resolve_with_catalog(&catalog, &saturday_query(2)),
            Err(PricingError::Overflow(_))
        ));
    }

    #[test]
    fn test_equal_priority_keeps_catalog_order() {
        let mut catalog = base_catalog(dec!(100));
        catalog.price_rules.push(rule("fixed", 10, RuleOperation::Fixed(dec!(80))));
        catalog.price_rules.push(rule("delta", 10, RuleOperation::Delta(dec!(5))));

        let resolution = resolve_with_catalog(&catalog, &saturday_query(1)).unwrap();
        assert_eq!(resolution.final_price_per_player, dec!(85));
    }

    proptest! {
        #[test]
        fn prop_total_is_price_times_players(fee in 0u32..500, players in 1u32..=4) {
            let catalog = base_catalog(Decimal::from(fee));
            let resolution = resolve_with_catalog(&catalog, &saturday_query(players)).unwrap();
            prop_assert_eq!(
                resolution.total_price,
                resolution.final_price_per_player * Decimal::from(players)
            );
        }

        #[test]
        fn prop_clamped_rules_stay_in_bounds(fee in 0u32..1000, factor in 0u32..300) {
            let mut catalog = base_catalog(Decimal::from(fee));
            let mut r = rule("bounded", 1, RuleOperation::Multiplier(Decimal::new(factor as i64, 2)));
            r.min_price = Some(dec!(30));
            r.max_price = Some(dec!(250));
            catalog.price_rules.push(r);

            let resolution = resolve_with_catalog(&catalog, &saturday_query(1)).unwrap();
            prop_assert!(resolution.final_price_per_player >= dec!(30));
            prop_assert!(resolution.final_price_per_player <= dec!(250));
        }
    }

    async fn engine_with(catalog: CourseCatalog) -> (PricingEngine, Arc<RuleCatalogStore>, PerformanceMetrics) {
        let cache = Arc::new(InMemoryPriceCache::new(Duration::from_secs(600)));
        let store = Arc::new(RuleCatalogStore::new(
            Arc::new(InMemoryCatalogRepository::new()),
            cache.clone(),
        ));
        store.replace_catalog("pebble", catalog).await.unwrap();
        let metrics = PerformanceMetrics::new();
        (
            PricingEngine::new(store.clone(), cache, metrics.clone()),
            store,
            metrics,
        )
    }

    #[tokio::test]
    async fn test_resolve_uses_cache_until_catalog_changes() {
        let (engine, store, metrics) = engine_with(base_catalog(dec!(100))).await;
        let query = saturday_query(2);

        let first = engine.resolve(&query).await.unwrap();
        let second = engine.resolve(&query).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(metrics.summary().cache_hits, 1);
        assert_eq!(metrics.summary().cache_misses, 1);

        store
            .upsert_price_rule("pebble", rule("weekend", 10, RuleOperation::Delta(dec!(20))))
            .await
            .unwrap();

        let third = engine.resolve(&query).await.unwrap();
        assert_eq!(third.final_price_per_player, dec!(120));
        assert_eq!(metrics.summary().cache_misses, 2);
    }

    #[tokio::test]
    async fn test_blocked_results_are_not_cached() {
        let mut catalog = base_catalog(dec!(100));
        catalog
            .special_overrides
            .push(special("closed", 1, OverrideAction::Block));
        let (engine, store, _) = engine_with(catalog).await;

        assert!(engine.resolve(&saturday_query(1)).await.is_err());
        store.delete_special_override("pebble", "closed").await.unwrap();
        assert_eq!(
            engine.resolve(&saturday_query(1)).await.unwrap().final_price_per_player,
            dec!(100)
        );
    }

    #[tokio::test]
    async fn test_resolve_day_reports_per_slot() {
        let mut catalog = base_catalog(dec!(100));
        let mut shotgun = special("shotgun", 1, OverrideAction::Block);
        shotgun.start_time = Some(time(8, 0));
        shotgun.end_time = Some(time(8, 0));
        catalog.special_overrides.push(shotgun);
        let (engine, _, _) = engine_with(catalog).await;

        let prices = engine
            .resolve_day("pebble", date(2025, 7, 5), &[time(8, 0), time(8, 10)], 2)
            .await
            .unwrap();

        assert_eq!(prices.len(), 2);
        assert!(matches!(prices[0].price, Err(PricingError::NoCapacity { .. })));
        assert_eq!(prices[1].price.as_ref().unwrap().total_price, dec!(200));
    }

    /// Holds the first `put` until released, so a catalog change can land while a
    /// resolution is in flight
    struct HeldPriceCache {
        inner: InMemoryPriceCache,
        hold: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PriceCache for HeldPriceCache {
        async fn get(&self, key: &PriceCacheKey) -> Option<PriceResolution> {
            self.inner.get(key).await
        }

        async fn generation(&self, course_id: &str) -> Option<u64> {
            self.inner.generation(course_id).await
        }

        async fn put(&self, key: PriceCacheKey, resolution: PriceResolution, generation: u64) {
            if self.hold.swap(false, Ordering::SeqCst) {
                self.reached.notify_one();
                self.release.notified().await;
            }
            self.inner.put(key, resolution, generation).await
        }

        async fn invalidate_course(&self, course_id: &str) {
            self.inner.invalidate_course(course_id).await
        }
    }

    #[tokio::test]
    async fn test_catalog_change_during_resolution_is_not_cached_stale() {
        let cache = Arc::new(HeldPriceCache {
            inner: InMemoryPriceCache::default(),
            hold: AtomicBool::new(false),
            reached: Notify::new(),
            release: Notify::new(),
        });
        let store = Arc::new(RuleCatalogStore::new(
            Arc::new(InMemoryCatalogRepository::new()),
            cache.clone(),
        ));
        store.replace_catalog("pebble", base_catalog(dec!(100))).await.unwrap();
        let engine = Arc::new(PricingEngine::new(
            store.clone(),
            cache.clone(),
            PerformanceMetrics::new(),
        ));

        cache.hold.store(true, Ordering::SeqCst);
        let in_flight = tokio::spawn({
            let engine = engine.clone();
            async move { engine.resolve(&saturday_query(1)).await }
        });
        cache.reached.notified().await;

        store
            .upsert_price_rule("pebble", rule("weekend", 10, RuleOperation::Delta(dec!(50))))
            .await
            .unwrap();
        cache.release.notify_one();

        let stale = in_flight.await.unwrap().unwrap();
        assert_eq!(stale.final_price_per_player, dec!(100));
        assert_eq!(cache.inner.len_for_course("pebble").await, 0);

        let fresh = engine.resolve(&saturday_query(1)).await.unwrap();
        assert_eq!(fresh.final_price_per_player, dec!(150));
        assert_eq!(cache.inner.len_for_course("pebble").await, 1);
    }
}
