// Rule Catalog Store
//
// Holds a per-course snapshot of the pricing catalog in memory, refreshed from the
// repository once it is older than the configured TTL. Every admin mutation persists the
// whole course document, installs the new snapshot and invalidates the course's price cache.

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::models::{
    remove_entry, upsert_entry, BaseProduct, CatalogEntry, CourseCatalog, PriceRule, Season,
    SpecialOverride, TimeBand,
};
use crate::catalog::repository::CatalogRepository;
use crate::pricing::cache::PriceCache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Default freshness window for catalog snapshots (60 seconds)
const CATALOG_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CatalogSnapshot {
    catalog: Arc<CourseCatalog>,
    loaded_at: Instant,
}

impl CatalogSnapshot {
    fn new(catalog: CourseCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            loaded_at: Instant::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() > ttl
    }
}

pub struct RuleCatalogStore {
    repository: Arc<dyn CatalogRepository>,
    price_cache: Arc<dyn PriceCache>,
    snapshots: RwLock<HashMap<String, CatalogSnapshot>>,
    /// Serialises admin mutations so concurrent edits never overwrite each other
    write_lock: Mutex<()>,
    ttl: Duration,
}

impl RuleCatalogStore {
    pub fn new(repository: Arc<dyn CatalogRepository>, price_cache: Arc<dyn PriceCache>) -> Self {
        Self::with_ttl(repository, price_cache, CATALOG_TTL)
    }

    pub fn with_ttl(
        repository: Arc<dyn CatalogRepository>,
        price_cache: Arc<dyn PriceCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            repository,
            price_cache,
            snapshots: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            ttl,
        }
    }

    /// Current catalog of a course, reloaded from the repository when stale
    pub async fn catalog(&self, course_id: &str) -> CatalogResult<Arc<CourseCatalog>> {
        // Fast path under the read lock
        {
            let snapshots = self.snapshots.read().await;
            if let Some(snapshot) = snapshots.get(course_id) {
                if !snapshot.is_stale(self.ttl) {
                    return Ok(Arc::clone(&snapshot.catalog));
                }
            }
        }

        let mut snapshots = self.snapshots.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(snapshot) = snapshots.get(course_id) {
            if !snapshot.is_stale(self.ttl) {
                return Ok(Arc::clone(&snapshot.catalog));
            }
        }

        let catalog = self.repository.load(course_id).await?;
        tracing::debug!(
            "Loaded catalog for course {}: {} seasons, {} time bands, {} rules, {} overrides",
            course_id,
            catalog.seasons.len(),
            catalog.time_bands.len(),
            catalog.price_rules.len(),
            catalog.special_overrides.len()
        );

        let snapshot = CatalogSnapshot::new(catalog);
        let catalog = Arc::clone(&snapshot.catalog);
        snapshots.insert(course_id.to_string(), snapshot);
        Ok(catalog)
    }

    /// Drop the snapshot so the next read goes to the repository
    pub async fn reload(&self, course_id: &str) {
        self.snapshots.write().await.remove(course_id);
    }

    /// Replace the whole course catalog. Collections missing from `catalog` are emptied.
    pub async fn replace_catalog(&self, course_id: &str, catalog: CourseCatalog) -> CatalogResult<()> {
        self.mutate(course_id, "catalog replaced", |current| {
            *current = catalog;
            Ok(())
        })
        .await
    }

    pub async fn upsert_season(&self, course_id: &str, season: Season) -> CatalogResult<()> {
        self.mutate(course_id, "season upserted", |catalog| {
            upsert_entry(&mut catalog.seasons, season);
            Ok(())
        })
        .await
    }

    pub async fn delete_season(&self, course_id: &str, season_id: &str) -> CatalogResult<()> {
        self.mutate(course_id, "season deleted", |catalog| {
            remove_or_not_found(&mut catalog.seasons, course_id, season_id)
        })
        .await
    }

    pub async fn upsert_time_band(&self, course_id: &str, band: TimeBand) -> CatalogResult<()> {
        self.mutate(course_id, "time band upserted", |catalog| {
            upsert_entry(&mut catalog.time_bands, band);
            Ok(())
        })
        .await
    }

    pub async fn delete_time_band(&self, course_id: &str, band_id: &str) -> CatalogResult<()> {
        self.mutate(course_id, "time band deleted", |catalog| {
            remove_or_not_found(&mut catalog.time_bands, course_id, band_id)
        })
        .await
    }

    pub async fn upsert_price_rule(&self, course_id: &str, rule: PriceRule) -> CatalogResult<()> {
        if rule.has_dynamic_filters() {
            tracing::debug!(
                "Price rule {} carries lead-time/occupancy/party-size filters; they are stored but not evaluated",
                rule.id
            );
        }
        self.mutate(course_id, "price rule upserted", |catalog| {
            upsert_entry(&mut catalog.price_rules, rule);
            Ok(())
        })
        .await
    }

    pub async fn delete_price_rule(&self, course_id: &str, rule_id: &str) -> CatalogResult<()> {
        self.mutate(course_id, "price rule deleted", |catalog| {
            remove_or_not_found(&mut catalog.price_rules, course_id, rule_id)
        })
        .await
    }

    pub async fn upsert_special_override(
        &self,
        course_id: &str,
        special: SpecialOverride,
    ) -> CatalogResult<()> {
        self.mutate(course_id, "special override upserted", |catalog| {
            upsert_entry(&mut catalog.special_overrides, special);
            Ok(())
        })
        .await
    }

    pub async fn delete_special_override(&self, course_id: &str, override_id: &str) -> CatalogResult<()> {
        self.mutate(course_id, "special override deleted", |catalog| {
            remove_or_not_found(&mut catalog.special_overrides, course_id, override_id)
        })
        .await
    }

    pub async fn set_base_product(&self, course_id: &str, base: Option<BaseProduct>) -> CatalogResult<()> {
        self.mutate(course_id, "base product set", |catalog| {
            catalog.base_product = base;
            Ok(())
        })
        .await
    }

    /// Load, change, validate, persist, install, invalidate.
    ///
    /// The repository copy is authoritative for writes, so a stale snapshot never
    /// resurrects entries removed by another instance.
    async fn mutate<F>(&self, course_id: &str, action: &str, change: F) -> CatalogResult<()>
    where
        F: FnOnce(&mut CourseCatalog) -> CatalogResult<()>,
    {
        let _guard = self.write_lock.lock().await;

        let mut catalog = self.repository.load(course_id).await?;
        change(&mut catalog)?;
        catalog.validate()?;
        self.repository.save(course_id, &catalog).await?;

        self.snapshots
            .write()
            .await
            .insert(course_id.to_string(), CatalogSnapshot::new(catalog));
        self.price_cache.invalidate_course(course_id).await;

        tracing::info!("Catalog of course {}: {}", course_id, action);
        Ok(())
    }
}

fn remove_or_not_found<T: CatalogEntry>(
    entries: &mut Vec<T>,
    course_id: &str,
    id: &str,
) -> CatalogResult<()> {
    if remove_entry(entries, id) {
        Ok(())
    } else {
        Err(CatalogError::EntryNotFound {
            course_id: course_id.to_string(),
            kind: T::KIND,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{OverrideAction, RuleOperation};
    use crate::catalog::repository::InMemoryCatalogRepository;
    use crate::pricing::cache::InMemoryPriceCache;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn store_with_ttl(ttl: Duration) -> (RuleCatalogStore, Arc<InMemoryCatalogRepository>) {
        let repository = Arc::new(InMemoryCatalogRepository::new());
        let cache = Arc::new(InMemoryPriceCache::new(Duration::from_secs(600)));
        (
            RuleCatalogStore::with_ttl(repository.clone(), cache, ttl),
            repository,
        )
    }

    fn season(id: &str, start: u32, end: u32) -> Season {
        Season {
            id: id.to_string(),
            name: id.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, start, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, end, 28).unwrap(),
            priority: 0,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_delete_season() {
        let (store, repository) = store_with_ttl(CATALOG_TTL);

        store.upsert_season("pebble", season("summer", 6, 8)).await.unwrap();
        store.upsert_season("pebble", season("winter", 1, 2)).await.unwrap();
        assert_eq!(store.catalog("pebble").await.unwrap().seasons.len(), 2);
        assert_eq!(repository.load("pebble").await.unwrap().seasons.len(), 2);

        store.delete_season("pebble", "summer").await.unwrap();
        let catalog = store.catalog("pebble").await.unwrap();
        assert_eq!(catalog.seasons.len(), 1);
        assert_eq!(catalog.seasons[0].id, "winter");
    }

    #[tokio::test]
    async fn test_delete_unknown_entry() {
        let (store, _) = store_with_ttl(CATALOG_TTL);
        let result = store.delete_price_rule("pebble", "ghost").await;
        assert!(matches!(
            result,
            Err(CatalogError::EntryNotFound { kind: "price rule", .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_mutation_is_not_persisted() {
        let (store, repository) = store_with_ttl(CATALOG_TTL);
        let result = store.upsert_season("pebble", season("backwards", 8, 6)).await;

        assert!(matches!(result, Err(CatalogError::InvalidEntry(_))));
        assert!(repository.load("pebble").await.unwrap().seasons.is_empty());
        assert!(store.catalog("pebble").await.unwrap().seasons.is_empty());
    }

    #[tokio::test]
    async fn test_replace_catalog_empties_missing_collections() {
        let (store, _) = store_with_ttl(CATALOG_TTL);
        store.upsert_season("pebble", season("summer", 6, 8)).await.unwrap();
        store
            .upsert_special_override(
                "pebble",
                SpecialOverride {
                    id: "closed".to_string(),
                    name: "Closed".to_string(),
                    active: true,
                    priority: 0,
                    start_date: NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
                    start_time: None,
                    end_time: None,
                    action: OverrideAction::Block,
                },
            )
            .await
            .unwrap();

        let replacement: CourseCatalog = serde_json::from_str(
            r#"{"priceRules": [{"id": "r", "name": "r", "operation": {"type": "delta", "value": "5"}}]}"#,
        )
        .unwrap();
        store.replace_catalog("pebble", replacement).await.unwrap();

        let catalog = store.catalog("pebble").await.unwrap();
        assert!(catalog.seasons.is_empty());
        assert!(catalog.special_overrides.is_empty());
        assert_eq!(catalog.price_rules[0].operation, RuleOperation::Delta(dec!(5)));
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_reloaded() {
        let (store, repository) = store_with_ttl(Duration::from_secs(0));
        assert!(store.catalog("pebble").await.unwrap().base_product.is_none());

        // Written behind the store's back, as another instance would
        let catalog = CourseCatalog {
            base_product: Some(BaseProduct {
                green_fee_base_usd: dec!(95),
                currency: "USD".to_string(),
            }),
            ..Default::default()
        };
        repository.save("pebble", &catalog).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let reloaded = store.catalog("pebble").await.unwrap();
        assert_eq!(reloaded.base_product.as_ref().unwrap().green_fee_base_usd, dec!(95));
    }

    #[tokio::test]
    async fn test_fresh_snapshot_is_served_until_reload() {
        let (store, repository) = store_with_ttl(CATALOG_TTL);
        store.catalog("pebble").await.unwrap();

        repository
            .save(
                "pebble",
                &CourseCatalog {
                    seasons: vec![season("summer", 6, 8)],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.catalog("pebble").await.unwrap().seasons.is_empty());

        store.reload("pebble").await;
        assert_eq!(store.catalog("pebble").await.unwrap().seasons.len(), 1);
    }
}
