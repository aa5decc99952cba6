// Price cache
//
// Short-lived memo of resolved prices keyed by (course, date, time, players, lead time).
// Purely derived data: a backend failure degrades to a miss and is only logged.
// Invalidation is per course and coarse: every catalog mutation drops all of a
// course's entries and advances the course's generation. Writers read the
// generation before loading the catalog and a put made under an older generation
// is discarded, so a resolution computed from a replaced catalog never lands.

use crate::pricing::engine::PriceResolution;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::timeout;

/// Default lifetime of a cached price (10 minutes)
pub const PRICE_CACHE_TTL: Duration = Duration::from_secs(600);

/// Upper bound on a single Redis round trip before it is treated as a miss
const REDIS_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceCacheKey {
    pub course_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub players: u32,
    pub lead_time_hours: Option<i64>,
}

impl PriceCacheKey {
    /// Key fragment below the course namespace
    fn suffix(&self) -> String {
        let lead = self
            .lead_time_hours
            .map(|hours| hours.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{}:{}:{}:{}",
            self.date.format("%Y-%m-%d"),
            self.time.format("%H%M"),
            self.players,
            lead
        )
    }
}

#[async_trait]
pub trait PriceCache: Send + Sync {
    async fn get(&self, key: &PriceCacheKey) -> Option<PriceResolution>;

    /// Current generation of a course, `None` when it cannot be read
    async fn generation(&self, course_id: &str) -> Option<u64>;

    /// Store a resolution computed while the course was at `generation`
    async fn put(&self, key: PriceCacheKey, resolution: PriceResolution, generation: u64);

    /// Drop every cached price of a course
    async fn invalidate_course(&self, course_id: &str);
}

type CourseEntries = HashMap<PriceCacheKey, (PriceResolution, Instant)>;

#[derive(Default)]
struct CacheState {
    courses: HashMap<String, CourseEntries>,
    generations: HashMap<String, u64>,
}

/// In-process TTL map, grouped by course so invalidation is a single removal
pub struct InMemoryPriceCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl InMemoryPriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
        }
    }

    /// Number of live entries for a course
    pub async fn len_for_course(&self, course_id: &str) -> usize {
        let state = self.state.read().await;
        state
            .courses
            .get(course_id)
            .map(|course| course.values().filter(|(_, expiry)| *expiry > Instant::now()).count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryPriceCache {
    fn default() -> Self {
        Self::new(PRICE_CACHE_TTL)
    }
}

#[async_trait]
impl PriceCache for InMemoryPriceCache {
    async fn get(&self, key: &PriceCacheKey) -> Option<PriceResolution> {
        let state = self.state.read().await;
        let (resolution, expiry) = state.courses.get(&key.course_id)?.get(key)?;
        if *expiry > Instant::now() {
            Some(resolution.clone())
        } else {
            None
        }
    }

    async fn generation(&self, course_id: &str) -> Option<u64> {
        let state = self.state.read().await;
        Some(state.generations.get(course_id).copied().unwrap_or(0))
    }

    async fn put(&self, key: PriceCacheKey, resolution: PriceResolution, generation: u64) {
        let expiry = Instant::now() + self.ttl;
        let mut state = self.state.write().await;
        let current = state.generations.get(&key.course_id).copied().unwrap_or(0);
        if current != generation {
            tracing::debug!(
                "Dropping price for course {} computed at generation {} (now {})",
                key.course_id,
                generation,
                current
            );
            return;
        }
        let course = state.courses.entry(key.course_id.clone()).or_default();
        // Expired entries are only swept when the course is written to
        course.retain(|_, (_, entry_expiry)| *entry_expiry > Instant::now());
        course.insert(key, (resolution, expiry));
    }

    async fn invalidate_course(&self, course_id: &str) {
        let mut state = self.state.write().await;
        *state.generations.entry(course_id.to_string()).or_insert(0) += 1;
        let removed = state.courses.remove(course_id);
        if let Some(removed) = removed {
            tracing::debug!("Invalidated {} cached prices for course {}", removed.len(), course_id);
        }
    }
}

/// Redis-backed cache shared across instances.
///
/// Keys live under a per-course generation (`price:{course}:{generation}:...`);
/// invalidation bumps `price_gen:{course}`, which orphans the old generation's keys
/// until their TTL removes them.
pub struct RedisPriceCache {
    connection: ConnectionManager,
    ttl: Duration,
}

impl RedisPriceCache {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis price cache");
        Ok(Self { connection, ttl })
    }

    fn generation_key(course_id: &str) -> String {
        format!("price_gen:{}", course_id)
    }

    async fn read_generation(&self, course_id: &str) -> Result<u64, String> {
        let mut connection = self.connection.clone();
        let generation: Option<u64> = timeout(
            REDIS_TIMEOUT,
            redis::cmd("GET")
                .arg(Self::generation_key(course_id))
                .query_async(&mut connection),
        )
        .await
        .map_err(|_| "redis timeout".to_string())?
        .map_err(|e: redis::RedisError| e.to_string())?;
        Ok(generation.unwrap_or(0))
    }

    fn entry_key(key: &PriceCacheKey, generation: u64) -> String {
        format!("price:{}:{}:{}", key.course_id, generation, key.suffix())
    }
}

#[async_trait]
impl PriceCache for RedisPriceCache {
    async fn get(&self, key: &PriceCacheKey) -> Option<PriceResolution> {
        let result: Result<Option<String>, String> = async {
            let generation = self.read_generation(&key.course_id).await?;
            let entry_key = Self::entry_key(key, generation);
            let mut connection = self.connection.clone();
            timeout(
                REDIS_TIMEOUT,
                redis::cmd("GET").arg(entry_key).query_async(&mut connection),
            )
            .await
            .map_err(|_| "redis timeout".to_string())?
            .map_err(|e: redis::RedisError| e.to_string())
        }
        .await;

        match result {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(resolution) => Some(resolution),
                Err(e) => {
                    tracing::warn!("Discarding undecodable cached price: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Price cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    async fn generation(&self, course_id: &str) -> Option<u64> {
        match self.read_generation(course_id).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!("Price cache generation read failed, skipping write: {}", e);
                None
            }
        }
    }

    /// Writes under the given generation's namespace; a stale generation lands
    /// in keys no reader looks at.
    async fn put(&self, key: PriceCacheKey, resolution: PriceResolution, generation: u64) {
        let payload = match serde_json::to_string(&resolution) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Could not encode price for cache: {}", e);
                return;
            }
        };

        let result: Result<(), String> = async {
            let mut connection = self.connection.clone();
            timeout(
                REDIS_TIMEOUT,
                redis::cmd("SET")
                    .arg(Self::entry_key(&key, generation))
                    .arg(payload)
                    .arg("EX")
                    .arg(self.ttl.as_secs().max(1))
                    .query_async::<_, ()>(&mut connection),
            )
            .await
            .map_err(|_| "redis timeout".to_string())?
            .map_err(|e| e.to_string())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("Price cache write failed: {}", e);
        }
    }

    async fn invalidate_course(&self, course_id: &str) {
        let mut connection = self.connection.clone();
        let result = timeout(
            REDIS_TIMEOUT,
            redis::cmd("INCR")
                .arg(Self::generation_key(course_id))
                .query_async::<_, u64>(&mut connection),
        )
        .await;

        match result {
            Ok(Ok(generation)) => {
                tracing::debug!("Price cache for course {} moved to generation {}", course_id, generation)
            }
            Ok(Err(e)) => tracing::error!("Failed to invalidate price cache for course {}: {}", course_id, e),
            Err(_) => tracing::error!("Timed out invalidating price cache for course {}", course_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::engine::PriceResolution;
    use rust_decimal_macros::dec;

    fn key(course: &str, hour: u32) -> PriceCacheKey {
        PriceCacheKey {
            course_id: course.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 7, 5).unwrap(),
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            players: 2,
            lead_time_hours: None,
        }
    }

    fn resolution() -> PriceResolution {
        PriceResolution {
            final_price_per_player: dec!(120),
            total_price: dec!(240),
            applied_rules: vec![],
            currency: "USD".to_string(),
            season_id: None,
            time_band_id: None,
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = InMemoryPriceCache::default();
        assert!(cache.get(&key("pebble", 8)).await.is_none());

        cache.put(key("pebble", 8), resolution(), 0).await;
        assert_eq!(cache.get(&key("pebble", 8)).await, Some(resolution()));
        assert!(cache.get(&key("pebble", 9)).await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = InMemoryPriceCache::new(Duration::from_millis(10));
        cache.put(key("pebble", 8), resolution(), 0).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get(&key("pebble", 8)).await.is_none());
        assert_eq!(cache.len_for_course("pebble").await, 0);
    }

    #[tokio::test]
    async fn test_invalidation_is_per_course() {
        let cache = InMemoryPriceCache::default();
        cache.put(key("pebble", 8), resolution(), 0).await;
        cache.put(key("pebble", 9), resolution(), 0).await;
        cache.put(key("spyglass", 8), resolution(), 0).await;

        cache.invalidate_course("pebble").await;

        assert_eq!(cache.len_for_course("pebble").await, 0);
        assert!(cache.get(&key("spyglass", 8)).await.is_some());
    }

    #[tokio::test]
    async fn test_put_from_older_generation_is_dropped() {
        let cache = InMemoryPriceCache::default();
        let before = cache.generation("pebble").await.unwrap();

        cache.invalidate_course("pebble").await;
        cache.put(key("pebble", 8), resolution(), before).await;
        assert!(cache.get(&key("pebble", 8)).await.is_none());

        let current = cache.generation("pebble").await.unwrap();
        assert_eq!(current, before + 1);
        cache.put(key("pebble", 8), resolution(), current).await;
        assert_eq!(cache.get(&key("pebble", 8)).await, Some(resolution()));
        // Other courses keep their own generation
        assert_eq!(cache.generation("spyglass").await, Some(0));
    }

    #[test]
    fn test_redis_entry_key_is_namespaced_by_generation() {
        assert_eq!(
            RedisPriceCache::entry_key(&key("pebble", 8), 3),
            "price:pebble:3:2025-07-05:0800:2:-"
        );
    }

    #[test]
    fn test_key_suffix_includes_lead_time() {
        let mut k = key("pebble", 8);
        assert_eq!(k.suffix(), "2025-07-05:0800:2:-");
        k.lead_time_hours = Some(36);
        assert_eq!(k.suffix(), "2025-07-05:0800:2:36");
    }
}
