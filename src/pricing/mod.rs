// Pricing Rule Engine and its result cache

pub mod cache;
pub mod engine;
pub mod error;

pub use cache::{InMemoryPriceCache, PriceCache, PriceCacheKey, RedisPriceCache};
pub use engine::{AppliedRule, AppliedRuleKind, PriceQuery, PriceResolution, PricingEngine, SlotPrice};
pub use error::{PricingError, PricingResult};
