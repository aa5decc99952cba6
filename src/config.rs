// Application configuration
// Reads environment variables (after dotenv) into per-module policies

use chrono::NaiveTime;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEV_QUOTE_SECRET: &str = "dev-quote-secret-change-me";

/// Configuration errors surfaced at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Same-day booking window rules for the tee-time inventory
#[derive(Debug, Clone)]
pub struct InventoryPolicy {
    /// Slots starting sooner than this (today only) are hidden from listings
    pub min_lead_minutes: i64,
    /// After this local time every slot of the current day reports `blocked`
    pub daily_cutoff: NaiveTime,
}

impl Default for InventoryPolicy {
    fn default() -> Self {
        Self {
            min_lead_minutes: 30,
            daily_cutoff: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Cache lifetimes for the pricing core
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    pub price_cache_ttl: Duration,
    pub catalog_ttl: Duration,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            price_cache_ttl: Duration::from_secs(600),
            catalog_ttl: Duration::from_secs(60),
        }
    }
}

/// Tax, lifetime and signing secret for quotes
#[derive(Debug, Clone)]
pub struct QuotePolicy {
    pub tax_rate: Decimal,
    pub ttl: chrono::Duration,
    pub secret: String,
}

impl Default for QuotePolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            ttl: chrono::Duration::minutes(15),
            secret: DEV_QUOTE_SECRET.to_string(),
        }
    }
}

/// Coupon rules that are not stored on the coupon itself
#[derive(Debug, Clone)]
pub struct CouponPolicy {
    /// Promotional code restricted to a customer's first booking
    pub first_booking_code: String,
}

impl Default for CouponPolicy {
    fn default() -> Self {
        Self {
            first_booking_code: "FIRSTTEE".to_string(),
        }
    }
}

/// Loyalty award granted inside the reservation transaction
#[derive(Debug, Clone)]
pub struct LoyaltyPolicy {
    pub booking_bonus_points: i64,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        Self {
            booking_bonus_points: 100,
        }
    }
}

/// Write-conflict retry budget for reservations
#[derive(Debug, Clone)]
pub struct ReservationPolicy {
    pub max_attempts: u32,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Full application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub inventory: InventoryPolicy,
    pub pricing: PricingPolicy,
    pub quotes: QuotePolicy,
    pub coupons: CouponPolicy,
    pub loyalty: LoyaltyPolicy,
    pub reservations: ReservationPolicy,
}

impl AppConfig {
    /// Build configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080u16)?;

        let daily_cutoff = match lookup("DAILY_CUTOFF") {
            Some(raw) => crate::timefmt::parse_time(&raw).map_err(|_| ConfigError::Invalid {
                name: "DAILY_CUTOFF",
                value: raw,
            })?,
            None => InventoryPolicy::default().daily_cutoff,
        };

        let secret = match lookup("QUOTE_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("QUOTE_SECRET not set, using development secret");
                DEV_QUOTE_SECRET.to_string()
            }
        };

        let first_booking_code = lookup("FIRST_BOOKING_COUPON")
            .map(|code| crate::validation::normalize_coupon_code(&code))
            .unwrap_or_else(|| CouponPolicy::default().first_booking_code);

        let max_attempts: u32 = parse_or(&lookup, "RESERVE_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "RESERVE_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            redis_url,
            host,
            port,
            inventory: InventoryPolicy {
                min_lead_minutes: parse_or(&lookup, "MIN_LEAD_MINUTES", 30i64)?,
                daily_cutoff,
            },
            pricing: PricingPolicy {
                price_cache_ttl: Duration::from_secs(parse_or(&lookup, "PRICE_CACHE_TTL_SECS", 600u64)?),
                catalog_ttl: Duration::from_secs(parse_or(&lookup, "CATALOG_TTL_SECS", 60u64)?),
            },
            quotes: QuotePolicy {
                tax_rate: parse_or(&lookup, "TAX_RATE", Decimal::new(8, 2))?,
                ttl: chrono::Duration::seconds(parse_or(&lookup, "QUOTE_TTL_SECS", 900i64)?),
                secret,
            },
            coupons: CouponPolicy { first_booking_code },
            loyalty: LoyaltyPolicy {
                booking_bonus_points: parse_or(&lookup, "LOYALTY_BOOKING_BONUS", 100i64)?,
            },
            reservations: ReservationPolicy { max_attempts },
        })
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}
