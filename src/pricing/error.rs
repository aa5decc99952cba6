// Error types for the Pricing Rule Engine

use crate::catalog::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PricingError {
    /// The course catalog could not be loaded
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// No matching price override and no base green fee to start from
    #[error("Course {0} has no base product configured")]
    BaseProductMissing(String),

    /// A `block` special override covers the requested slot
    #[error("Tee time is closed by special override '{override_id}'")]
    NoCapacity { override_id: String },

    #[error("Invalid price query: {0}")]
    InvalidQuery(String),

    /// Arithmetic overflowed while applying the catalog
    #[error("Price overflow while applying {0}")]
    Overflow(String),
}

pub type PricingResult<T> = Result<T, PricingError>;
