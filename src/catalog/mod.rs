// Rule Catalog Store
//
// Per-course seasons, time bands, price rules, special overrides and base product.

pub mod error;
pub mod models;
pub mod repository;
pub mod store;

pub use error::{CatalogError, CatalogResult};
pub use models::{
    BaseProduct, CourseCatalog, OverrideAction, PriceRule, RuleOperation, Season, SpecialOverride,
    TimeBand,
};
pub use repository::{CatalogRepository, InMemoryCatalogRepository, PgCatalogRepository};
pub use store::RuleCatalogStore;
