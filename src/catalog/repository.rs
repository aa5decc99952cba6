// Catalog persistence
//
// A course catalog is loaded and saved as a single document. PostgreSQL keeps it in a
// JSONB column; the in-memory repository backs tests and database-less runs.

use crate::catalog::error::CatalogResult;
use crate::catalog::models::CourseCatalog;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Load/save contract for per-course catalog documents
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Load a course's catalog; a course without a stored document has an empty catalog
    async fn load(&self, course_id: &str) -> CatalogResult<CourseCatalog>;

    /// Persist the whole catalog, replacing what was stored before
    async fn save(&self, course_id: &str, catalog: &CourseCatalog) -> CatalogResult<()>;
}

/// Catalog documents in the `course_catalogs` table
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn load(&self, course_id: &str) -> CatalogResult<CourseCatalog> {
        let row: Option<(Json<CourseCatalog>,)> =
            sqlx::query_as("SELECT document FROM course_catalogs WHERE course_id = $1")
                .bind(course_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((Json(catalog),)) => Ok(catalog),
            None => {
                tracing::debug!("No catalog stored for course {}, using empty catalog", course_id);
                Ok(CourseCatalog::default())
            }
        }
    }

    async fn save(&self, course_id: &str, catalog: &CourseCatalog) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO course_catalogs (course_id, document, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (course_id)
            DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()
            "#,
        )
        .bind(course_id)
        .bind(Json(catalog))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Catalog documents held in process memory
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    documents: RwLock<HashMap<String, CourseCatalog>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn load(&self, course_id: &str) -> CatalogResult<CourseCatalog> {
        let documents = self.documents.read().await;
        Ok(documents.get(course_id).cloned().unwrap_or_default())
    }

    async fn save(&self, course_id: &str, catalog: &CourseCatalog) -> CatalogResult<()> {
        let mut documents = self.documents.write().await;
        documents.insert(course_id.to_string(), catalog.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::BaseProduct;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_missing_course_loads_empty_catalog() {
        let repository = InMemoryCatalogRepository::new();
        let catalog = repository.load("nowhere").await.unwrap();
        assert_eq!(catalog, CourseCatalog::default());
    }

    #[tokio::test]
    async fn test_save_replaces_document() {
        let repository = InMemoryCatalogRepository::new();
        let mut catalog = CourseCatalog {
            base_product: Some(BaseProduct {
                green_fee_base_usd: dec!(100),
                currency: "USD".to_string(),
            }),
            ..Default::default()
        };
        repository.save("pebble", &catalog).await.unwrap();

        catalog.base_product = None;
        repository.save("pebble", &catalog).await.unwrap();

        let loaded = repository.load("pebble").await.unwrap();
        assert!(loaded.base_product.is_none());
    }
}
