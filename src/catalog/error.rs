// Error types for the Rule Catalog Store

use thiserror::Error;

/// Errors raised while loading, validating or mutating a course's pricing catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A season, time band, rule, override or base product failed validation
    #[error("Invalid catalog entry: {0}")]
    InvalidEntry(String),

    /// Delete or lookup of an entry id that the course catalog does not hold
    #[error("{kind} '{id}' not found in catalog of course {course_id}")]
    EntryNotFound {
        course_id: String,
        kind: &'static str,
        id: String,
    },

    /// Database operation errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Catalog document could not be (de)serialized
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CatalogError::InvalidEntry("season 'summer' ends before it starts".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid catalog entry: season 'summer' ends before it starts"
        );

        let error = CatalogError::EntryNotFound {
            course_id: "pebble".to_string(),
            kind: "price rule",
            id: "weekend".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "price rule 'weekend' not found in catalog of course pebble"
        );
    }

    #[test]
    fn test_error_from_sqlx() {
        let error: CatalogError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, CatalogError::DatabaseError(_)));
    }
}
