//! Service error taxonomy
//!
//! Every service operation returns `ServiceResult`. The API layer maps each
//! variant to a status code and a stable error code.

use crate::models::ListQueryError;

/// Result alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Required request fields were absent or empty
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingField(Vec<&'static str>),

    /// A field was present but its value is unacceptable
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced category, theme or content block does not exist
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// None of the submitted categories is permitted by the theme
    #[error("None of the submitted categories is allowed by theme {0}")]
    CategoryNotAllowed(i64),

    #[error("{0} not found")]
    NotFound(String),

    /// Role or ownership check failed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Deletion blocked by dependent rows
    #[error("Cannot delete {entity} {id}: still referenced by {count} {dependent}")]
    StillReferenced {
        entity: &'static str,
        id: i64,
        dependent: &'static str,
        count: i64,
    },

    /// Unique name already taken
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// Bad credentials or an invalid session
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Store or other internal failure
    #[error("Internal error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<ListQueryError> for ServiceError {
    fn from(err: ListQueryError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// True when a store error was raised by a unique constraint
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .any(|e| matches!(e, sqlx::Error::Database(db) if db.is_unique_violation()))
}

/// Report a unique-constraint failure as `Duplicate`, anything else as `Store`.
///
/// Pre-insert lookups can race with a concurrent writer; the constraint is
/// the final word.
pub fn duplicate_on_conflict(
    err: anyhow::Error,
    message: impl FnOnce() -> String,
) -> ServiceError {
    if is_unique_violation(&err) {
        let message = message();
        tracing::warn!("Unique constraint rejected write: {}", message);
        ServiceError::Duplicate(message)
    } else {
        ServiceError::Store(err)
    }
}

/// Collect the names whose presence check failed into a `MissingField` error
pub fn require_fields(checks: &[(&'static str, bool)]) -> ServiceResult<()> {
    let missing: Vec<&'static str> = checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::MissingField(missing))
    }
}

/// True when an optional text field holds something other than whitespace
pub fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_fields_lists_every_missing_name() {
        let err = require_fields(&[("title", false), ("image", true), ("theme", false)]).unwrap_err();

        match err {
            ServiceError::MissingField(fields) => assert_eq!(fields, vec!["title", "theme"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_require_fields_ok() {
        assert!(require_fields(&[("name", true)]).is_ok());
        assert!(require_fields(&[]).is_ok());
    }

    #[test]
    fn test_present() {
        assert!(present(&Some("a".to_string())));
        assert!(!present(&Some("   ".to_string())));
        assert!(!present(&None));
    }

    #[test]
    fn test_still_referenced_message() {
        let err = ServiceError::StillReferenced {
            entity: "category",
            id: 3,
            dependent: "theme(s)",
            count: 2,
        };
        assert_eq!(err.to_string(), "Cannot delete category 3: still referenced by 2 theme(s)");
    }

    #[tokio::test]
    async fn test_unique_violation_becomes_duplicate() {
        use anyhow::Context;
        use crate::db::{create_test_pool, migrations};

        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let insert = "INSERT INTO categories (name, allow_types) VALUES ('Photo', '[]')";
        pool.execute(insert).await.unwrap();

        let err = sqlx::query(insert)
            .execute(pool.as_sqlite().unwrap())
            .await
            .context("Failed to create category")
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(matches!(
            duplicate_on_conflict(err, || "Category 'Photo' already exists".to_string()),
            ServiceError::Duplicate(m) if m == "Category 'Photo' already exists"
        ));

        let other = anyhow::anyhow!("connection reset");
        assert!(!is_unique_violation(&other));
        assert!(matches!(
            duplicate_on_conflict(other, String::new),
            ServiceError::Store(_)
        ));
    }

    #[test]
    fn test_list_query_error_becomes_validation() {
        let err: ServiceError = ListQueryError::UnknownSortField("nope".to_string()).into();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
