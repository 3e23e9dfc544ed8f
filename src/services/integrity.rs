//! Referential integrity rules
//!
//! Checks run by the services before writing:
//!
//! - reference validation for theme category lists and content blocks
//! - the deletion guard for categories and themes
//! - the diff that reconciles a content's stored blocks with a submission

use std::collections::HashSet;

use crate::db::repositories::{CategoryRepository, ThemeRepository};
use crate::models::{BlockSyncPlan, BlockWrite, ContentTypeItem, Theme};
use crate::services::error::{ServiceError, ServiceResult};

/// Every id in `category_ids` must name a distinct existing category.
///
/// The check compares counts, so a repeated id fails just like an unknown one.
pub async fn validate_theme_categories(
    categories: &dyn CategoryRepository,
    category_ids: &[i64],
) -> ServiceResult<()> {
    if category_ids.is_empty() {
        return Err(ServiceError::MissingField(vec!["categories"]));
    }

    let existing = categories.count_existing(category_ids).await?;
    if existing != category_ids.len() as i64 {
        tracing::warn!(
            "Theme category check failed: {} of {:?} exist",
            existing,
            category_ids
        );
        return Err(ServiceError::InvalidReference(format!(
            "Categories {:?} do not all exist or contain duplicates",
            category_ids
        )));
    }

    Ok(())
}

/// Load the theme a content record points at and check the submitted block
/// categories against it.
///
/// At least one submitted category must be among the theme's categories;
/// other submitted categories only need to exist.
pub async fn validate_content_against_theme(
    themes: &dyn ThemeRepository,
    categories: &dyn CategoryRepository,
    theme_id: i64,
    submitted: &[i64],
) -> ServiceResult<Theme> {
    let theme = themes.get_by_id(theme_id).await?.ok_or_else(|| {
        tracing::warn!("Content references missing theme {}", theme_id);
        ServiceError::InvalidReference(format!("Theme {} does not exist", theme_id))
    })?;

    if !theme.permits_any(submitted) {
        tracing::warn!(
            "Categories {:?} not allowed by theme {} ({:?})",
            submitted,
            theme.id,
            theme.categories
        );
        return Err(ServiceError::CategoryNotAllowed(theme.id));
    }

    let mut distinct = submitted.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let existing = categories.count_existing(&distinct).await?;
    if existing != distinct.len() as i64 {
        tracing::warn!("Content blocks reference missing categories: {:?}", distinct);
        return Err(ServiceError::InvalidReference(format!(
            "Categories {:?} do not all exist",
            distinct
        )));
    }

    Ok(theme)
}

/// An entity whose deletion is blocked while other rows point at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded {
    /// Referenced by themes
    Category(i64),
    /// Referenced by content blocks
    CategoryInContent(i64),
    /// Referenced by content
    Theme(i64),
}

impl Guarded {
    fn describe(&self) -> (&'static str, i64, &'static str) {
        match *self {
            Guarded::Category(id) => ("category", id, "theme(s)"),
            Guarded::CategoryInContent(id) => ("category", id, "content block(s)"),
            Guarded::Theme(id) => ("theme", id, "content record(s)"),
        }
    }
}

/// Allow the deletion only when nothing depends on the entity
pub fn guard_delete(entity: Guarded, dependent_count: i64) -> ServiceResult<()> {
    if dependent_count == 0 {
        return Ok(());
    }

    let (entity, id, dependent) = entity.describe();
    tracing::warn!(
        "Delete of {} {} blocked by {} {}",
        entity,
        id,
        dependent_count,
        dependent
    );
    Err(ServiceError::StillReferenced {
        entity,
        id,
        dependent,
        count: dependent_count,
    })
}

/// Work out how to turn the stored blocks `existing` into `submitted`.
///
/// Items carrying an id overwrite that block, items without one become new
/// blocks, and stored blocks the submission leaves out are deleted. Every
/// kept or new block takes its submission index as position. An id that is
/// not one of `existing`, or that appears twice, is rejected.
pub fn plan_block_sync(
    existing: &[i64],
    submitted: &[ContentTypeItem],
) -> ServiceResult<BlockSyncPlan> {
    let stored: HashSet<i64> = existing.iter().copied().collect();
    let mut kept = HashSet::new();
    let mut plan = BlockSyncPlan::default();

    for (position, item) in submitted.iter().enumerate() {
        let write = BlockWrite {
            category: item.category,
            data: item.data.clone(),
            position: position as i32,
        };

        match item.id {
            Some(id) if !stored.contains(&id) => {
                return Err(ServiceError::InvalidReference(format!(
                    "Content block {} does not belong to this content",
                    id
                )));
            }
            Some(id) if !kept.insert(id) => {
                return Err(ServiceError::InvalidReference(format!(
                    "Content block {} submitted more than once",
                    id
                )));
            }
            Some(id) => plan.updates.push((id, write)),
            None => plan.inserts.push(write),
        }
    }

    plan.deletes = existing
        .iter()
        .copied()
        .filter(|id| !kept.contains(id))
        .collect();

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxThemeRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Theme;

    fn item(id: Option<i64>, category: i64, data: &str) -> ContentTypeItem {
        ContentTypeItem {
            id,
            category,
            data: data.to_string(),
        }
    }

    async fn setup() -> (SqlxCategoryRepository, SqlxThemeRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO categories (name, allow_types) VALUES ('A', '[]'), ('B', '[]'), ('C', '[]')")
            .await
            .expect("Failed to seed categories");
        (
            SqlxCategoryRepository::new(pool.clone()),
            SqlxThemeRepository::new(pool),
        )
    }

    #[tokio::test]
    async fn test_validate_theme_categories() {
        let (categories, _) = setup().await;

        assert!(validate_theme_categories(&categories, &[1, 2]).await.is_ok());
        assert!(matches!(
            validate_theme_categories(&categories, &[1, 99]).await,
            Err(ServiceError::InvalidReference(_))
        ));
        assert!(matches!(
            validate_theme_categories(&categories, &[1, 1]).await,
            Err(ServiceError::InvalidReference(_))
        ));
        assert!(matches!(
            validate_theme_categories(&categories, &[]).await,
            Err(ServiceError::MissingField(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_content_against_theme() {
        let (categories, themes) = setup().await;
        let theme = themes
            .create(&Theme::new("Travel".to_string(), vec![1, 2]))
            .await
            .unwrap();

        // One allowed category is enough
        let found = validate_content_against_theme(&themes, &categories, theme.id, &[3, 2])
            .await
            .unwrap();
        assert_eq!(found.id, theme.id);

        assert!(matches!(
            validate_content_against_theme(&themes, &categories, theme.id, &[3]).await,
            Err(ServiceError::CategoryNotAllowed(id)) if id == theme.id
        ));
        assert!(matches!(
            validate_content_against_theme(&themes, &categories, 42, &[1]).await,
            Err(ServiceError::InvalidReference(_))
        ));
        assert!(matches!(
            validate_content_against_theme(&themes, &categories, theme.id, &[1, 77]).await,
            Err(ServiceError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_guard_delete() {
        assert!(guard_delete(Guarded::Category(1), 0).is_ok());
        assert!(matches!(
            guard_delete(Guarded::Theme(4), 2),
            Err(ServiceError::StillReferenced { entity: "theme", id: 4, count: 2, .. })
        ));
        assert!(matches!(
            guard_delete(Guarded::CategoryInContent(3), 1),
            Err(ServiceError::StillReferenced {
                entity: "category",
                id: 3,
                dependent: "content block(s)",
                count: 1,
            })
        ));
    }

    #[test]
    fn test_plan_updates_one_adds_one_drops_rest() {
        let plan = plan_block_sync(&[1, 2, 3], &[item(Some(1), 5, "kept"), item(None, 6, "new")])
            .unwrap();

        assert_eq!(
            plan.updates,
            vec![(1, BlockWrite { category: 5, data: "kept".to_string(), position: 0 })]
        );
        assert_eq!(
            plan.inserts,
            vec![BlockWrite { category: 6, data: "new".to_string(), position: 1 }]
        );
        assert_eq!(plan.deletes, vec![2, 3]);
    }

    #[test]
    fn test_plan_rejects_foreign_block() {
        assert!(matches!(
            plan_block_sync(&[1, 2], &[item(Some(9), 1, "x")]),
            Err(ServiceError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_plan_rejects_repeated_block() {
        assert!(matches!(
            plan_block_sync(&[1], &[item(Some(1), 1, "a"), item(Some(1), 1, "b")]),
            Err(ServiceError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_plan_empty_submission_deletes_everything() {
        let plan = plan_block_sync(&[4, 5], &[]).unwrap();
        assert!(plan.updates.is_empty());
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.deletes, vec![4, 5]);
    }
}
