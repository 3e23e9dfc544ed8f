//! Theme service
//!
//! Themes list, in order, the categories their content may use. Every listed
//! category must exist, and a theme cannot be deleted while content uses it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::db::repositories::{CategoryRepository, ThemeRepository};
use crate::models::{ListQuery, Theme, ThemeDetail, ThemeInput, THEME_LIST};
use crate::services::error::{
    duplicate_on_conflict, present, require_fields, ServiceError, ServiceResult,
};
use crate::services::integrity::{guard_delete, validate_theme_categories, Guarded};

/// Theme create/update request as received
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeDraft {
    pub name: Option<String>,
    pub categories: Option<Vec<i64>>,
}

impl ThemeDraft {
    fn validate(self) -> ServiceResult<ThemeInput> {
        require_fields(&[
            ("name", present(&self.name)),
            (
                "categories",
                self.categories.as_ref().is_some_and(|c| !c.is_empty()),
            ),
        ])?;

        Ok(ThemeInput {
            name: self.name.unwrap_or_default().trim().to_string(),
            categories: self.categories.unwrap_or_default(),
        })
    }
}

pub struct ThemeService {
    themes: Arc<dyn ThemeRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl ThemeService {
    pub fn new(themes: Arc<dyn ThemeRepository>, categories: Arc<dyn CategoryRepository>) -> Self {
        Self { themes, categories }
    }

    /// Create a theme.
    ///
    /// # Errors
    ///
    /// - `InvalidReference` when a category id is unknown or repeated; no
    ///   theme row is written
    /// - `Duplicate` when the name is taken
    pub async fn create(&self, draft: ThemeDraft) -> ServiceResult<Theme> {
        let input = draft.validate()?;
        validate_theme_categories(self.categories.as_ref(), &input.categories).await?;
        self.ensure_name_free(&input.name, None).await?;

        let created = self
            .themes
            .create(&Theme::new(input.name.clone(), input.categories))
            .await
            .map_err(|e| {
                duplicate_on_conflict(e, || format!("Theme '{}' already exists", input.name))
            })?;
        tracing::info!("Created theme {} ({})", created.id, created.name);
        Ok(created)
    }

    /// Theme `id` with its categories expanded, in theme order
    pub async fn get(&self, id: i64) -> ServiceResult<ThemeDetail> {
        let theme = self.find(id).await?;

        let mut by_id: HashMap<i64, _> = self
            .categories
            .get_many(&theme.categories)
            .await?
            .into_iter()
            .map(|c| (c.id, c.reference()))
            .collect();

        Ok(ThemeDetail {
            id: theme.id,
            name: theme.name,
            categories: theme
                .categories
                .iter()
                .filter_map(|id| by_id.remove(id))
                .collect(),
            created_at: theme.created_at,
            updated_at: theme.updated_at,
        })
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Vec<Theme>> {
        let options = THEME_LIST.resolve(query)?;
        Ok(self.themes.list(&options).await?)
    }

    /// Replace name and category list of theme `id`
    pub async fn update(&self, id: i64, draft: ThemeDraft) -> ServiceResult<Theme> {
        let input = draft.validate()?;
        let mut theme = self.find(id).await?;
        validate_theme_categories(self.categories.as_ref(), &input.categories).await?;
        self.ensure_name_free(&input.name, Some(id)).await?;

        theme.name = input.name;
        theme.categories = input.categories;
        self.themes.update(&theme).await.map_err(|e| {
            duplicate_on_conflict(e, || format!("Theme '{}' already exists", theme.name))
        })
    }

    /// Delete theme `id` unless content still uses it
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let theme = self.find(id).await?;

        let contents = self.themes.count_referencing_contents(theme.id).await?;
        guard_delete(Guarded::Theme(theme.id), contents)?;

        if !self.themes.delete(theme.id).await? {
            return Err(ServiceError::NotFound(format!("Theme {}", id)));
        }
        tracing::info!("Deleted theme {}", id);
        Ok(())
    }

    async fn find(&self, id: i64) -> ServiceResult<Theme> {
        self.themes
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Theme {}", id)))
    }

    async fn ensure_name_free(&self, name: &str, current: Option<i64>) -> ServiceResult<()> {
        match self.themes.get_by_name(name).await? {
            Some(existing) if Some(existing.id) != current => {
                tracing::warn!("Theme name {} already used by {}", name, existing.id);
                Err(ServiceError::Duplicate(format!("Theme '{}' already exists", name)))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxThemeRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, ThemeService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            r#"INSERT INTO categories (name, allow_types) VALUES ('Text', '["text"]'), ('Photo', '["image"]'), ('Video', '["video"]')"#,
        )
        .await
        .expect("Failed to seed categories");

        let service = ThemeService::new(
            SqlxThemeRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn draft(name: &str, categories: &[i64]) -> ThemeDraft {
        ThemeDraft {
            name: Some(name.to_string()),
            categories: Some(categories.to_vec()),
        }
    }

    async fn theme_rows(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM themes")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_travel_theme() {
        let (_pool, service) = setup_test_service().await;

        let theme = service.create(draft("Travel", &[1, 2])).await.unwrap();

        assert_eq!(theme.name, "Travel");
        assert_eq!(theme.categories, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_create_with_unknown_category_writes_no_row() {
        let (pool, service) = setup_test_service().await;

        let err = service.create(draft("Travel", &[1, 99])).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidReference(_)));
        assert_eq!(theme_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_create_requires_categories() {
        let (pool, service) = setup_test_service().await;

        let err = service.create(draft("Travel", &[])).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingField(f) if f == vec!["categories"]));

        let err = service.create(ThemeDraft::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingField(f) if f == vec!["name", "categories"]));
        assert_eq!(theme_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_get_expands_categories_in_theme_order() {
        let (_pool, service) = setup_test_service().await;
        let theme = service.create(draft("Travel", &[3, 1])).await.unwrap();

        let detail = service.get(theme.id).await.unwrap();

        let names: Vec<&str> = detail.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Video", "Text"]);
        assert_eq!(detail.categories[0].allow_types, vec!["video"]);
    }

    #[tokio::test]
    async fn test_update_with_unknown_category_keeps_theme() {
        let (_pool, service) = setup_test_service().await;
        let theme = service.create(draft("Travel", &[1, 2])).await.unwrap();

        let err = service.update(theme.id, draft("Trips", &[2, 42])).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidReference(_)));

        let unchanged = service.get(theme.id).await.unwrap();
        assert_eq!(unchanged.name, "Travel");
        assert_eq!(unchanged.categories.len(), 2);

        let updated = service.update(theme.id, draft("Trips", &[2, 3])).await.unwrap();
        assert_eq!(updated.name, "Trips");
        assert_eq!(updated.categories, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_duplicate_theme_name() {
        let (_pool, service) = setup_test_service().await;
        service.create(draft("Travel", &[1])).await.unwrap();

        assert!(matches!(
            service.create(draft("Travel", &[2])).await,
            Err(ServiceError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_blocked_while_content_uses_theme() {
        let (pool, service) = setup_test_service().await;
        let theme = service.create(draft("Travel", &[1])).await.unwrap();
        pool.execute("INSERT INTO users (username, email, password_hash) VALUES ('u', 'u@example.com', 'h')")
            .await
            .unwrap();
        pool.execute(&format!(
            "INSERT INTO contents (title, description, image, creator_id, theme_id) VALUES ('t', 'd', 'i', 1, {})",
            theme.id
        ))
        .await
        .unwrap();

        let err = service.delete(theme.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::StillReferenced { entity: "theme", count: 1, .. }));
        assert!(service.get(theme.id).await.is_ok());

        pool.execute("DELETE FROM contents").await.unwrap();
        service.delete(theme.id).await.unwrap();
        assert!(matches!(service.get(theme.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_themes_sorted_by_name() {
        let (_pool, service) = setup_test_service().await;
        service.create(draft("Travel", &[1])).await.unwrap();
        service.create(draft("Food", &[2])).await.unwrap();

        let themes = service
            .list(&ListQuery {
                sort: Some("name".to_string()),
                order: Some("ASC".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let names: Vec<String> = themes.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Food", "Travel"]);
    }
}
