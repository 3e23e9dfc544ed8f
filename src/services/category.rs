//! Category service
//!
//! Admin-managed categories:
//! - names are unique
//! - `allowTypes` is a list of non-blank tags
//! - a category cannot be deleted while a theme lists it or a content
//!   block is stored under it

use std::sync::Arc;

use serde::Deserialize;

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryInput, ListQuery, CATEGORY_LIST};
use crate::services::error::{
    duplicate_on_conflict, present, require_fields, ServiceError, ServiceResult,
};
use crate::services::integrity::{guard_delete, Guarded};

/// Category create/update request as received
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: Option<String>,
    pub allow_types: Option<Vec<String>>,
}

impl CategoryDraft {
    fn validate(self) -> ServiceResult<CategoryInput> {
        require_fields(&[
            ("name", present(&self.name)),
            ("allowTypes", self.allow_types.is_some()),
        ])?;

        let allow_types: Vec<String> = self
            .allow_types
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .collect();
        if allow_types.iter().any(|t| t.is_empty()) {
            return Err(ServiceError::Validation(
                "allowTypes entries cannot be blank".to_string(),
            ));
        }

        Ok(CategoryInput {
            name: self.name.unwrap_or_default().trim().to_string(),
            allow_types,
        })
    }
}

pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// - `MissingField` when `name` or `allowTypes` is absent
    /// - `Duplicate` when the name is taken
    pub async fn create(&self, draft: CategoryDraft) -> ServiceResult<Category> {
        let input = draft.validate()?;
        self.ensure_name_free(&input.name, None).await?;

        let created = self
            .categories
            .create(&Category::new(input.name.clone(), input.allow_types))
            .await
            .map_err(|e| {
                duplicate_on_conflict(e, || format!("Category '{}' already exists", input.name))
            })?;
        tracing::info!("Created category {} ({})", created.id, created.name);
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Category> {
        self.categories
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {}", id)))
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Vec<Category>> {
        let options = CATEGORY_LIST.resolve(query)?;
        Ok(self.categories.list(&options).await?)
    }

    /// Replace name and allowed types of category `id`
    pub async fn update(&self, id: i64, draft: CategoryDraft) -> ServiceResult<Category> {
        let input = draft.validate()?;
        let mut category = self.get(id).await?;
        self.ensure_name_free(&input.name, Some(id)).await?;

        category.name = input.name;
        category.allow_types = input.allow_types;
        self.categories.update(&category).await.map_err(|e| {
            duplicate_on_conflict(e, || format!("Category '{}' already exists", category.name))
        })
    }

    /// Delete category `id` unless a theme lists it or a content block uses it.
    ///
    /// Blocks are checked separately since a block may use a category its
    /// theme does not list.
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let category = self.get(id).await?;

        let themes = self.categories.count_referencing_themes(category.id).await?;
        guard_delete(Guarded::Category(category.id), themes)?;

        let blocks = self.categories.count_referencing_blocks(category.id).await?;
        guard_delete(Guarded::CategoryInContent(category.id), blocks)?;

        if !self.categories.delete(category.id).await? {
            return Err(ServiceError::NotFound(format!("Category {}", id)));
        }
        tracing::info!("Deleted category {}", id);
        Ok(())
    }

    async fn ensure_name_free(&self, name: &str, current: Option<i64>) -> ServiceResult<()> {
        match self.categories.get_by_name(name).await? {
            Some(existing) if Some(existing.id) != current => {
                tracing::warn!("Category name {} already used by {}", name, existing.id);
                Err(ServiceError::Duplicate(format!("Category '{}' already exists", name)))
            }
            _ => Ok(()),
        }
    }
}
