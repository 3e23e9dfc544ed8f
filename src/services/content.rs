//! Content service
//!
//! Content records are authored by creators and admins. Each record belongs
//! to a theme and owns an ordered list of blocks; clients never address
//! blocks directly, they submit the full list with every create or update:
//!
//! - at least one submitted block category must be listed by the theme
//! - blocks carrying an id overwrite that block, blocks without one are new,
//!   and stored blocks left out of the submission are deleted
//! - only the creator may edit a record; the creator or an admin may delete it

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Deserialize;

use crate::db::repositories::{
    CategoryRepository, ContentRepository, ThemeRepository, UserRepository,
};
use crate::models::{
    Content, ContentDetail, ContentFields, ContentInput, ContentTypeDetail, ContentTypeItem,
    ListQuery, CONTENT_LIST,
};
use crate::services::error::{present, require_fields, ServiceError, ServiceResult};
use crate::services::integrity::{plan_block_sync, validate_content_against_theme};
use crate::services::policy::{ensure_can_mutate, Principal};

/// Content create/update request as received
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub theme: Option<i64>,
    /// Content blocks, in display order
    pub data: Option<Vec<BlockDraft>>,
}

/// One submitted content block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockDraft {
    /// Set when the block already belongs to the content being updated
    pub id: Option<i64>,
    pub category: Option<i64>,
    pub data: Option<String>,
}

impl ContentDraft {
    fn validate(self) -> ServiceResult<ContentInput> {
        let blocks = self.data.as_deref().unwrap_or_default();
        require_fields(&[
            ("title", present(&self.title)),
            ("description", present(&self.description)),
            ("image", present(&self.image)),
            ("theme", self.theme.is_some()),
            ("data", self.data.is_some()),
            ("data.category", blocks.iter().all(|b| b.category.is_some())),
            ("data.data", blocks.iter().all(|b| present(&b.data))),
        ])?;

        let items = self
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|b| {
                Some(ContentTypeItem {
                    id: b.id,
                    category: b.category?,
                    data: b.data?,
                })
            })
            .collect();

        Ok(ContentInput {
            title: self.title.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default(),
            image: self.image.unwrap_or_default(),
            theme: self.theme.unwrap_or_default(),
            items,
        })
    }
}

pub struct ContentService {
    contents: Arc<dyn ContentRepository>,
    themes: Arc<dyn ThemeRepository>,
    categories: Arc<dyn CategoryRepository>,
    users: Arc<dyn UserRepository>,
}

impl ContentService {
    pub fn new(
        contents: Arc<dyn ContentRepository>,
        themes: Arc<dyn ThemeRepository>,
        categories: Arc<dyn CategoryRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            contents,
            themes,
            categories,
            users,
        }
    }

    /// Create a content record owned by `principal`.
    ///
    /// The record and its blocks are written together; nothing is written
    /// when validation fails.
    pub async fn create(&self, principal: &Principal, draft: ContentDraft) -> ServiceResult<Content> {
        let input = draft.validate()?;
        validate_content_against_theme(
            self.themes.as_ref(),
            self.categories.as_ref(),
            input.theme,
            &input.category_ids(),
        )
        .await?;

        // New content owns no blocks yet, so any submitted block id is foreign
        let plan = plan_block_sync(&[], &input.items)?;
        let created = self
            .contents
            .create(&ContentFields::from(&input), principal.id, &plan.inserts)
            .await?;

        tracing::info!(
            "User {} created content {} with {} block(s)",
            principal.id,
            created.id,
            created.content_type.len()
        );
        Ok(created)
    }

    /// Content `id` with creator, theme and block categories expanded
    pub async fn get(&self, id: i64) -> ServiceResult<ContentDetail> {
        let content = self.find(id).await?;

        let theme = self
            .themes
            .get_by_id(content.theme)
            .await?
            .ok_or_else(|| anyhow!("Theme {} of content {} is missing", content.theme, id))?;
        let creator = self
            .users
            .get_by_id(content.creator)
            .await?
            .ok_or_else(|| anyhow!("Creator {} of content {} is missing", content.creator, id))?;

        let blocks = self.contents.get_blocks(content.id).await?;
        let mut category_ids: Vec<i64> = blocks.iter().map(|b| b.category).collect();
        category_ids.sort_unstable();
        category_ids.dedup();
        let categories: HashMap<i64, _> = self
            .categories
            .get_many(&category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.reference()))
            .collect();

        let mut content_type = Vec::with_capacity(blocks.len());
        for block in blocks {
            let category = categories.get(&block.category).cloned().ok_or_else(|| {
                anyhow!("Category {} of block {} is missing", block.category, block.id)
            })?;
            content_type.push(ContentTypeDetail {
                id: block.id,
                category,
                data: block.data,
                position: block.position,
            });
        }

        Ok(ContentDetail {
            id: content.id,
            title: content.title,
            description: content.description,
            image: content.image,
            creator: creator.summary(),
            theme: theme.summary(),
            content_type,
            created_at: content.created_at,
            updated_at: content.updated_at,
        })
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Vec<Content>> {
        let options = CONTENT_LIST.resolve(query)?;
        Ok(self.contents.list(&options).await?)
    }

    /// Replace the fields and blocks of content `id`.
    ///
    /// The creator never changes. Block changes and the field update are
    /// applied in one transaction.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        draft: ContentDraft,
    ) -> ServiceResult<Content> {
        let input = draft.validate()?;
        let content = self.find(id).await?;

        validate_content_against_theme(
            self.themes.as_ref(),
            self.categories.as_ref(),
            input.theme,
            &input.category_ids(),
        )
        .await?;
        ensure_can_mutate(principal, Some(content.creator), "edit content")?;

        let plan = plan_block_sync(&content.content_type, &input.items)?;
        let updated = self
            .contents
            .update(content.id, &ContentFields::from(&input), &plan)
            .await?;

        tracing::info!(
            "Content {} updated by {}: {} kept, {} added, {} removed",
            id,
            principal.id,
            plan.updates.len(),
            plan.inserts.len(),
            plan.deletes.len()
        );
        Ok(updated)
    }

    /// Delete content `id` and its blocks
    pub async fn delete(&self, principal: &Principal, id: i64) -> ServiceResult<()> {
        let content = self.find(id).await?;
        ensure_can_mutate(principal, Some(content.creator), "delete content")?;

        if !self.contents.delete(content.id).await? {
            return Err(ServiceError::NotFound(format!("Content {}", id)));
        }
        tracing::info!("Content {} deleted by {}", id, principal.id);
        Ok(())
    }

    async fn find(&self, id: i64) -> ServiceResult<Content> {
        self.contents
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Content {}", id)))
    }
}
