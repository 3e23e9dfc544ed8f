//! Content repository
//!
//! Content records and their owned content blocks (`content_types` rows).
//! Every operation that writes both tables runs in one transaction, so a
//! content record is never visible with a partial set of blocks.

use super::{bind_filters_mysql, bind_filters_sqlite, build_list_query, placeholders};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{BlockSyncPlan, BlockWrite, Content, ContentFields, ContentType, ListOptions};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Create a content record owned by `creator` together with its blocks
    async fn create(&self, fields: &ContentFields, creator: i64, blocks: &[BlockWrite])
        -> Result<Content>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Content>>;

    /// Blocks of a content record, in position order
    async fn get_blocks(&self, content_id: i64) -> Result<Vec<ContentType>>;

    /// Apply `plan` to the blocks of content `id` and overwrite its fields
    async fn update(&self, id: i64, fields: &ContentFields, plan: &BlockSyncPlan)
        -> Result<Content>;

    /// Delete a content record and its blocks, returning false when it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// List content records matching `options`
    async fn list(&self, options: &ListOptions) -> Result<Vec<Content>>;
}

/// SQLx-based content repository implementation
pub struct SqlxContentRepository {
    pool: DynDatabasePool,
}

impl SqlxContentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContentRepository for SqlxContentRepository {
    async fn create(
        &self,
        fields: &ContentFields,
        creator: i64,
        blocks: &[BlockWrite],
    ) -> Result<Content> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_content_sqlite(self.pool.sqlite()?, fields, creator, blocks).await?
            }
            DatabaseDriver::Mysql => {
                create_content_mysql(self.pool.mysql()?, fields, creator, blocks).await?
            }
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Content not found after creation"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Content>> {
        let sql = format!("SELECT {} FROM contents WHERE id = ?", CONTENT_COLUMNS);
        let mut contents = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let rows = sqlx::query(&sql)
                    .bind(id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to get content by ID")?;
                attach_blocks_sqlite(pool, rows).await?
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let rows = sqlx::query(&sql)
                    .bind(id)
                    .fetch_all(pool)
                    .await
                    .context("Failed to get content by ID")?;
                attach_blocks_mysql(pool, rows).await?
            }
        };
        Ok(contents.pop())
    }

    async fn get_blocks(&self, content_id: i64) -> Result<Vec<ContentType>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_blocks_sqlite(self.pool.sqlite()?, content_id).await,
            DatabaseDriver::Mysql => get_blocks_mysql(self.pool.mysql()?, content_id).await,
        }
    }

    async fn update(
        &self,
        id: i64,
        fields: &ContentFields,
        plan: &BlockSyncPlan,
    ) -> Result<Content> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_content_sqlite(self.pool.sqlite()?, id, fields, plan).await?
            }
            DatabaseDriver::Mysql => {
                update_content_mysql(self.pool.mysql()?, id, fields, plan).await?
            }
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Content not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_content_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_content_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<Content>> {
        let select = format!("SELECT {} FROM contents", CONTENT_COLUMNS);
        let (sql, binds) = build_list_query(&select, options);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let rows = bind_filters_sqlite(sqlx::query(&sql), &binds)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list contents")?;
                attach_blocks_sqlite(pool, rows).await
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                let rows = bind_filters_mysql(sqlx::query(&sql), &binds)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list contents")?;
                attach_blocks_mysql(pool, rows).await
            }
        }
    }
}

const CONTENT_COLUMNS: &str =
    "id, title, description, image, creator_id, theme_id, created_at, updated_at";
const BLOCK_COLUMNS: &str = "id, content_id, category_id, data, position";
const INSERT_BLOCK: &str =
    "INSERT INTO content_types (content_id, category_id, data, position, created_at) VALUES (?, ?, ?, ?, ?)";
const UPDATE_BLOCK: &str =
    "UPDATE content_types SET category_id = ?, data = ?, position = ? WHERE id = ? AND content_id = ?";
const DELETE_BLOCK: &str = "DELETE FROM content_types WHERE id = ? AND content_id = ?";
const UPDATE_FIELDS: &str =
    "UPDATE contents SET title = ?, description = ?, image = ?, theme_id = ?, updated_at = ? WHERE id = ?";

fn blocks_query(content_count: usize) -> String {
    format!(
        "SELECT id, content_id FROM content_types WHERE content_id IN ({}) ORDER BY content_id, position, id",
        placeholders(content_count)
    )
}

fn group_block_ids(pairs: Vec<(i64, i64)>) -> HashMap<i64, Vec<i64>> {
    let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
    for (block_id, content_id) in pairs {
        grouped.entry(content_id).or_default().push(block_id);
    }
    grouped
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_content_sqlite(
    pool: &SqlitePool,
    fields: &ContentFields,
    creator: i64,
    blocks: &[BlockWrite],
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO contents (title, description, image, creator_id, theme_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.image)
    .bind(creator)
    .bind(fields.theme)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create content")?
    .last_insert_rowid();

    for block in blocks {
        sqlx::query(INSERT_BLOCK)
            .bind(id)
            .bind(block.category)
            .bind(&block.data)
            .bind(block.position)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create content block")?;
    }

    tx.commit().await.context("Failed to commit content creation")?;
    Ok(id)
}

async fn get_blocks_sqlite(pool: &SqlitePool, content_id: i64) -> Result<Vec<ContentType>> {
    let sql = format!(
        "SELECT {} FROM content_types WHERE content_id = ? ORDER BY position, id",
        BLOCK_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(content_id)
        .fetch_all(pool)
        .await
        .context("Failed to get content blocks")?;

    Ok(rows
        .iter()
        .map(|row| ContentType {
            id: row.get("id"),
            content: row.get("content_id"),
            category: row.get("category_id"),
            data: row.get("data"),
            position: row.get("position"),
        })
        .collect())
}

async fn attach_blocks_sqlite(
    pool: &SqlitePool,
    rows: Vec<sqlx::sqlite::SqliteRow>,
) -> Result<Vec<Content>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.get("id")).collect();
    let sql = blocks_query(ids.len());
    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for id in &ids {
        query = query.bind(*id);
    }
    let mut blocks = group_block_ids(
        query
            .fetch_all(pool)
            .await
            .context("Failed to load content blocks")?,
    );

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            Content {
                id,
                title: row.get("title"),
                description: row.get("description"),
                image: row.get("image"),
                creator: row.get("creator_id"),
                theme: row.get("theme_id"),
                content_type: blocks.remove(&id).unwrap_or_default(),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            }
        })
        .collect())
}

async fn update_content_sqlite(
    pool: &SqlitePool,
    id: i64,
    fields: &ContentFields,
    plan: &BlockSyncPlan,
) -> Result<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for (block_id, block) in &plan.updates {
        sqlx::query(UPDATE_BLOCK)
            .bind(block.category)
            .bind(&block.data)
            .bind(block.position)
            .bind(*block_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update content block")?;
    }

    for block in &plan.inserts {
        sqlx::query(INSERT_BLOCK)
            .bind(id)
            .bind(block.category)
            .bind(&block.data)
            .bind(block.position)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create content block")?;
    }

    for block_id in &plan.deletes {
        sqlx::query(DELETE_BLOCK)
            .bind(*block_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete content block")?;
    }

    sqlx::query(UPDATE_FIELDS)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.image)
        .bind(fields.theme)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update content")?;

    tx.commit().await.context("Failed to commit content update")?;
    Ok(())
}

async fn delete_content_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM content_types WHERE content_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete content blocks")?;

    let affected = sqlx::query("DELETE FROM contents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete content")?
        .rows_affected();

    tx.commit().await.context("Failed to commit content deletion")?;
    Ok(affected > 0)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_content_mysql(
    pool: &MySqlPool,
    fields: &ContentFields,
    creator: i64,
    blocks: &[BlockWrite],
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query(
        r#"
        INSERT INTO contents (title, description, image, creator_id, theme_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.image)
    .bind(creator)
    .bind(fields.theme)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create content")?
    .last_insert_id() as i64;

    for block in blocks {
        sqlx::query(INSERT_BLOCK)
            .bind(id)
            .bind(block.category)
            .bind(&block.data)
            .bind(block.position)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create content block")?;
    }

    tx.commit().await.context("Failed to commit content creation")?;
    Ok(id)
}

async fn get_blocks_mysql(pool: &MySqlPool, content_id: i64) -> Result<Vec<ContentType>> {
    let sql = format!(
        "SELECT {} FROM content_types WHERE content_id = ? ORDER BY position, id",
        BLOCK_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(content_id)
        .fetch_all(pool)
        .await
        .context("Failed to get content blocks")?;

    Ok(rows
        .iter()
        .map(|row| ContentType {
            id: row.get("id"),
            content: row.get("content_id"),
            category: row.get("category_id"),
            data: row.get("data"),
            position: row.get("position"),
        })
        .collect())
}

async fn attach_blocks_mysql(
    pool: &MySqlPool,
    rows: Vec<sqlx::mysql::MySqlRow>,
) -> Result<Vec<Content>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.get("id")).collect();
    let sql = blocks_query(ids.len());
    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for id in &ids {
        query = query.bind(*id);
    }
    let mut blocks = group_block_ids(
        query
            .fetch_all(pool)
            .await
            .context("Failed to load content blocks")?,
    );

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            Content {
                id,
                title: row.get("title"),
                description: row.get("description"),
                image: row.get("image"),
                creator: row.get("creator_id"),
                theme: row.get("theme_id"),
                content_type: blocks.remove(&id).unwrap_or_default(),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            }
        })
        .collect())
}

async fn update_content_mysql(
    pool: &MySqlPool,
    id: i64,
    fields: &ContentFields,
    plan: &BlockSyncPlan,
) -> Result<()> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for (block_id, block) in &plan.updates {
        sqlx::query(UPDATE_BLOCK)
            .bind(block.category)
            .bind(&block.data)
            .bind(block.position)
            .bind(*block_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to update content block")?;
    }

    for block in &plan.inserts {
        sqlx::query(INSERT_BLOCK)
            .bind(id)
            .bind(block.category)
            .bind(&block.data)
            .bind(block.position)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to create content block")?;
    }

    for block_id in &plan.deletes {
        sqlx::query(DELETE_BLOCK)
            .bind(*block_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete content block")?;
    }

    sqlx::query(UPDATE_FIELDS)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.image)
        .bind(fields.theme)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update content")?;

    tx.commit().await.context("Failed to commit content update")?;
    Ok(())
}

async fn delete_content_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("DELETE FROM content_types WHERE content_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete content blocks")?;

    let affected = sqlx::query("DELETE FROM contents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete content")?
        .rows_affected();

    tx.commit().await.context("Failed to commit content deletion")?;
    Ok(affected > 0)
}
