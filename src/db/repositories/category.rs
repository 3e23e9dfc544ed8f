//! Category repository
//!
//! Database operations for categories.
//!
//! This module provides:
//! - `CategoryRepository` trait defining the interface for category data access
//! - `SqlxCategoryRepository` implementing the trait for SQLite and MySQL
//!
//! `allowTypes` lives in the `allow_types` column as a JSON text array.

use super::{bind_filters_mysql, bind_filters_sqlite, build_list_query, placeholders};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{decode_allow_types, encode_allow_types, Category, ListOptions};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category
    async fn create(&self, category: &Category) -> Result<Category>;

    /// Get category by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    /// Get category by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// Get the categories with the given ids, in no particular order
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Category>>;

    /// Count how many of `ids` name an existing category
    async fn count_existing(&self, ids: &[i64]) -> Result<i64>;

    /// Count themes whose category list contains `id`
    async fn count_referencing_themes(&self, id: i64) -> Result<i64>;

    /// Count content blocks stored under category `id`
    async fn count_referencing_blocks(&self, id: i64) -> Result<i64>;

    /// List categories matching `options`
    async fn list(&self, options: &ListOptions) -> Result<Vec<Category>>;

    /// Update name and allowed types of a category
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Delete a category, returning false when it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based category repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    /// Create a new SQLx category repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const CATEGORY_COLUMNS: &str = "id, name, allow_types, created_at, updated_at";

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_category_sqlite(self.pool.sqlite()?, category).await,
            DatabaseDriver::Mysql => create_category_mysql(self.pool.mysql()?, category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        Ok(self.get_many(&[id]).await?.pop())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_category_by_name_sqlite(self.pool.sqlite()?, name).await,
            DatabaseDriver::Mysql => get_category_by_name_mysql(self.pool.mysql()?, name).await,
        }
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_categories_sqlite(self.pool.sqlite()?, ids).await,
            DatabaseDriver::Mysql => get_categories_mysql(self.pool.mysql()?, ids).await,
        }
    }

    async fn count_existing(&self, ids: &[i64]) -> Result<i64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) AS count FROM categories WHERE id IN ({})",
            placeholders(ids.len())
        );
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query.fetch_one(self.pool.sqlite()?).await
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query.fetch_one(self.pool.mysql()?).await
            }
        }
        .context("Failed to count existing categories")?;

        Ok(count)
    }

    async fn count_referencing_themes(&self, id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(DISTINCT theme_id) FROM theme_categories WHERE category_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(id)
                    .fetch_one(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(id)
                    .fetch_one(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to count themes referencing category")?;

        Ok(count)
    }

    async fn count_referencing_blocks(&self, id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM content_types WHERE category_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(id)
                    .fetch_one(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(id)
                    .fetch_one(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to count content blocks referencing category")?;

        Ok(count)
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<Category>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_categories_sqlite(self.pool.sqlite()?, options).await,
            DatabaseDriver::Mysql => list_categories_mysql(self.pool.mysql()?, options).await,
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_category_sqlite(self.pool.sqlite()?, category).await,
            DatabaseDriver::Mysql => update_category_mysql(self.pool.mysql()?, category).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM categories WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete category")?;

        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO categories (name, allow_types, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&category.name)
    .bind(encode_allow_types(&category.allow_types)?)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..category.clone()
    })
}

async fn get_category_by_name_sqlite(pool: &SqlitePool, name: &str) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE name = ?", CATEGORY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by name")?;

    row.as_ref().map(row_to_category_sqlite).transpose()
}

async fn get_categories_sqlite(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE id IN ({})",
        CATEGORY_COLUMNS,
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get categories by ID")?;

    rows.iter().map(row_to_category_sqlite).collect()
}

async fn list_categories_sqlite(pool: &SqlitePool, options: &ListOptions) -> Result<Vec<Category>> {
    let select = format!("SELECT {} FROM categories", CATEGORY_COLUMNS);
    let (sql, binds) = build_list_query(&select, options);

    let rows = bind_filters_sqlite(sqlx::query(&sql), &binds)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    rows.iter().map(row_to_category_sqlite).collect()
}

async fn update_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    sqlx::query("UPDATE categories SET name = ?, allow_types = ?, updated_at = ? WHERE id = ?")
        .bind(&category.name)
        .bind(encode_allow_types(&category.allow_types)?)
        .bind(Utc::now())
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_categories_sqlite(pool, &[category.id])
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    let allow_types: String = row.get("allow_types");

    Ok(Category {
        id: row.get("id"),
        name: row.get("name"),
        allow_types: decode_allow_types(&allow_types)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO categories (name, allow_types, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&category.name)
    .bind(encode_allow_types(&category.allow_types)?)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..category.clone()
    })
}

async fn get_category_by_name_mysql(pool: &MySqlPool, name: &str) -> Result<Option<Category>> {
    let sql = format!("SELECT {} FROM categories WHERE name = ?", CATEGORY_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by name")?;

    row.as_ref().map(row_to_category_mysql).transpose()
}

async fn get_categories_mysql(pool: &MySqlPool, ids: &[i64]) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE id IN ({})",
        CATEGORY_COLUMNS,
        placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to get categories by ID")?;

    rows.iter().map(row_to_category_mysql).collect()
}

async fn list_categories_mysql(pool: &MySqlPool, options: &ListOptions) -> Result<Vec<Category>> {
    let select = format!("SELECT {} FROM categories", CATEGORY_COLUMNS);
    let (sql, binds) = build_list_query(&select, options);

    let rows = bind_filters_mysql(sqlx::query(&sql), &binds)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    rows.iter().map(row_to_category_mysql).collect()
}

async fn update_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    sqlx::query("UPDATE categories SET name = ?, allow_types = ?, updated_at = ? WHERE id = ?")
        .bind(&category.name)
        .bind(encode_allow_types(&category.allow_types)?)
        .bind(Utc::now())
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_categories_mysql(pool, &[category.id])
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Category not found after update"))
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Category> {
    let allow_types: String = row.get("allow_types");

    Ok(Category {
        id: row.get("id"),
        name: row.get("name"),
        allow_types: decode_allow_types(&allow_types)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ListQuery, CATEGORY_LIST};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    fn category(name: &str, types: &[&str]) -> Category {
        Category::new(name.to_string(), types.iter().map(|t| t.to_string()).collect())
    }

    #[tokio::test]
    async fn test_create_and_get_category() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&category("Photo", &["image", "gif"])).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("Category not found");
        assert_eq!(found.name, "Photo");
        assert_eq!(found.allow_types, vec!["image", "gif"]);

        let by_name = repo.get_by_name("Photo").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);

        assert!(repo.get_by_id(999).await.unwrap().is_none());
        assert!(repo.get_by_name("Missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_name_constraint() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&category("Photo", &[])).await.unwrap();

        assert!(repo.create(&category("Photo", &["video"])).await.is_err());
    }

    #[tokio::test]
    async fn test_count_existing_counts_each_id_once() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&category("A", &[])).await.unwrap();
        let b = repo.create(&category("B", &[])).await.unwrap();

        assert_eq!(repo.count_existing(&[a.id, b.id]).await.unwrap(), 2);
        assert_eq!(repo.count_existing(&[a.id, 99]).await.unwrap(), 1);
        // A repeated id still matches a single row
        assert_eq!(repo.count_existing(&[a.id, a.id]).await.unwrap(), 1);
        assert_eq!(repo.count_existing(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_many() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&category("A", &[])).await.unwrap();
        let b = repo.create(&category("B", &[])).await.unwrap();

        let mut found: Vec<i64> = repo
            .get_many(&[b.id, a.id, 42])
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        found.sort();
        assert_eq!(found, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_count_referencing_themes() {
        let (pool, repo) = setup_test_repo().await;
        let a = repo.create(&category("A", &[])).await.unwrap();

        assert_eq!(repo.count_referencing_themes(a.id).await.unwrap(), 0);

        pool.execute("INSERT INTO themes (name) VALUES ('Travel'), ('Food')").await.unwrap();
        pool.execute(&format!(
            "INSERT INTO theme_categories (theme_id, category_id, position) VALUES (1, {0}, 0), (2, {0}, 0)",
            a.id
        ))
        .await
        .unwrap();

        assert_eq!(repo.count_referencing_themes(a.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_count_referencing_blocks() {
        let (pool, repo) = setup_test_repo().await;
        let a = repo.create(&category("A", &[])).await.unwrap();
        let b = repo.create(&category("B", &[])).await.unwrap();

        assert_eq!(repo.count_referencing_blocks(b.id).await.unwrap(), 0);

        for sql in [
            "INSERT INTO users (username, email, password_hash, role) VALUES ('ana', 'ana@example.com', 'h', 'CREATOR')".to_string(),
            "INSERT INTO themes (name) VALUES ('Travel')".to_string(),
            "INSERT INTO contents (title, description, image, creator_id, theme_id) VALUES ('Trip', 'd', 'i', 1, 1)".to_string(),
            format!(
                "INSERT INTO content_types (content_id, category_id, data, position) VALUES (1, {0}, 'x', 0), (1, {1}, 'y', 1), (1, {1}, 'z', 2)",
                a.id, b.id
            ),
        ] {
            pool.execute(&sql).await.unwrap();
        }

        assert_eq!(repo.count_referencing_blocks(a.id).await.unwrap(), 1);
        assert_eq!(repo.count_referencing_blocks(b.id).await.unwrap(), 2);
        // Blocks do not count as theme references
        assert_eq!(repo.count_referencing_themes(b.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_category() {
        let (_pool, repo) = setup_test_repo().await;
        let mut created = repo.create(&category("Photo", &["image"])).await.unwrap();

        created.name = "Pictures".to_string();
        created.allow_types = vec!["image".to_string(), "svg".to_string()];
        let updated = repo.update(&created).await.unwrap();

        assert_eq!(updated.name, "Pictures");
        assert_eq!(updated.allow_types, vec!["image", "svg"]);
    }

    #[tokio::test]
    async fn test_delete_category() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo.create(&category("Photo", &[])).await.unwrap();

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_categories_search_and_sort() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&category("Video", &[])).await.unwrap();
        repo.create(&category("Audio", &[])).await.unwrap();
        repo.create(&category("Photo", &[])).await.unwrap();

        let options = CATEGORY_LIST
            .resolve(&ListQuery {
                sort: Some("name".to_string()),
                order: Some("asc".to_string()),
                ..Default::default()
            })
            .unwrap();
        let names: Vec<String> = repo.list(&options).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Audio", "Photo", "Video"]);

        let options = CATEGORY_LIST
            .resolve(&ListQuery {
                search: Some("dio".to_string()),
                ..Default::default()
            })
            .unwrap();
        let found = repo.list(&options).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Audio");
    }
}
