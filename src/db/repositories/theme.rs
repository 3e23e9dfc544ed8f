//! Theme repository
//!
//! Themes and their ordered category lists. The list is stored in the
//! `theme_categories` junction table; a theme row and its junction rows are
//! always written in one transaction.

use super::{bind_filters_mysql, bind_filters_sqlite, build_list_query, placeholders};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListOptions, Theme};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ThemeRepository: Send + Sync {
    /// Create a theme with its category list
    async fn create(&self, theme: &Theme) -> Result<Theme>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Theme>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Theme>>;

    /// List themes matching `options`
    async fn list(&self, options: &ListOptions) -> Result<Vec<Theme>>;

    /// Replace name and category list of a theme
    async fn update(&self, theme: &Theme) -> Result<Theme>;

    /// Delete a theme and its category links, returning false when it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count content records that belong to theme `id`
    async fn count_referencing_contents(&self, id: i64) -> Result<i64>;
}

/// SQLx-based theme repository implementation
pub struct SqlxThemeRepository {
    pool: DynDatabasePool,
}

impl SqlxThemeRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ThemeRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ThemeRepository for SqlxThemeRepository {
    async fn create(&self, theme: &Theme) -> Result<Theme> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_theme_sqlite(self.pool.sqlite()?, theme).await,
            DatabaseDriver::Mysql => create_theme_mysql(self.pool.mysql()?, theme).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Theme>> {
        let mut themes = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_themes_sqlite(self.pool.sqlite()?, "id = ?", ThemeKey::Id(id)).await
            }
            DatabaseDriver::Mysql => {
                find_themes_mysql(self.pool.mysql()?, "id = ?", ThemeKey::Id(id)).await
            }
        }?;
        Ok(themes.pop())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Theme>> {
        let mut themes = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_themes_sqlite(self.pool.sqlite()?, "name = ?", ThemeKey::Name(name)).await
            }
            DatabaseDriver::Mysql => {
                find_themes_mysql(self.pool.mysql()?, "name = ?", ThemeKey::Name(name)).await
            }
        }?;
        Ok(themes.pop())
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<Theme>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_themes_sqlite(self.pool.sqlite()?, options).await,
            DatabaseDriver::Mysql => list_themes_mysql(self.pool.mysql()?, options).await,
        }
    }

    async fn update(&self, theme: &Theme) -> Result<Theme> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_theme_sqlite(self.pool.sqlite()?, theme).await,
            DatabaseDriver::Mysql => update_theme_mysql(self.pool.mysql()?, theme).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_theme_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_theme_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn count_referencing_contents(&self, id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM contents WHERE theme_id = ?";
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
        .context("Failed to count content referencing theme")?;

        Ok(count)
    }
}

#[derive(Clone, Copy)]
enum ThemeKey<'a> {
    Id(i64),
    Name(&'a str),
}

const THEME_COLUMNS: &str = "id, name, created_at, updated_at";
const INSERT_LINK: &str =
    "INSERT INTO theme_categories (theme_id, category_id, position) VALUES (?, ?, ?)";
const DELETE_LINKS: &str = "DELETE FROM theme_categories WHERE theme_id = ?";

/// Group `(theme_id, category_id)` rows, already in position order, by theme
fn group_links(links: Vec<(i64, i64)>) -> HashMap<i64, Vec<i64>> {
    let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
    for (theme_id, category_id) in links {
        grouped.entry(theme_id).or_default().push(category_id);
    }
    grouped
}

fn links_query(theme_count: usize) -> String {
    format!(
        "SELECT theme_id, category_id FROM theme_categories WHERE theme_id IN ({}) ORDER BY theme_id, position",
        placeholders(theme_count)
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_theme_sqlite(pool: &SqlitePool, theme: &Theme) -> Result<Theme> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query("INSERT INTO themes (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(&theme.name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create theme")?
        .last_insert_rowid();

    for (position, category_id) in theme.categories.iter().enumerate() {
        sqlx::query(INSERT_LINK)
            .bind(id)
            .bind(*category_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .context("Failed to link theme category")?;
    }

    tx.commit().await.context("Failed to commit theme creation")?;

    Ok(Theme {
        id,
        created_at: now,
        updated_at: now,
        ..theme.clone()
    })
}

async fn find_themes_sqlite(
    pool: &SqlitePool,
    condition: &str,
    key: ThemeKey<'_>,
) -> Result<Vec<Theme>> {
    let sql = format!("SELECT {} FROM themes WHERE {}", THEME_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        ThemeKey::Id(id) => query.bind(id),
        ThemeKey::Name(name) => query.bind(name),
    };
    let rows = query
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to get theme by {}", condition))?;

    attach_categories_sqlite(pool, rows).await
}

async fn list_themes_sqlite(pool: &SqlitePool, options: &ListOptions) -> Result<Vec<Theme>> {
    let select = format!("SELECT {} FROM themes", THEME_COLUMNS);
    let (sql, binds) = build_list_query(&select, options);

    let rows = bind_filters_sqlite(sqlx::query(&sql), &binds)
        .fetch_all(pool)
        .await
        .context("Failed to list themes")?;

    attach_categories_sqlite(pool, rows).await
}

async fn attach_categories_sqlite(
    pool: &SqlitePool,
    rows: Vec<sqlx::sqlite::SqliteRow>,
) -> Result<Vec<Theme>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.get("id")).collect();
    let sql = links_query(ids.len());
    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for id in &ids {
        query = query.bind(*id);
    }
    let mut links = group_links(
        query
            .fetch_all(pool)
            .await
            .context("Failed to load theme categories")?,
    );

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            Theme {
                id,
                name: row.get("name"),
                categories: links.remove(&id).unwrap_or_default(),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            }
        })
        .collect())
}

async fn update_theme_sqlite(pool: &SqlitePool, theme: &Theme) -> Result<Theme> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("UPDATE themes SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&theme.name)
        .bind(Utc::now())
        .bind(theme.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update theme")?;

    sqlx::query(DELETE_LINKS)
        .bind(theme.id)
        .execute(&mut *tx)
        .await
        .context("Failed to unlink theme categories")?;

    for (position, category_id) in theme.categories.iter().enumerate() {
        sqlx::query(INSERT_LINK)
            .bind(theme.id)
            .bind(*category_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .context("Failed to link theme category")?;
    }

    tx.commit().await.context("Failed to commit theme update")?;

    find_themes_sqlite(pool, "id = ?", ThemeKey::Id(theme.id))
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Theme not found after update"))
}

async fn delete_theme_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(DELETE_LINKS)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to unlink theme categories")?;

    let affected = sqlx::query("DELETE FROM themes WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete theme")?
        .rows_affected();

    tx.commit().await.context("Failed to commit theme deletion")?;
    Ok(affected > 0)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_theme_mysql(pool: &MySqlPool, theme: &Theme) -> Result<Theme> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let id = sqlx::query("INSERT INTO themes (name, created_at, updated_at) VALUES (?, ?, ?)")
        .bind(&theme.name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create theme")?
        .last_insert_id() as i64;

    for (position, category_id) in theme.categories.iter().enumerate() {
        sqlx::query(INSERT_LINK)
            .bind(id)
            .bind(*category_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .context("Failed to link theme category")?;
    }

    tx.commit().await.context("Failed to commit theme creation")?;

    Ok(Theme {
        id,
        created_at: now,
        updated_at: now,
        ..theme.clone()
    })
}

async fn find_themes_mysql(
    pool: &MySqlPool,
    condition: &str,
    key: ThemeKey<'_>,
) -> Result<Vec<Theme>> {
    let sql = format!("SELECT {} FROM themes WHERE {}", THEME_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        ThemeKey::Id(id) => query.bind(id),
        ThemeKey::Name(name) => query.bind(name),
    };
    let rows = query
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to get theme by {}", condition))?;

    attach_categories_mysql(pool, rows).await
}

async fn list_themes_mysql(pool: &MySqlPool, options: &ListOptions) -> Result<Vec<Theme>> {
    let select = format!("SELECT {} FROM themes", THEME_COLUMNS);
    let (sql, binds) = build_list_query(&select, options);

    let rows = bind_filters_mysql(sqlx::query(&sql), &binds)
        .fetch_all(pool)
        .await
        .context("Failed to list themes")?;

    attach_categories_mysql(pool, rows).await
}

async fn attach_categories_mysql(
    pool: &MySqlPool,
    rows: Vec<sqlx::mysql::MySqlRow>,
) -> Result<Vec<Theme>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|row| row.get("id")).collect();
    let sql = links_query(ids.len());
    let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
    for id in &ids {
        query = query.bind(*id);
    }
    let mut links = group_links(
        query
            .fetch_all(pool)
            .await
            .context("Failed to load theme categories")?,
    );

    Ok(rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            Theme {
                id,
                name: row.get("name"),
                categories: links.remove(&id).unwrap_or_default(),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            }
        })
        .collect())
}

async fn update_theme_mysql(pool: &MySqlPool, theme: &Theme) -> Result<Theme> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query("UPDATE themes SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&theme.name)
        .bind(Utc::now())
        .bind(theme.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update theme")?;

    sqlx::query(DELETE_LINKS)
        .bind(theme.id)
        .execute(&mut *tx)
        .await
        .context("Failed to unlink theme categories")?;

    for (position, category_id) in theme.categories.iter().enumerate() {
        sqlx::query(INSERT_LINK)
            .bind(theme.id)
            .bind(*category_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .context("Failed to link theme category")?;
    }

    tx.commit().await.context("Failed to commit theme update")?;

    find_themes_mysql(pool, "id = ?", ThemeKey::Id(theme.id))
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Theme not found after update"))
}

async fn delete_theme_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    sqlx::query(DELETE_LINKS)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to unlink theme categories")?;

    let affected = sqlx::query("DELETE FROM themes WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete theme")?
        .rows_affected();

    tx.commit().await.context("Failed to commit theme deletion")?;
    Ok(affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ListQuery, THEME_LIST};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxThemeRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO categories (name, allow_types) VALUES ('A', '[]'), ('B', '[]'), ('C', '[]')")
            .await
            .expect("Failed to seed categories");
        let repo = SqlxThemeRepository::new(pool.clone());
        (pool, repo)
    }

    async fn theme_rows(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM themes")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_theme_keeps_category_order() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&Theme::new("Travel".to_string(), vec![3, 1])).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("Theme not found");
        assert_eq!(found.name, "Travel");
        assert_eq!(found.categories, vec![3, 1]);

        let by_name = repo.get_by_name("Travel").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn test_create_with_unknown_category_writes_nothing() {
        let (pool, repo) = setup_test_repo().await;

        let result = repo.create(&Theme::new("Travel".to_string(), vec![1, 99])).await;

        assert!(result.is_err());
        assert_eq!(theme_rows(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_update_theme_replaces_categories() {
        let (_pool, repo) = setup_test_repo().await;
        let mut theme = repo.create(&Theme::new("Travel".to_string(), vec![1, 2])).await.unwrap();

        theme.name = "Trips".to_string();
        theme.categories = vec![2, 3];
        let updated = repo.update(&theme).await.unwrap();

        assert_eq!(updated.name, "Trips");
        assert_eq!(updated.categories, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_state() {
        let (_pool, repo) = setup_test_repo().await;
        let mut theme = repo.create(&Theme::new("Travel".to_string(), vec![1, 2])).await.unwrap();

        theme.name = "Trips".to_string();
        theme.categories = vec![3, 77];
        assert!(repo.update(&theme).await.is_err());

        let unchanged = repo.get_by_id(theme.id).await.unwrap().unwrap();
        assert_eq!(unchanged.name, "Travel");
        assert_eq!(unchanged.categories, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_delete_theme_and_count_contents() {
        let (pool, repo) = setup_test_repo().await;
        let theme = repo.create(&Theme::new("Travel".to_string(), vec![1])).await.unwrap();

        assert_eq!(repo.count_referencing_contents(theme.id).await.unwrap(), 0);

        pool.execute("INSERT INTO users (username, email, password_hash) VALUES ('u', 'u@example.com', 'h')")
            .await
            .unwrap();
        pool.execute(&format!(
            "INSERT INTO contents (title, description, image, creator_id, theme_id) VALUES ('t', 'd', 'i', 1, {})",
            theme.id
        ))
        .await
        .unwrap();
        assert_eq!(repo.count_referencing_contents(theme.id).await.unwrap(), 1);

        pool.execute("DELETE FROM contents").await.unwrap();
        assert!(repo.delete(theme.id).await.unwrap());
        assert!(repo.get_by_id(theme.id).await.unwrap().is_none());
        assert!(!repo.delete(theme.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_themes_with_categories() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&Theme::new("Travel".to_string(), vec![1, 2])).await.unwrap();
        repo.create(&Theme::new("Food".to_string(), vec![3])).await.unwrap();

        let options = THEME_LIST
            .resolve(&ListQuery {
                sort: Some("name".to_string()),
                order: Some("asc".to_string()),
                ..Default::default()
            })
            .unwrap();
        let themes = repo.list(&options).await.unwrap();

        assert_eq!(themes.len(), 2);
        assert_eq!(themes[0].name, "Food");
        assert_eq!(themes[0].categories, vec![3]);
        assert_eq!(themes[1].categories, vec![1, 2]);
    }
}
