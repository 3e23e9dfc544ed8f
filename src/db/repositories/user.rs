//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Deleting a user removes everything the user owns (content blocks,
//! content records, sessions) in one transaction.

use super::{bind_filters_mysql, bind_filters_sqlite, build_list_query};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListOptions, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user whose username or email equals `login`
    async fn get_by_login(&self, login: &str) -> Result<Option<User>>;

    /// Update email, password hash and role of a user
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user together with their content, content blocks and sessions.
    ///
    /// Returns false when no user row was deleted.
    async fn delete_cascade(&self, id: i64) -> Result<bool>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// List users matching `options`
    async fn list(&self, options: &ListOptions) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_user_sqlite(self.pool.sqlite()?, "id = ?", UserKey::Id(id)).await
            }
            DatabaseDriver::Mysql => {
                find_user_mysql(self.pool.mysql()?, "id = ?", UserKey::Id(id)).await
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_user_sqlite(self.pool.sqlite()?, "username = ?", UserKey::Text(username)).await
            }
            DatabaseDriver::Mysql => {
                find_user_mysql(self.pool.mysql()?, "username = ?", UserKey::Text(username)).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_user_sqlite(self.pool.sqlite()?, "email = ?", UserKey::Text(email)).await
            }
            DatabaseDriver::Mysql => {
                find_user_mysql(self.pool.mysql()?, "email = ?", UserKey::Text(email)).await
            }
        }
    }

    async fn get_by_login(&self, login: &str) -> Result<Option<User>> {
        // Usernames are tried first so an email-shaped username cannot shadow another account
        if let Some(user) = self.get_by_username(login).await? {
            return Ok(Some(user));
        }
        self.get_by_email(login).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => update_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn delete_cascade(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_user_cascade_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => delete_user_cascade_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_users_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => count_users_mysql(self.pool.mysql()?).await,
        }
    }

    async fn list(&self, options: &ListOptions) -> Result<Vec<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_users_sqlite(self.pool.sqlite()?, options).await,
            DatabaseDriver::Mysql => list_users_mysql(self.pool.mysql()?, options).await,
        }
    }
}

/// Lookup key for single-user queries
#[derive(Clone, Copy)]
enum UserKey<'a> {
    Id(i64),
    Text(&'a str),
}

fn parse_role(raw: &str) -> Result<UserRole> {
    UserRole::from_str(raw).with_context(|| format!("Invalid role in database: {}", raw))
}

// Cascade order: blocks of the user's content, the content, sessions, the user
const CASCADE_STATEMENTS: [(&str, &str); 4] = [
    (
        "DELETE FROM content_types WHERE content_id IN (SELECT id FROM contents WHERE creator_id = ?)",
        "Failed to delete content blocks of user",
    ),
    (
        "DELETE FROM contents WHERE creator_id = ?",
        "Failed to delete content of user",
    ),
    (
        "DELETE FROM sessions WHERE user_id = ?",
        "Failed to delete sessions of user",
    ),
    ("DELETE FROM users WHERE id = ?", "Failed to delete user"),
];

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn find_user_sqlite(
    pool: &SqlitePool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", condition))?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, role = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    find_user_sqlite(pool, "id = ?", UserKey::Id(user.id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn delete_user_cascade_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let mut deleted = 0;
    for (statement, error) in CASCADE_STATEMENTS {
        deleted = sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context(error)?
            .rows_affected();
    }

    tx.commit().await.context("Failed to commit user deletion")?;
    Ok(deleted > 0)
}

async fn count_users_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_users_sqlite(pool: &SqlitePool, options: &ListOptions) -> Result<Vec<User>> {
    let select = format!("SELECT {} FROM users", USER_COLUMNS);
    let (sql, binds) = build_list_query(&select, options);

    let rows = bind_filters_sqlite(sqlx::query(&sql), &binds)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.get("role");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: parse_role(&role)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn find_user_mysql(
    pool: &MySqlPool,
    condition: &str,
    key: UserKey<'_>,
) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Text(text) => query.bind(text),
    };

    let row = query
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", condition))?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, role = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    find_user_mysql(pool, "id = ?", UserKey::Id(user.id))
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn delete_user_cascade_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let mut deleted = 0;
    for (statement, error) in CASCADE_STATEMENTS {
        deleted = sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context(error)?
            .rows_affected();
    }

    tx.commit().await.context("Failed to commit user deletion")?;
    Ok(deleted > 0)
}

async fn count_users_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")?;

    Ok(row.get("count"))
}

async fn list_users_mysql(pool: &MySqlPool, options: &ListOptions) -> Result<Vec<User>> {
    let select = format!("SELECT {} FROM users", USER_COLUMNS);
    let (sql, binds) = build_list_query(&select, options);

    let rows = bind_filters_mysql(sqlx::query(&sql), &binds)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role: String = row.get("role");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: parse_role(&role)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
