//! Database layer
//!
//! This module provides the entity store for Atelier.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! The database layer uses a trait-based abstraction (`DatabasePool`) that
//! allows repositories to work with either SQLite or MySQL. Each repository
//! dispatches on `DatabasePool::driver()` and runs the backend-specific query.
//!
//! # Usage
//!
//! ```ignore
//! use atelier::config::DatabaseConfig;
//! use atelier::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
