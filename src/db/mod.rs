//! Database layer
//!
//! Storage for users, sessions, properties, bookings and reviews. Supports:
//! - SQLite (default, single-binary deployment)
//! - MySQL (larger deployments)
//!
//! The driver is selected by configuration; repositories dispatch on
//! `DatabasePool::driver()` and use the matching concrete pool.
//!
//! # Usage
//!
//! ```ignore
//! use bharattrips::config::DatabaseConfig;
//! use bharattrips::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, mysql_pool, sqlite_pool, DatabasePool, DynDatabasePool,
    MysqlDatabase, SqliteDatabase,
};

/// Whether `err` was caused by a UNIQUE constraint rejecting a write
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}
