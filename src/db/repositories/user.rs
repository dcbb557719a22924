//! User repository
//!
//! Database operations for accounts.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{ListParams, User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, email, password_hash, full_name, phone, role, status, email_verified, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (expects the lowercase form)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable field of `user`
    async fn update(&self, user: &User) -> Result<User>;

    /// Count all users
    async fn count(&self) -> Result<i64>;

    /// Count users with the given role
    async fn count_by_role(&self, role: UserRole) -> Result<i64>;

    /// List users with the given role, newest first
    async fn list_by_role(&self, role: UserRole, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite_pool(&self.pool)?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql_pool(&self.pool)?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_email_sqlite(sqlite_pool(&self.pool)?, email).await,
            DatabaseDriver::Mysql => get_user_by_email_mysql(mysql_pool(&self.pool)?, email).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_user_sqlite(sqlite_pool(&self.pool)?, user).await,
            DatabaseDriver::Mysql => update_user_mysql(mysql_pool(&self.pool)?, user).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM users";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_sqlite(sqlite_pool(&self.pool)?, sql, None).await,
            DatabaseDriver::Mysql => count_mysql(mysql_pool(&self.pool)?, sql, None).await,
        }
    }

    async fn count_by_role(&self, role: UserRole) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM users WHERE role = ?";
        let role = role.to_string();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_sqlite(sqlite_pool(&self.pool)?, sql, Some(&role)).await,
            DatabaseDriver::Mysql => count_mysql(mysql_pool(&self.pool)?, sql, Some(&role)).await,
        }
    }

    async fn list_by_role(&self, role: UserRole, params: &ListParams) -> Result<(Vec<User>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_users_by_role_sqlite(sqlite_pool(&self.pool)?, role, params).await
            }
            DatabaseDriver::Mysql => {
                list_users_by_role_mysql(mysql_pool(&self.pool)?, role, params).await
            }
        }
    }
}

fn parse_role_and_status(role: &str, status: &str) -> Result<(UserRole, UserStatus)> {
    let role = UserRole::from_str(role)
        .with_context(|| format!("Invalid role in database: {}", role))?;
    let status = UserStatus::from_str(status)
        .with_context(|| format!("Invalid status in database: {}", status))?;
    Ok((role, status))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, full_name, phone, role, status, email_verified, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.phone)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(user.email_verified)
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

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, full_name = ?, phone = ?, role = ?, status = ?,
            email_verified = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.phone)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(user.email_verified)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn count_sqlite(pool: &SqlitePool, sql: &str, arg: Option<&str>) -> Result<i64> {
    let mut query = sqlx::query(sql);
    if let Some(arg) = arg {
        query = query.bind(arg);
    }
    let row = query.fetch_one(pool).await.context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn list_users_by_role_sqlite(
    pool: &SqlitePool,
    role: UserRole,
    params: &ListParams,
) -> Result<(Vec<User>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE role = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(role.to_string())
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    let users = rows.iter().map(row_to_user_sqlite).collect::<Result<Vec<_>>>()?;
    let total = count_sqlite(
        pool,
        "SELECT COUNT(*) AS count FROM users WHERE role = ?",
        Some(&role.to_string()),
    )
    .await?;

    Ok((users, total))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let (role, status) = parse_role_and_status(row.get("role"), row.get("status"))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        phone: row.get("phone"),
        role,
        status,
        email_verified: row.get("email_verified"),
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
        INSERT INTO users (email, password_hash, full_name, phone, role, status, email_verified, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.phone)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(user.email_verified)
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

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, full_name = ?, phone = ?, role = ?, status = ?,
            email_verified = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(&user.phone)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(user.email_verified)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn count_mysql(pool: &MySqlPool, sql: &str, arg: Option<&str>) -> Result<i64> {
    let mut query = sqlx::query(sql);
    if let Some(arg) = arg {
        query = query.bind(arg);
    }
    let row = query.fetch_one(pool).await.context("Failed to count users")?;
    Ok(row.get("count"))
}

async fn list_users_by_role_mysql(
    pool: &MySqlPool,
    role: UserRole,
    params: &ListParams,
) -> Result<(Vec<User>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users WHERE role = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        USER_COLUMNS
    ))
    .bind(role.to_string())
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    let users = rows.iter().map(row_to_user_mysql).collect::<Result<Vec<_>>>()?;
    let total = count_mysql(
        pool,
        "SELECT COUNT(*) AS count FROM users WHERE role = ?",
        Some(&role.to_string()),
    )
    .await?;

    Ok((users, total))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let (role, status) = parse_role_and_status(row.get("role"), row.get("status"))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        phone: row.get("phone"),
        role,
        status,
        email_verified: row.get("email_verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn new_user(email: &str, role: UserRole) -> User {
        User::new(email.to_string(), "argon2-hash".to_string(), role)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&new_user("asha@example.com", UserRole::Guest))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(by_id.email, "asha@example.com");
        assert_eq!(by_id.password_hash, "argon2-hash");
        assert_eq!(by_id.role, UserRole::Guest);

        let by_email = repo.get_by_email("asha@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_email_constraint() {
        let repo = setup_test_repo().await;

        repo.create(&new_user("dup@example.com", UserRole::Guest)).await.unwrap();
        let result = repo.create(&new_user("dup@example.com", UserRole::Host)).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&new_user("ravi@example.com", UserRole::Guest)).await.unwrap();

        user.role = UserRole::Host;
        user.full_name = Some("Ravi Kumar".to_string());
        user.email_verified = true;
        user.status = UserStatus::Banned;
        let updated = repo.update(&user).await.expect("Failed to update user");

        assert_eq!(updated.role, UserRole::Host);
        assert_eq!(updated.full_name.as_deref(), Some("Ravi Kumar"));
        assert!(updated.email_verified);
        assert!(updated.is_banned());
    }

    #[tokio::test]
    async fn test_count_and_list_by_role() {
        let repo = setup_test_repo().await;
        for i in 0..3 {
            repo.create(&new_user(&format!("guest{}@example.com", i), UserRole::Guest))
                .await
                .unwrap();
        }
        repo.create(&new_user("host@example.com", UserRole::Host)).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 4);
        assert_eq!(repo.count_by_role(UserRole::Guest).await.unwrap(), 3);

        let (page, total) = repo
            .list_by_role(UserRole::Guest, &ListParams::new(1, 2))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|u| u.role == UserRole::Guest));

        let (page, _) = repo
            .list_by_role(UserRole::Guest, &ListParams::new(2, 2))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }
}
