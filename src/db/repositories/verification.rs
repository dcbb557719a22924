//! Email verification code repository
//!
//! At most one live code is kept per address: saving a new code replaces
//! any earlier one.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::EmailVerification;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait VerificationRepository: Send + Sync {
    /// Store a code for `email`, replacing previous codes
    async fn save(&self, email: &str, code: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Most recent code for `email`, expired or not
    async fn get_latest(&self, email: &str) -> Result<Option<EmailVerification>>;

    /// Remove all codes for `email`
    async fn delete_for_email(&self, email: &str) -> Result<()>;

    /// Purge expired codes, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

pub struct SqlxVerificationRepository {
    pool: DynDatabasePool,
}

impl SqlxVerificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VerificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VerificationRepository for SqlxVerificationRepository {
    async fn save(&self, email: &str, code: &str, expires_at: DateTime<Utc>) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                let mut tx = pool.begin().await?;
                sqlx::query("DELETE FROM email_verifications WHERE email = ?")
                    .bind(email)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear old verification codes")?;
                sqlx::query(
                    "INSERT INTO email_verifications (email, code, expires_at, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(email)
                .bind(code)
                .bind(expires_at)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .context("Failed to save verification code")?;
                tx.commit().await?;
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                let mut tx = pool.begin().await?;
                sqlx::query("DELETE FROM email_verifications WHERE email = ?")
                    .bind(email)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to clear old verification codes")?;
                sqlx::query(
                    "INSERT INTO email_verifications (email, code, expires_at, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(email)
                .bind(code)
                .bind(expires_at)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .context("Failed to save verification code")?;
                tx.commit().await?;
            }
        }
        Ok(())
    }

    async fn get_latest(&self, email: &str) -> Result<Option<EmailVerification>> {
        let sql = r#"
            SELECT id, email, code, expires_at, created_at
            FROM email_verifications
            WHERE email = ?
            ORDER BY id DESC
            LIMIT 1
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(email)
                    .fetch_optional(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to get verification code")?;
                Ok(row.map(|row| EmailVerification {
                    id: row.get("id"),
                    email: row.get("email"),
                    code: row.get("code"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(email)
                    .fetch_optional(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to get verification code")?;
                Ok(row.map(|row| EmailVerification {
                    id: row.get("id"),
                    email: row.get("email"),
                    code: row.get("code"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
        }
    }

    async fn delete_for_email(&self, email: &str) -> Result<()> {
        let sql = "DELETE FROM email_verifications WHERE email = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql).bind(email).execute(sqlite_pool(&self.pool)?).await
                    .context("Failed to delete verification codes")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql).bind(email).execute(mysql_pool(&self.pool)?).await
                    .context("Failed to delete verification codes")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let sql = "DELETE FROM email_verifications WHERE expires_at < ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_expired_sqlite(sqlite_pool(&self.pool)?, sql, now).await?,
            DatabaseDriver::Mysql => delete_expired_mysql(mysql_pool(&self.pool)?, sql, now).await?,
        };
        Ok(affected as i64)
    }
}

async fn delete_expired_sqlite(pool: &SqlitePool, sql: &str, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(sql)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired verification codes")?;
    Ok(result.rows_affected())
}

async fn delete_expired_mysql(pool: &MySqlPool, sql: &str, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(sql)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to delete expired verification codes")?;
    Ok(result.rows_affected())
}
