//! Session repository
//!
//! Login sessions are opaque tokens tied to an account. A session only
//! counts while it is unexpired and its holder is not banned, and sessions
//! can only be opened for active accounts, so a ban racing a login cannot
//! leave a usable token behind.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{Session, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

const OPEN_SESSION: &str = r#"
    INSERT INTO sessions (id, user_id, expires_at, created_at)
    SELECT ?, id, ?, ? FROM users WHERE id = ? AND status = ?
"#;

const FIND_ACTIVE: &str = r#"
    SELECT s.id, s.user_id, s.expires_at, s.created_at
    FROM sessions s
    JOIN users u ON u.id = s.user_id
    WHERE s.id = ? AND s.expires_at > ? AND u.status = ?
"#;

/// Run a DELETE with one bind on either driver, yielding the row count
macro_rules! delete_where {
    ($pool:expr, $sql:expr, $arg:expr) => {
        match $pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query($sql)
                .bind($arg)
                .execute(sqlite_pool(&$pool)?)
                .await
                .map(|done| done.rows_affected() as i64),
            DatabaseDriver::Mysql => sqlx::query($sql)
                .bind($arg)
                .execute(mysql_pool(&$pool)?)
                .await
                .map(|done| done.rows_affected() as i64),
        }
    };
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store `session` if its holder is an active account. Returns false
    /// when the account is banned or gone.
    async fn open(&self, session: &Session) -> Result<bool>;

    /// The session behind `token`, if it is unexpired at `now` and its
    /// holder is still active
    async fn find_active(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>>;

    /// Sign out one token
    async fn revoke(&self, token: &str) -> Result<()>;

    /// Sign an account out everywhere. Returns how many sessions ended.
    async fn revoke_all(&self, user_id: i64) -> Result<i64>;

    /// Delete sessions that expired before `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<i64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn open(&self, session: &Session) -> Result<bool> {
        let active = UserStatus::Active.to_string();
        let inserted = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(OPEN_SESSION)
                .bind(&session.id)
                .bind(session.expires_at)
                .bind(session.created_at)
                .bind(session.user_id)
                .bind(&active)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to open session")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(OPEN_SESSION)
                .bind(&session.id)
                .bind(session.expires_at)
                .bind(session.created_at)
                .bind(session.user_id)
                .bind(&active)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to open session")?
                .rows_affected(),
        };
        Ok(inserted == 1)
    }

    async fn find_active(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Session>> {
        let active = UserStatus::Active.to_string();
        let session = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(FIND_ACTIVE)
                .bind(token)
                .bind(now)
                .bind(&active)
                .fetch_optional(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to look up session")?
                .map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
            DatabaseDriver::Mysql => sqlx::query(FIND_ACTIVE)
                .bind(token)
                .bind(now)
                .bind(&active)
                .fetch_optional(mysql_pool(&self.pool)?)
                .await
                .context("Failed to look up session")?
                .map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }),
        };
        Ok(session)
    }

    async fn revoke(&self, token: &str) -> Result<()> {
        delete_where!(self.pool, "DELETE FROM sessions WHERE id = ?", token)
            .context("Failed to revoke session")?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: i64) -> Result<i64> {
        delete_where!(self.pool, "DELETE FROM sessions WHERE user_id = ?", user_id)
            .context("Failed to revoke sessions")
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<i64> {
        delete_where!(self.pool, "DELETE FROM sessions WHERE expires_at <= ?", now)
            .context("Failed to purge expired sessions")
    }
}
