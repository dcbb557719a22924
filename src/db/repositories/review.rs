//! Review repository
//!
//! Reviews and per-user likes. A like row and the counter bump are written in
//! one transaction so `reviews.likes` always equals the number of likers.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{ListParams, RatingSummary, Review, ReviewWithAuthor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const REVIEW_COLUMNS: &str = "r.id, r.property_id, r.user_id, r.rating, r.comment, r.likes, r.created_at";

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn create(&self, review: &Review) -> Result<Review>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Review>>;

    /// The review `user_id` left on `property_id`, if any
    async fn find_by_user(&self, property_id: i64, user_id: i64) -> Result<Option<Review>>;

    /// Reviews for a property, newest first
    async fn list_by_property(&self, property_id: i64, params: &ListParams) -> Result<(Vec<ReviewWithAuthor>, i64)>;

    async fn rating_summary(&self, property_id: i64) -> Result<RatingSummary>;

    /// Record a like. Returns false if `user_id` already liked the review.
    async fn like(&self, review_id: i64, user_id: i64) -> Result<bool>;
}

pub struct SqlxReviewRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! row_to_review {
    ($row:expr) => {
        Review {
            id: $row.get("id"),
            property_id: $row.get("property_id"),
            user_id: $row.get("user_id"),
            rating: $row.get("rating"),
            comment: $row.get("comment"),
            likes: $row.get("likes"),
            created_at: $row.get("created_at"),
        }
    };
}

macro_rules! row_to_review_with_author {
    ($row:expr) => {
        ReviewWithAuthor {
            review: row_to_review!($row),
            author_name: $row.get("author_name"),
        }
    };
}

const INSERT_REVIEW: &str =
    "INSERT INTO reviews (property_id, user_id, rating, comment, likes, created_at) VALUES (?, ?, ?, ?, 0, ?)";

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create(&self, review: &Review) -> Result<Review> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_REVIEW)
                .bind(review.property_id)
                .bind(review.user_id)
                .bind(review.rating)
                .bind(&review.comment)
                .bind(now)
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to create review")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_REVIEW)
                .bind(review.property_id)
                .bind(review.user_id)
                .bind(review.rating)
                .bind(&review.comment)
                .bind(now)
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to create review")?
                .last_insert_id() as i64,
        };

        Ok(Review {
            id,
            likes: 0,
            created_at: now,
            ..review.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Review>> {
        let sql = format!("SELECT {} FROM reviews r WHERE r.id = ?", REVIEW_COLUMNS);
        let review = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to get review")?
                .map(|row| row_to_review!(row)),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(mysql_pool(&self.pool)?)
                .await
                .context("Failed to get review")?
                .map(|row| row_to_review!(row)),
        };
        Ok(review)
    }

    async fn find_by_user(&self, property_id: i64, user_id: i64) -> Result<Option<Review>> {
        let sql = format!(
            "SELECT {} FROM reviews r WHERE r.property_id = ? AND r.user_id = ?",
            REVIEW_COLUMNS
        );
        let review = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(property_id)
                .bind(user_id)
                .fetch_optional(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to find review")?
                .map(|row| row_to_review!(row)),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(property_id)
                .bind(user_id)
                .fetch_optional(mysql_pool(&self.pool)?)
                .await
                .context("Failed to find review")?
                .map(|row| row_to_review!(row)),
        };
        Ok(review)
    }

    async fn list_by_property(&self, property_id: i64, params: &ListParams) -> Result<(Vec<ReviewWithAuthor>, i64)> {
        let sql = format!(
            r#"
            SELECT {}, COALESCE(NULLIF(u.full_name, ''), 'Guest') AS author_name
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.property_id = ?
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT ? OFFSET ?
            "#,
            REVIEW_COLUMNS
        );
        let count_sql = "SELECT COUNT(*) AS count FROM reviews WHERE property_id = ?";

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                let reviews = sqlx::query(&sql)
                    .bind(property_id)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list reviews")?
                    .iter()
                    .map(|row| row_to_review_with_author!(row))
                    .collect();
                let total: i64 = sqlx::query(count_sql)
                    .bind(property_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count reviews")?
                    .get("count");
                Ok((reviews, total))
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                let reviews = sqlx::query(&sql)
                    .bind(property_id)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list reviews")?
                    .iter()
                    .map(|row| row_to_review_with_author!(row))
                    .collect();
                let total: i64 = sqlx::query(count_sql)
                    .bind(property_id)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count reviews")?
                    .get("count");
                Ok((reviews, total))
            }
        }
    }

    async fn rating_summary(&self, property_id: i64) -> Result<RatingSummary> {
        let (sum, count): (i64, i64) = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(
                    "SELECT COALESCE(SUM(rating), 0) AS total, COUNT(*) AS count FROM reviews WHERE property_id = ?",
                )
                .bind(property_id)
                .fetch_one(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to summarize ratings")?;
                (row.get("total"), row.get("count"))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(
                    "SELECT CAST(COALESCE(SUM(rating), 0) AS SIGNED) AS total, COUNT(*) AS count FROM reviews WHERE property_id = ?",
                )
                .bind(property_id)
                .fetch_one(mysql_pool(&self.pool)?)
                .await
                .context("Failed to summarize ratings")?;
                (row.get("total"), row.get("count"))
            }
        };
        Ok(RatingSummary::from_totals(sum, count))
    }

    async fn like(&self, review_id: i64, user_id: i64) -> Result<bool> {
        let now = Utc::now();
        let bump = "UPDATE reviews SET likes = likes + 1 WHERE id = ?";

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = sqlite_pool(&self.pool)?.begin().await?;
                let inserted = sqlx::query(
                    "INSERT OR IGNORE INTO review_likes (review_id, user_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(review_id)
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .context("Failed to record like")?
                .rows_affected();
                if inserted == 1 {
                    sqlx::query(bump)
                        .bind(review_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to increment likes")?;
                }
                tx.commit().await?;
                Ok(inserted == 1)
            }
            DatabaseDriver::Mysql => {
                let mut tx = mysql_pool(&self.pool)?.begin().await?;
                let inserted = sqlx::query(
                    "INSERT IGNORE INTO review_likes (review_id, user_id, created_at) VALUES (?, ?, ?)",
                )
                .bind(review_id)
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .context("Failed to record like")?
                .rows_affected();
                if inserted == 1 {
                    sqlx::query(bump)
                        .bind(review_id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to increment likes")?;
                }
                tx.commit().await?;
                Ok(inserted == 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (DynDatabasePool, SqlxReviewRepository, i64, Vec<i64>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();

        let mut users = Vec::new();
        for i in 0..3 {
            let id = sqlx::query("INSERT INTO users (email, password_hash, full_name) VALUES (?, 'h', ?)")
                .bind(format!("u{}@example.com", i))
                .bind(if i == 0 { "Priya" } else { "" })
                .execute(sqlite)
                .await
                .unwrap()
                .last_insert_rowid();
            users.push(id);
        }
        let property_id = sqlx::query("INSERT INTO properties (host_id, status) VALUES (?, 'listed')")
            .bind(users[0])
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();

        (pool.clone(), SqlxReviewRepository::new(pool), property_id, users)
    }

    fn review(property_id: i64, user_id: i64, rating: i64) -> Review {
        Review {
            id: 0,
            property_id,
            user_id,
            rating,
            comment: "Clean rooms, friendly staff".to_string(),
            likes: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_review_per_user_per_property() {
        let (_pool, repo, property_id, users) = setup().await;

        repo.create(&review(property_id, users[1], 4)).await.unwrap();
        assert!(repo.create(&review(property_id, users[1], 5)).await.is_err());
        assert!(repo.find_by_user(property_id, users[1]).await.unwrap().is_some());
        assert!(repo.find_by_user(property_id, users[2]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_summary() {
        let (_pool, repo, property_id, users) = setup().await;
        repo.create(&review(property_id, users[0], 5)).await.unwrap();
        repo.create(&review(property_id, users[1], 4)).await.unwrap();
        repo.create(&review(property_id, users[2], 4)).await.unwrap();

        let (reviews, total) = repo.list_by_property(property_id, &ListParams::default()).await.unwrap();
        assert_eq!(total, 3);
        let names: Vec<_> = reviews.iter().map(|r| r.author_name.as_str()).collect();
        assert!(names.contains(&"Priya"));
        assert!(names.contains(&"Guest"));

        let summary = repo.rating_summary(property_id).await.unwrap();
        assert_eq!(summary.count, 3);
        assert!((summary.average - 4.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_likes_are_idempotent_per_user() {
        let (_pool, repo, property_id, users) = setup().await;
        let created = repo.create(&review(property_id, users[0], 5)).await.unwrap();

        assert!(repo.like(created.id, users[1]).await.unwrap());
        assert!(!repo.like(created.id, users[1]).await.unwrap());
        assert!(repo.like(created.id, users[2]).await.unwrap());

        let loaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.likes, 2);
    }
}
