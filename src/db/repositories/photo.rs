//! Property photo repository

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::PropertyPhoto;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Append a photo after the property's existing ones, unless the
    /// property already has `limit` photos (then `None`)
    async fn create(
        &self,
        property_id: i64,
        filename: &str,
        url: &str,
        limit: i64,
    ) -> Result<Option<PropertyPhoto>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PropertyPhoto>>;

    /// Photos in display order
    async fn list_by_property(&self, property_id: i64) -> Result<Vec<PropertyPhoto>>;

    async fn count_by_property(&self, property_id: i64) -> Result<i64>;

    async fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqlxPhotoRepository {
    pool: DynDatabasePool,
}

impl SqlxPhotoRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PhotoRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! row_to_photo {
    ($row:expr) => {
        PropertyPhoto {
            id: $row.get("id"),
            property_id: $row.get("property_id"),
            filename: $row.get("filename"),
            url: $row.get("url"),
            sort_order: $row.get("sort_order"),
            created_at: $row.get("created_at"),
        }
    };
}

// MAX over BIGINT plus one stays BIGINT in MySQL
const PHOTO_SLOTS: &str = "SELECT COUNT(*) AS count, COALESCE(MAX(sort_order), -1) + 1 AS next FROM property_photos WHERE property_id = ?";
const INSERT_PHOTO: &str = "INSERT INTO property_photos (property_id, filename, url, sort_order, created_at) VALUES (?, ?, ?, ?, ?)";
const SELECT_PHOTO: &str =
    "SELECT id, property_id, filename, url, sort_order, created_at FROM property_photos";

#[async_trait]
impl PhotoRepository for SqlxPhotoRepository {
    async fn create(
        &self,
        property_id: i64,
        filename: &str,
        url: &str,
        limit: i64,
    ) -> Result<Option<PropertyPhoto>> {
        let now = Utc::now();
        let inserted = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = sqlite_pool(&self.pool)?.begin().await?;
                let row = sqlx::query(PHOTO_SLOTS)
                    .bind(property_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to count photos")?;
                let (count, sort_order): (i64, i64) = (row.get("count"), row.get("next"));
                if count >= limit {
                    tx.rollback().await?;
                    None
                } else {
                    let result = sqlx::query(INSERT_PHOTO)
                        .bind(property_id)
                        .bind(filename)
                        .bind(url)
                        .bind(sort_order)
                        .bind(now)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to create photo")?;
                    tx.commit().await?;
                    Some((result.last_insert_rowid(), sort_order))
                }
            }
            DatabaseDriver::Mysql => {
                let mut tx = mysql_pool(&self.pool)?.begin().await?;
                // Concurrent uploads to one listing queue on its row
                sqlx::query("SELECT id FROM properties WHERE id = ? FOR UPDATE")
                    .bind(property_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to lock property")?;
                let row = sqlx::query(PHOTO_SLOTS)
                    .bind(property_id)
                    .fetch_one(&mut *tx)
                    .await
                    .context("Failed to count photos")?;
                let (count, sort_order): (i64, i64) = (row.get("count"), row.get("next"));
                if count >= limit {
                    tx.rollback().await?;
                    None
                } else {
                    let result = sqlx::query(INSERT_PHOTO)
                        .bind(property_id)
                        .bind(filename)
                        .bind(url)
                        .bind(sort_order)
                        .bind(now)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to create photo")?;
                    tx.commit().await?;
                    Some((result.last_insert_id() as i64, sort_order))
                }
            }
        };

        Ok(inserted.map(|(id, sort_order)| PropertyPhoto {
            id,
            property_id,
            filename: filename.to_string(),
            url: url.to_string(),
            sort_order,
            created_at: now,
        }))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PropertyPhoto>> {
        let sql = format!("{} WHERE id = ?", SELECT_PHOTO);
        let photo = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to get photo")?
                .map(|row| row_to_photo!(row)),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(mysql_pool(&self.pool)?)
                .await
                .context("Failed to get photo")?
                .map(|row| row_to_photo!(row)),
        };
        Ok(photo)
    }

    async fn list_by_property(&self, property_id: i64) -> Result<Vec<PropertyPhoto>> {
        let sql = format!("{} WHERE property_id = ? ORDER BY sort_order, id", SELECT_PHOTO);
        let photos = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(property_id)
                .fetch_all(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to list photos")?
                .iter()
                .map(|row| row_to_photo!(row))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(property_id)
                .fetch_all(mysql_pool(&self.pool)?)
                .await
                .context("Failed to list photos")?
                .iter()
                .map(|row| row_to_photo!(row))
                .collect(),
        };
        Ok(photos)
    }

    async fn count_by_property(&self, property_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM property_photos WHERE property_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(property_id)
                .fetch_one(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to count photos")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(property_id)
                .fetch_one(mysql_pool(&self.pool)?)
                .await
                .context("Failed to count photos")?
                .get("count"),
        };
        Ok(count)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM property_photos WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql).bind(id).execute(sqlite_pool(&self.pool)?).await
                    .context("Failed to delete photo")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql).bind(id).execute(mysql_pool(&self.pool)?).await
                    .context("Failed to delete photo")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (SqlxPhotoRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();
        let host_id = sqlx::query("INSERT INTO users (email, password_hash, role) VALUES ('h@example.com', 'h', 'host')")
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();
        let property_id = sqlx::query("INSERT INTO properties (host_id) VALUES (?)")
            .bind(host_id)
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();
        (SqlxPhotoRepository::new(pool.clone()), property_id)
    }

    #[tokio::test]
    async fn test_photos_keep_upload_order() {
        let (repo, property_id) = setup().await;

        let first = repo.create(property_id, "a.jpg", "/uploads/a.jpg", 10).await.unwrap().unwrap();
        let second = repo.create(property_id, "b.jpg", "/uploads/b.jpg", 10).await.unwrap().unwrap();
        assert_eq!(first.sort_order, 0);
        assert_eq!(second.sort_order, 1);

        let photos = repo.list_by_property(property_id).await.unwrap();
        let names: Vec<_> = photos.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
        assert_eq!(repo.count_by_property(property_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_photo() {
        let (repo, property_id) = setup().await;
        let photo = repo.create(property_id, "a.jpg", "/uploads/a.jpg", 10).await.unwrap().unwrap();

        repo.delete(photo.id).await.unwrap();

        assert!(repo.get_by_id(photo.id).await.unwrap().is_none());
        assert_eq!(repo.count_by_property(property_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_stops_at_limit() {
        let (repo, property_id) = setup().await;
        assert!(repo.create(property_id, "a.jpg", "/uploads/a.jpg", 2).await.unwrap().is_some());
        assert!(repo.create(property_id, "b.jpg", "/uploads/b.jpg", 2).await.unwrap().is_some());

        assert!(repo.create(property_id, "c.jpg", "/uploads/c.jpg", 2).await.unwrap().is_none());
        assert_eq!(repo.count_by_property(property_id).await.unwrap(), 2);
    }
}
