//! Review service

use crate::db::is_unique_violation;
use crate::db::repositories::ReviewRepository;
use crate::models::{ListParams, PagedResult, RatingSummary, Review, ReviewWithAuthor, User};
use crate::services::property::{PropertyService, PropertyServiceError};
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ReviewServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("You have already reviewed this property")]
    AlreadyReviewed,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<PropertyServiceError> for ReviewServiceError {
    fn from(err: PropertyServiceError) -> Self {
        match err {
            PropertyServiceError::NotFound => ReviewServiceError::NotFound("Property not found".to_string()),
            PropertyServiceError::ValidationError(msg) => ReviewServiceError::ValidationError(msg),
            PropertyServiceError::InternalError(e) => ReviewServiceError::InternalError(e),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewInput {
    pub rating: i64,
    pub comment: String,
}

pub struct ReviewService {
    review_repo: Arc<dyn ReviewRepository>,
    properties: Arc<PropertyService>,
}

impl ReviewService {
    pub fn new(review_repo: Arc<dyn ReviewRepository>, properties: Arc<PropertyService>) -> Self {
        Self {
            review_repo,
            properties,
        }
    }

    /// Post a review on a listed property. One review per user per property.
    pub async fn add(
        &self,
        author: &User,
        property_id: i64,
        input: CreateReviewInput,
    ) -> Result<Review, ReviewServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ReviewServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        let comment = input.comment.trim().to_string();
        let len = comment.chars().count();
        if len == 0 || len > MAX_COMMENT_LEN {
            return Err(ReviewServiceError::ValidationError(format!(
                "Comment must be 1 to {} characters",
                MAX_COMMENT_LEN
            )));
        }

        let property = self.properties.get(property_id).await?;
        if !property.is_listed() {
            return Err(ReviewServiceError::NotFound("Property not found".to_string()));
        }

        if self
            .review_repo
            .find_by_user(property.id, author.id)
            .await
            .context("Failed to check existing review")?
            .is_some()
        {
            return Err(ReviewServiceError::AlreadyReviewed);
        }

        let review = Review {
            id: 0,
            property_id: property.id,
            user_id: author.id,
            rating: input.rating,
            comment,
            likes: 0,
            created_at: Utc::now(),
        };
        let review = match self.review_repo.create(&review).await {
            Ok(review) => review,
            // A concurrent request from the same user got there first
            Err(e) if is_unique_violation(&e) => return Err(ReviewServiceError::AlreadyReviewed),
            Err(e) => return Err(e.context("Failed to create review").into()),
        };

        self.properties.invalidate(property.id).await;
        tracing::info!("User {} reviewed property {} ({} stars)", author.id, property.id, review.rating);
        Ok(review)
    }

    /// Reviews on a listed property, newest first
    pub async fn list(
        &self,
        property_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<ReviewWithAuthor>, ReviewServiceError> {
        let (items, total) = self
            .review_repo
            .list_by_property(property_id, params)
            .await
            .context("Failed to list reviews")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn summary(&self, property_id: i64) -> Result<RatingSummary, ReviewServiceError> {
        Ok(self
            .review_repo
            .rating_summary(property_id)
            .await
            .context("Failed to load rating summary")?)
    }

    /// Like a review. Liking twice has no further effect.
    pub async fn like(&self, user: &User, review_id: i64) -> Result<Review, ReviewServiceError> {
        self.find(review_id).await?;

        let added = self
            .review_repo
            .like(review_id, user.id)
            .await
            .context("Failed to like review")?;
        if added {
            tracing::debug!("User {} liked review {}", user.id, review_id);
        }

        self.find(review_id).await
    }

    async fn find(&self, id: i64) -> Result<Review, ReviewServiceError> {
        self.review_repo
            .get_by_id(id)
            .await
            .context("Failed to get review")?
            .ok_or_else(|| ReviewServiceError::NotFound("Review not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Fixture;

    fn input(rating: i64, comment: &str) -> CreateReviewInput {
        CreateReviewInput {
            rating,
            comment: comment.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_list_reviews() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Munnar", 2200, 2).await;
        let other = fx.create_guest("other@example.com").await;

        fx.reviews
            .add(&fx.guest, property.id, input(5, "Lovely tea estate views"))
            .await
            .unwrap();
        fx.reviews
            .add(&other, property.id, input(4, "  Good food  "))
            .await
            .unwrap();

        let page = fx.reviews.list(property.id, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].review.comment, "Good food");

        let summary = fx.reviews.summary(property.id).await.unwrap();
        assert_eq!(summary.count, 2);
        assert!((summary.average - 4.5).abs() < f64::EPSILON);

        let detail = fx.properties.get_detail(None, property.id).await.unwrap();
        assert_eq!(detail.rating.count, 2);
    }

    #[tokio::test]
    async fn test_review_validation() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Munnar", 2200, 2).await;

        for bad in [input(0, "x"), input(6, "x"), input(3, "   "), input(3, &"a".repeat(2001))] {
            assert!(matches!(
                fx.reviews.add(&fx.guest, property.id, bad).await,
                Err(ReviewServiceError::ValidationError(_))
            ));
        }

        let draft = fx.draft_property(fx.host.id).await;
        assert!(matches!(
            fx.reviews.add(&fx.guest, draft.id, input(4, "ok")).await,
            Err(ReviewServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reviews_by_one_user_conflict() {
        let fx = Arc::new(Fixture::new().await);
        let property = fx.listed_property(fx.host.id, "Munnar", 2200, 2).await;

        let mut handles = Vec::new();
        for i in 0..4 {
            let fx = fx.clone();
            let property_id = property.id;
            handles.push(tokio::spawn(async move {
                fx.reviews
                    .add(&fx.guest, property_id, input(4, &format!("Visit {}", i)))
                    .await
            }));
        }
        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(ReviewServiceError::AlreadyReviewed) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(fx.reviews.summary(property.id).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_one_review_per_user() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Munnar", 2200, 2).await;

        fx.reviews.add(&fx.guest, property.id, input(5, "first")).await.unwrap();
        assert!(matches!(
            fx.reviews.add(&fx.guest, property.id, input(1, "second")).await,
            Err(ReviewServiceError::AlreadyReviewed)
        ));
    }

    #[tokio::test]
    async fn test_likes_are_idempotent() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Munnar", 2200, 2).await;
        let review = fx.reviews.add(&fx.guest, property.id, input(5, "great")).await.unwrap();

        assert_eq!(fx.reviews.like(&fx.host, review.id).await.unwrap().likes, 1);
        assert_eq!(fx.reviews.like(&fx.host, review.id).await.unwrap().likes, 1);
        assert_eq!(fx.reviews.like(&fx.admin, review.id).await.unwrap().likes, 2);

        assert!(matches!(
            fx.reviews.like(&fx.admin, 999).await,
            Err(ReviewServiceError::NotFound(_))
        ));
    }
}
