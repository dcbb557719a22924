//! Property service
//!
//! Search over listed properties and the cached property detail view.
//! Anything that changes a property, its photos or its reviews must call
//! `invalidate` so the detail cache never serves stale data.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{PhotoRepository, PropertyRepository, ReviewRepository};
use crate::models::{
    ListParams, PagedResult, Property, PropertyDetail, PropertyStatus, SearchFilters, User,
};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PropertyServiceError {
    #[error("Property not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

fn detail_key(id: i64) -> String {
    format!("property:{}", id)
}

pub struct PropertyService {
    property_repo: Arc<dyn PropertyRepository>,
    photo_repo: Arc<dyn PhotoRepository>,
    review_repo: Arc<dyn ReviewRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: Duration,
}

impl PropertyService {
    pub fn new(
        property_repo: Arc<dyn PropertyRepository>,
        photo_repo: Arc<dyn PhotoRepository>,
        review_repo: Arc<dyn ReviewRepository>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            property_repo,
            photo_repo,
            review_repo,
            cache,
            cache_ttl,
        }
    }

    /// Search listed properties, cheapest first
    pub async fn search(
        &self,
        filters: &SearchFilters,
        params: &ListParams,
    ) -> Result<PagedResult<Property>, PropertyServiceError> {
        if let (Some(min), Some(max)) = (filters.min_price, filters.max_price) {
            if min > max {
                return Err(PropertyServiceError::ValidationError(
                    "min_price cannot exceed max_price".to_string(),
                ));
            }
        }
        if let Some((check_in, check_out)) = filters.stay {
            if check_out <= check_in {
                return Err(PropertyServiceError::ValidationError(
                    "Check-out must be after check-in".to_string(),
                ));
            }
        }
        if filters.rooms < 1 {
            return Err(PropertyServiceError::ValidationError(
                "At least one room is required".to_string(),
            ));
        }

        let (items, total) = self
            .property_repo
            .search(filters, params)
            .await
            .context("Failed to search properties")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Property with photos and rating summary.
    ///
    /// Listings that are not live are only visible to their host and admins;
    /// everyone else gets `NotFound`.
    pub async fn get_detail(
        &self,
        viewer: Option<&User>,
        id: i64,
    ) -> Result<PropertyDetail, PropertyServiceError> {
        let detail = self.load_detail(id).await?;

        let visible = detail.property.is_listed()
            || viewer.is_some_and(|u| u.can_manage(detail.property.host_id));
        if !visible {
            return Err(PropertyServiceError::NotFound);
        }
        Ok(detail)
    }

    /// Fetch a property without visibility checks
    pub async fn get(&self, id: i64) -> Result<Property, PropertyServiceError> {
        self.property_repo
            .get_by_id(id)
            .await
            .context("Failed to get property")?
            .ok_or(PropertyServiceError::NotFound)
    }

    /// Admin listing of every property
    pub async fn list(
        &self,
        status: Option<PropertyStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Property>, PropertyServiceError> {
        let (items, total) = self
            .property_repo
            .list(status, params)
            .await
            .context("Failed to list properties")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_by_host(&self, host_id: i64) -> Result<Vec<Property>, PropertyServiceError> {
        Ok(self
            .property_repo
            .list_by_host(host_id)
            .await
            .context("Failed to list host properties")?)
    }

    pub async fn count_by_status(&self) -> Result<Vec<(PropertyStatus, i64)>, PropertyServiceError> {
        Ok(self
            .property_repo
            .count_by_status()
            .await
            .context("Failed to count properties")?)
    }

    /// Drop the cached detail for a property
    pub async fn invalidate(&self, id: i64) {
        if let Err(e) = self.cache.delete(&detail_key(id)).await {
            tracing::warn!("Failed to invalidate property {} cache: {}", id, e);
        }
    }

    async fn load_detail(&self, id: i64) -> Result<PropertyDetail, PropertyServiceError> {
        let key = detail_key(id);
        match self.cache.get::<PropertyDetail>(&key).await {
            Ok(Some(detail)) => return Ok(detail),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable cache entry {}: {}", key, e),
        }

        let property = self.get(id).await?;
        let photos = self
            .photo_repo
            .list_by_property(id)
            .await
            .context("Failed to list photos")?;
        let rating = self
            .review_repo
            .rating_summary(id)
            .await
            .context("Failed to load rating summary")?;

        let detail = PropertyDetail {
            property,
            photos,
            rating,
        };
        if let Err(e) = self.cache.set(&key, &detail, self.cache_ttl).await {
            tracing::warn!("Failed to cache {}: {}", key, e);
        }
        Ok(detail)
    }
}
