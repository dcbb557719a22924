//! Property search, detail and review endpoints
//!
//! - GET /api/v1/properties - Search listed properties
//! - GET /api/v1/properties/{id} - Property detail with photos and rating
//! - GET /api/v1/properties/{id}/reviews - Reviews, newest first
//! - POST /api/v1/properties/{id}/reviews - Post a review (auth)
//! - POST /api/v1/reviews/{id}/like - Like a review (auth)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, parse_optional, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PageResponse;
use crate::models::{
    ListParams, Property, PropertyDetail, RatingSummary, Review, ReviewWithAuthor, SearchFilters,
};
use crate::services::{parse_stay_date, CreateReviewInput};

/// Query parameters for property search
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub guests: Option<i64>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub rooms: Option<i64>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl SearchQuery {
    fn filters(&self) -> Result<SearchFilters, ApiError> {
        let stay = match (self.check_in.as_deref(), self.check_out.as_deref()) {
            (Some(check_in), Some(check_out)) => Some((
                parse_stay_date(check_in)?,
                parse_stay_date(check_out)?,
            )),
            (None, None) => None,
            _ => {
                return Err(ApiError::validation_error(
                    "check_in and check_out must be given together",
                ))
            }
        };

        Ok(SearchFilters {
            city: self
                .city
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from),
            property_type: parse_optional("property_type", self.property_type.as_deref())?,
            min_price: self.min_price,
            max_price: self.max_price,
            guests: self.guests,
            stay,
            rooms: self.rooms.unwrap_or(1),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    #[serde(flatten)]
    pub page: PageResponse<ReviewWithAuthor>,
    pub rating: RatingSummary,
}

/// Routes open to anonymous visitors (behind optional auth)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/properties", get(search_properties))
        .route("/properties/{id}", get(get_property))
        .route("/properties/{id}/reviews", get(list_reviews))
}

/// Routes that need a signed-in user
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/properties/{id}/reviews", post(create_review))
        .route("/reviews/{id}/like", post(like_review))
}

/// GET /api/v1/properties
async fn search_properties(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PageResponse<Property>>, ApiError> {
    let filters = query.filters()?;
    let params = ListParams::new(query.page, query.per_page);

    let result = state.property_service.search(&filters, &params).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/properties/{id}
async fn get_property(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<PropertyDetail>, ApiError> {
    let viewer = user.as_ref().map(|u| &u.0);
    let detail = state.property_service.get_detail(viewer, id).await?;
    Ok(Json(detail))
}

/// GET /api/v1/properties/{id}/reviews
async fn list_reviews(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Path(id): Path<i64>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ReviewListResponse>, ApiError> {
    let viewer = user.as_ref().map(|u| &u.0);
    let detail = state.property_service.get_detail(viewer, id).await?;

    let page = state
        .review_service
        .list(id, &ListParams::from(&query))
        .await?;

    Ok(Json(ReviewListResponse {
        page: page.into(),
        rating: detail.rating,
    }))
}

/// POST /api/v1/properties/{id}/reviews
async fn create_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<CreateReviewInput>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let review = state.review_service.add(&user.0, id, body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// POST /api/v1/reviews/{id}/like
async fn like_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Review>, ApiError> {
    let review = state.review_service.like(&user.0, id).await?;
    Ok(Json(review))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyType;
    use chrono::NaiveDate;

    #[test]
    fn test_search_query_to_filters() {
        let query = SearchQuery {
            city: Some("  Jaipur ".to_string()),
            property_type: Some("guest-house".to_string()),
            check_in: Some("2025-12-20".to_string()),
            check_out: Some("2025-12-22T10:00:00+05:30".to_string()),
            ..Default::default()
        };

        let filters = query.filters().unwrap();
        assert_eq!(filters.city.as_deref(), Some("Jaipur"));
        assert_eq!(filters.property_type, Some(PropertyType::GuestHouse));
        assert_eq!(filters.rooms, 1);
        assert_eq!(
            filters.stay,
            Some((
                NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
                NaiveDate::from_ymd_opt(2025, 12, 22).unwrap(),
            ))
        );
    }

    #[test]
    fn test_search_query_rejects_half_stay() {
        let query = SearchQuery {
            check_in: Some("2025-12-20".to_string()),
            ..Default::default()
        };
        assert_eq!(query.filters().unwrap_err().error.code, "VALIDATION_ERROR");

        let query = SearchQuery {
            property_type: Some("castle".to_string()),
            ..Default::default()
        };
        assert!(query.filters().is_err());
    }
}
