//! Admin API endpoints
//!
//! All routes require an administrator session:
//! - GET /api/v1/admin/dashboard - Booking, property and customer statistics
//! - GET /api/v1/admin/bookings - Every booking, optionally by status
//! - PUT /api/v1/admin/bookings/{id}/status - Apply a booking transition
//! - GET /api/v1/admin/properties - Every property, optionally by status
//! - PUT /api/v1/admin/properties/{id}/status - List or unlist a property
//! - GET /api/v1/admin/customers - Accounts by role (default guests)
//! - PUT /api/v1/admin/customers/{id}/status - Ban or reinstate an account

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{
    default_page, default_per_page, parse_optional, StatusListQuery, StatusUpdateRequest,
};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{PageResponse, UserResponse};
use crate::models::{Booking, ListParams, Property, UserRole};
use crate::services::DashboardStats;

/// Query parameters for the customer list
#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub role: Option<String>,
}

/// Build admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{id}/status", put(update_booking_status))
        .route("/properties", get(list_properties))
        .route("/properties/{id}/status", put(update_property_status))
        .route("/customers", get(list_customers))
        .route("/customers/{id}/status", put(update_customer_status))
}

/// GET /api/v1/admin/dashboard
async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let stats = state.admin_service.dashboard().await?;
    Ok(Json(stats))
}

/// GET /api/v1/admin/bookings
async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<StatusListQuery>,
) -> Result<Json<PageResponse<Booking>>, ApiError> {
    let result = state
        .booking_service
        .list_all(query.status()?, &query.params())
        .await?;
    Ok(Json(result.into()))
}

/// PUT /api/v1/admin/bookings/{id}/status
async fn update_booking_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state
        .booking_service
        .transition(&user.0, id, body.parse()?)
        .await?;
    Ok(Json(booking))
}

/// GET /api/v1/admin/properties
async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<StatusListQuery>,
) -> Result<Json<PageResponse<Property>>, ApiError> {
    let result = state
        .property_service
        .list(query.status()?, &query.params())
        .await?;
    Ok(Json(result.into()))
}

/// PUT /api/v1/admin/properties/{id}/status
async fn update_property_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<Property>, ApiError> {
    let property = state
        .onboarding_service
        .change_status(&user.0, id, body.parse()?)
        .await?;
    Ok(Json(property))
}

/// GET /api/v1/admin/customers
async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<PageResponse<UserResponse>>, ApiError> {
    let role = parse_optional("role", query.role.as_deref())?.unwrap_or(UserRole::Guest);
    let params = ListParams::new(query.page, query.per_page);

    let result = state.user_service.list_customers(role, &params).await?;
    Ok(Json(PageResponse::from(result.map(UserResponse::from))))
}

/// PUT /api/v1/admin/customers/{id}/status
///
/// Banning revokes every session of the account.
async fn update_customer_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .user_service
        .set_status(&user.0, id, body.parse()?)
        .await?;
    Ok(Json(updated.into()))
}
