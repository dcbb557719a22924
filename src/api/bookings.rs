//! Guest booking endpoints
//!
//! - POST /api/v1/bookings/quote - Price a stay
//! - POST /api/v1/bookings - Book a stay (auth)
//! - GET /api/v1/bookings - The caller's bookings (auth)
//! - GET /api/v1/bookings/{id} - One booking (auth)
//! - POST /api/v1/bookings/{id}/cancel - Cancel a booking (auth)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PageResponse;
use crate::models::{default_rooms, Booking, CreateBookingInput, ListParams};
use crate::services::BookingQuote;

/// Request body for a price quote
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub property_id: i64,
    pub check_in: String,
    pub check_out: String,
    #[serde(default = "default_rooms")]
    pub rooms: i64,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/bookings/quote", post(quote))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
}

/// POST /api/v1/bookings/quote
async fn quote(
    State(state): State<AppState>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<BookingQuote>, ApiError> {
    let quote = state
        .booking_service
        .quote(body.property_id, &body.check_in, &body.check_out, body.rooms)
        .await?;
    Ok(Json(quote))
}

/// POST /api/v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateBookingInput>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let booking = state.booking_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /api/v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<Booking>>, ApiError> {
    let result = state
        .booking_service
        .list_for_guest(&user.0, &ListParams::from(&query))
        .await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.booking_service.get(&user.0, id).await?;
    Ok(Json(booking))
}

/// POST /api/v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.booking_service.cancel(&user.0, id).await?;
    Ok(Json(booking))
}
