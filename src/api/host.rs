//! Host endpoints: the listing wizard and bookings on owned properties
//!
//! - POST /api/v1/host/properties - Start a new listing
//! - GET /api/v1/host/properties - The caller's listings
//! - GET /api/v1/host/properties/{id} - One listing with photos
//! - PUT /api/v1/host/properties/{id}/steps - Submit a wizard step
//! - POST /api/v1/host/properties/{id}/photos - Upload photos (multipart)
//! - DELETE /api/v1/host/properties/{id}/photos/{photo_id} - Remove a photo
//! - POST /api/v1/host/properties/{id}/publish - Make a listing live
//! - POST /api/v1/host/properties/{id}/unlist - Take a listing down
//! - GET /api/v1/host/bookings - Bookings on the caller's properties
//! - PUT /api/v1/host/bookings/{id}/status - Confirm, decline or complete

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::api::common::{StatusListQuery, StatusUpdateRequest};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{PageResponse, SuccessResponse};
use crate::models::{Booking, Property, PropertyDetail};
use crate::services::{PhotoUploadResult, StepInput, UploadedFile};

/// Build host routes (requires auth and host middleware).
///
/// `upload_limit` bounds the body of a photo upload request.
pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/properties", get(list_properties).post(create_property))
        .route("/properties/{id}", get(get_property))
        .route("/properties/{id}/steps", put(submit_step))
        .route(
            "/properties/{id}/photos",
            post(upload_photos).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/properties/{id}/photos/{photo_id}", delete(delete_photo))
        .route("/properties/{id}/publish", post(publish_property))
        .route("/properties/{id}/unlist", post(unlist_property))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{id}/status", put(update_booking_status))
}

/// POST /api/v1/host/properties
async fn create_property(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, Json<Property>), ApiError> {
    let property = state.onboarding_service.start_listing(&user.0).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

/// GET /api/v1/host/properties
async fn list_properties(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Property>>, ApiError> {
    let properties = state.onboarding_service.list_owned(&user.0).await?;
    Ok(Json(properties))
}

/// GET /api/v1/host/properties/{id}
async fn get_property(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PropertyDetail>, ApiError> {
    state.onboarding_service.get_owned(&user.0, id).await?;
    let detail = state.property_service.get_detail(Some(&user.0), id).await?;
    Ok(Json(detail))
}

/// PUT /api/v1/host/properties/{id}/steps
async fn submit_step(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<StepInput>,
) -> Result<Json<Property>, ApiError> {
    let property = state.onboarding_service.submit_step(&user.0, id, body).await?;
    Ok(Json(property))
}

/// POST /api/v1/host/properties/{id}/photos
///
/// Accepts multipart/form-data with file fields named "files" or "file".
/// Files that fail validation are reported in `failed`; the rest are kept.
async fn upload_photos(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<PhotoUploadResult>, ApiError> {
    let mut files = Vec::new();
    let mut unreadable = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != "files" && name != "file" {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        match field.bytes().await {
            Ok(data) => files.push(UploadedFile {
                filename,
                content_type,
                data: data.to_vec(),
            }),
            Err(e) => unreadable.push(format!("{}: {}", filename, e)),
        }
    }

    if files.is_empty() {
        if unreadable.is_empty() {
            return Err(ApiError::validation_error("No files uploaded"));
        }
        return Ok(Json(PhotoUploadResult {
            photos: Vec::new(),
            failed: unreadable,
        }));
    }

    let mut result = state.onboarding_service.add_photos(&user.0, id, files).await?;
    result.failed.extend(unreadable);
    Ok(Json(result))
}

/// DELETE /api/v1/host/properties/{id}/photos/{photo_id}
async fn delete_photo(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, photo_id)): Path<(i64, i64)>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .onboarding_service
        .delete_photo(&user.0, id, photo_id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/v1/host/properties/{id}/publish
async fn publish_property(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Property>, ApiError> {
    let property = state.onboarding_service.publish(&user.0, id).await?;
    Ok(Json(property))
}

/// POST /api/v1/host/properties/{id}/unlist
async fn unlist_property(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Property>, ApiError> {
    let property = state.onboarding_service.unlist(&user.0, id).await?;
    Ok(Json(property))
}

/// GET /api/v1/host/bookings
async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<StatusListQuery>,
) -> Result<Json<PageResponse<Booking>>, ApiError> {
    let result = state
        .booking_service
        .list_for_host(&user.0, query.status()?, &query.params())
        .await?;
    Ok(Json(result.into()))
}

/// PUT /api/v1/host/bookings/{id}/status
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
