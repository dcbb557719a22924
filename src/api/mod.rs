//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for the BharatTrips service.
//! It includes:
//! - Auth API endpoints (accounts, sessions, one-time codes)
//! - Property search, detail and review endpoints
//! - Guest booking endpoints
//! - Host listing wizard and booking management
//! - Admin dashboard endpoints
//! - Serving uploaded photos under /uploads

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod common;
pub mod host;
pub mod middleware;
pub mod properties;
pub mod responses;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Multipart overhead allowed on top of the photo payload
const MULTIPART_SLACK: usize = 1024 * 1024;

/// Build the main API router
pub fn build_api_router(state: AppState, upload_limit: usize) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Host routes (need host or admin role)
    let host_routes = Router::new()
        .nest("/host", host::router(upload_limit))
        .route_layer(axum_middleware::from_fn(middleware::require_host))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (any signed-in user)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(properties::protected_router())
        .merge(bookings::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes, with the user attached when a valid session is sent
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(properties::public_router())
        .merge(bookings::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
        .merge(admin_routes)
        .merge(host_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> anyhow::Result<Router> {
    let origin = config
        .server
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", config.server.cors_origin, e))?;

    // Credentials are allowed so the session cookie works cross-origin
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let max_photos = usize::try_from(config.upload.max_photos_per_property.max(1)).unwrap_or(1);
    let max_file = usize::try_from(config.upload.max_file_size).unwrap_or(usize::MAX);
    let upload_limit = max_file
        .saturating_mul(max_photos)
        .saturating_add(MULTIPART_SLACK);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone(), upload_limit))
        .nest_service("/uploads", ServeDir::new(&config.upload.path))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
