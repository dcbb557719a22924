//! API middleware
//!
//! Contains:
//! - shared application state
//! - the JSON error envelope and service error mapping
//! - session authentication and role checks

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::models::User;
use crate::services::{
    AdminService, AdminServiceError, AuthRateLimiter, BookingService, BookingServiceError,
    OnboardingError, OnboardingService, PricingError, PropertyService, PropertyServiceError,
    ReviewService, ReviewServiceError, Services, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub property_service: Arc<PropertyService>,
    pub onboarding_service: Arc<OnboardingService>,
    pub booking_service: Arc<BookingService>,
    pub review_service: Arc<ReviewService>,
    pub admin_service: Arc<AdminService>,
    pub rate_limiter: Arc<AuthRateLimiter>,
    /// Session lifetime, used for the cookie's Max-Age
    pub session_days: i64,
}

impl AppState {
    pub fn new(services: Services, config: &Config) -> Self {
        Self {
            user_service: services.users,
            property_service: services.properties,
            onboarding_service: services.onboarding,
            booking_service: services.bookings,
            review_service: services.reviews,
            admin_service: services.admin,
            rate_limiter: services.rate_limiter,
            session_days: config.auth.session_days,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// `Option<AuthenticatedUser>` for routes that also serve anonymous visitors
impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthenticatedUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    /// Log the cause and return a generic message
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "USER_BANNED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::Banned => ApiError::new("USER_BANNED", err.to_string()),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InvalidCode => ApiError::validation_error(err.to_string()),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<PropertyServiceError> for ApiError {
    fn from(err: PropertyServiceError) -> Self {
        match err {
            PropertyServiceError::NotFound => ApiError::not_found("Property not found"),
            PropertyServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PropertyServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::NotFound => ApiError::not_found("Property not found"),
            OnboardingError::Forbidden(msg) => ApiError::forbidden(msg),
            OnboardingError::StepOutOfOrder { current, submitted } => ApiError::with_details(
                "VALIDATION_ERROR",
                err.to_string(),
                serde_json::json!({ "current_step": current, "submitted_step": submitted }),
            ),
            OnboardingError::NotReady(step) => ApiError::with_details(
                "VALIDATION_ERROR",
                err.to_string(),
                serde_json::json!({ "current_step": step }),
            ),
            OnboardingError::ValidationError(msg) => ApiError::validation_error(msg),
            OnboardingError::InvalidState(msg) => ApiError::conflict(msg),
            OnboardingError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        ApiError::validation_error(err.to_string())
    }
}

impl From<BookingServiceError> for ApiError {
    fn from(err: BookingServiceError) -> Self {
        match err {
            BookingServiceError::NotFound => ApiError::not_found("Booking not found"),
            BookingServiceError::PropertyNotFound => ApiError::not_found("Property not found"),
            BookingServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            BookingServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            BookingServiceError::Pricing(e) => e.into(),
            BookingServiceError::Unavailable { available } => ApiError::with_details(
                "CONFLICT",
                err.to_string(),
                serde_json::json!({ "available_rooms": available }),
            ),
            BookingServiceError::InvalidTransition { from, to } => ApiError::with_details(
                "CONFLICT",
                err.to_string(),
                serde_json::json!({ "from": from, "to": to }),
            ),
            BookingServiceError::Conflict => ApiError::conflict(err.to_string()),
            BookingServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ReviewServiceError> for ApiError {
    fn from(err: ReviewServiceError) -> Self {
        match err {
            ReviewServiceError::NotFound(msg) => ApiError::not_found(msg),
            ReviewServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ReviewServiceError::AlreadyReviewed => ApiError::conflict(err.to_string()),
            ReviewServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<AdminServiceError> for ApiError {
    fn from(err: AdminServiceError) -> Self {
        match err {
            AdminServiceError::Users(e) => e.into(),
            AdminServiceError::Properties(e) => e.into(),
            AdminServiceError::Bookings(e) => e.into(),
        }
    }
}

/// Session token from `Authorization: Bearer` or the `session` cookie
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Client address as reported by a reverse proxy
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next());
    let real_ip = headers.get("x-real-ip").and_then(|h| h.to_str().ok());

    forwarded
        .or(real_ip)
        .and_then(|ip| ip.trim().parse().ok())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Host authorization middleware (hosts and admins)
pub async fn require_host(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.can_host() {
        return Err(ApiError::forbidden("Host privileges required"));
    }

    Ok(next.run(request).await)
}

/// Admin authorization middleware
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}
