//! Authentication API endpoints
//!
//! Handles HTTP requests for accounts and sessions:
//! - POST /api/v1/auth/register - Create an account and sign in
//! - POST /api/v1/auth/login - Sign in with email and password
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update name, phone or password
//! - POST /api/v1/auth/become-host - Upgrade a guest account to host
//! - POST /api/v1/auth/otp/send - Email a one-time code
//! - POST /api/v1/auth/otp/verify - Check a one-time code
//! - POST /api/v1/auth/check-host - Whether an email belongs to a host

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    extract_client_ip, extract_session_token, ApiError, AppState, AuthenticatedUser,
};
use crate::api::responses::{AuthResponse, SuccessResponse, UserResponse};
use crate::models::{Session, UpdateProfileInput, User};
use crate::services::{LoginInput, RegisterInput, UserServiceError};

/// Request body for sending a one-time code
#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Request body for checking a one-time code
#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub verified: bool,
    pub user: Option<UserResponse>,
}

#[derive(Debug, Serialize)]
pub struct CheckHostResponse {
    pub is_host: bool,
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/become-host", post(become_host))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/otp/send", post(send_code))
        .route("/otp/verify", post(verify_code))
        .route("/check-host", post(check_host))
}

/// Count an auth request against the caller's IP
async fn check_ip_limit(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(ip) = extract_client_ip(headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!("Auth rate limit hit for {}", ip);
            return Err(ApiError::rate_limited(
                "Too many requests, please try again later",
                60,
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }
    Ok(())
}

fn session_cookie(token: &str, max_age_secs: i64) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age_secs
    );
    HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)
}

fn signed_in(
    state: &AppState,
    session: Session,
    user: User,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&session.id, state.session_days * 24 * 60 * 60)?,
    );

    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
            expires_at: session.expires_at.to_rfc3339(),
        }),
    ))
}

/// POST /api/v1/auth/register - Create an account and sign in
///
/// The first account registered becomes the administrator.
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    check_ip_limit(&state, &headers).await?;

    let password = body.password.clone();
    let user = state.user_service.register(body).await?;

    let (session, user) = state
        .user_service
        .login(LoginInput {
            email: user.email,
            password,
        })
        .await?;

    let (headers, body) = signed_in(&state, session, user)?;
    Ok((StatusCode::CREATED, headers, body))
}

/// POST /api/v1/auth/login - Sign in with email and password
///
/// Limited to 10 requests per minute per IP and 5 failed attempts per
/// 15 minutes per email.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    check_ip_limit(&state, &headers).await?;

    if state.rate_limiter.is_email_limited(&body.email).await {
        return Err(ApiError::rate_limited(
            "Too many failed login attempts, please try again in 15 minutes",
            900,
        ));
    }

    let email = body.email.clone();
    let (session, user) = match state.user_service.login(body).await {
        Ok(pair) => pair,
        Err(UserServiceError::AuthenticationError(msg)) => {
            state.rate_limiter.record_failed_login(&email).await;
            return Err(ApiError::unauthorized(msg));
        }
        Err(e) => return Err(e.into()),
    };

    state.rate_limiter.clear_failed_logins(&email).await;
    signed_in(&state, session, user)
}

/// POST /api/v1/auth/logout - End the current session
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state.user_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );

    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me - Get current user
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile - Update current user's profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(&user.0, body).await?;
    Ok(Json(updated.into()))
}

/// POST /api/v1/auth/become-host - Upgrade the current account to host
async fn become_host(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.become_host(&user.0).await?;
    Ok(Json(updated.into()))
}

/// POST /api/v1/auth/otp/send - Email a one-time code
///
/// At most 3 codes per email every 10 minutes.
async fn send_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EmailRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    check_ip_limit(&state, &headers).await?;

    if !state.rate_limiter.try_send_code(&body.email).await {
        return Err(ApiError::rate_limited(
            "Too many codes requested, please wait before trying again",
            600,
        ));
    }

    state.user_service.send_verification_code(&body.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/v1/auth/otp/verify - Check a one-time code
///
/// At most 5 wrong codes per email every 10 minutes.
async fn verify_code(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, ApiError> {
    check_ip_limit(&state, &headers).await?;

    if state.rate_limiter.is_code_check_limited(&body.email).await {
        return Err(ApiError::rate_limited(
            "Too many incorrect codes, please request a new one later",
            600,
        ));
    }

    let user = match state.user_service.verify_code(&body.email, &body.code).await {
        Ok(user) => user,
        Err(UserServiceError::InvalidCode) => {
            state.rate_limiter.record_failed_code(&body.email).await;
            return Err(UserServiceError::InvalidCode.into());
        }
        Err(e) => return Err(e.into()),
    };
    state.rate_limiter.clear_failed_codes(&body.email).await;

    Ok(Json(VerifyCodeResponse {
        verified: true,
        user: user.map(Into::into),
    }))
}

/// POST /api/v1/auth/check-host - Whether an email belongs to a host account
async fn check_host(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<CheckHostResponse>, ApiError> {
    let is_host = state.user_service.is_host_email(&body.email).await?;
    Ok(Json(CheckHostResponse { is_host }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("abc-123", 604800).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "session=abc-123; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800"
        );
    }
}
