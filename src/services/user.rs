//! User service
//!
//! Accounts and authentication:
//! - registration (the first account becomes admin)
//! - login/logout with opaque session tokens
//! - email verification with one-time codes
//! - guest to host upgrade
//! - admin ban/unban, which revokes sessions

use crate::config::AuthConfig;
use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository, VerificationRepository};
use crate::models::{
    ListParams, PagedResult, Session, UpdateProfileInput, User, UserRole, UserStatus,
};
use crate::services::email::{generate_verification_code, Notifier};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Your account has been suspended")]
    Banned,

    #[error("User not found")]
    NotFound,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Invalid or expired verification code")]
    InvalidCode,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Input for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Normalize an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// User service for managing accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    verification_repo: Arc<dyn VerificationRepository>,
    notifier: Notifier,
    config: AuthConfig,
    /// Held while deciding a new account's role and inserting it
    register_lock: Mutex<()>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        verification_repo: Arc<dyn VerificationRepository>,
        notifier: Notifier,
        config: AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            verification_repo,
            notifier,
            config,
            register_lock: Mutex::new(()),
        }
    }

    /// Register a new account.
    ///
    /// The first account in an empty system becomes `admin`; everyone else
    /// starts as `guest`.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email);
        self.validate_email(&email)?;
        self.validate_password(&input.password)?;
        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let _guard = self.register_lock.lock().await;
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Guest
        };

        let mut user = User::new(email.clone(), password_hash, role);
        user.full_name = non_blank(input.full_name);
        user.phone = non_blank(input.phone);

        let created = match self.user_repo.create(&user).await {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                return Err(UserServiceError::UserExists(format!(
                    "Email '{}' is already registered",
                    email
                )));
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!("Registered user {} as {}", created.id, created.role);
        Ok(created)
    }

    /// Verify credentials and open a new session
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = normalize_email(&input.email);
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?
        {
            return Err(invalid());
        }

        if user.is_banned() {
            return Err(UserServiceError::Banned);
        }

        let session = self.create_session(user.id).await?;
        Ok((session, user))
    }

    /// Invalidate a session token
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo.revoke(token).await?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions and sessions of banned users resolve to nothing.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self.session_repo.find_active(token, Utc::now()).await? {
            Some(s) => s,
            None => return Ok(None),
        };

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| !u.is_banned()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Update the caller's own name, phone or password
    pub async fn update_profile(
        &self,
        user: &User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut updated = user.clone();
        if input.full_name.is_some() {
            updated.full_name = non_blank(input.full_name);
        }
        if input.phone.is_some() {
            updated.phone = non_blank(input.phone);
        }
        if let Some(password) = input.password {
            self.validate_password(&password)?;
            updated.password_hash = hash_password(&password).context("Failed to hash password")?;
        }

        Ok(self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update user")?)
    }

    /// Turn a guest into a host. Hosts and admins are returned unchanged.
    pub async fn become_host(&self, user: &User) -> Result<User, UserServiceError> {
        if user.can_host() {
            return Ok(user.clone());
        }

        let mut updated = user.clone();
        updated.role = UserRole::Host;
        let updated = self
            .user_repo
            .update(&updated)
            .await
            .context("Failed to update user role")?;

        tracing::info!("User {} became a host", updated.id);
        Ok(updated)
    }

    /// Whether `email` belongs to an account that can host
    pub async fn is_host_email(&self, email: &str) -> Result<bool, UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(&normalize_email(email))
            .await
            .context("Failed to get user by email")?;
        Ok(user.map(|u| u.can_host()).unwrap_or(false))
    }

    /// Email a fresh verification code to `email`
    pub async fn send_verification_code(&self, email: &str) -> Result<(), UserServiceError> {
        let email = normalize_email(email);
        self.validate_email(&email)?;

        let code = generate_verification_code();
        let expires_at = Utc::now() + Duration::minutes(self.config.otp_ttl_minutes);
        self.verification_repo
            .save(&email, &code, expires_at)
            .await
            .context("Failed to save verification code")?;

        self.notifier
            .send_verification_code(&email, &code, self.config.otp_ttl_minutes)
            .await?;
        Ok(())
    }

    /// Check a verification code. On success the code is consumed and the
    /// matching account, if any, is marked verified.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<Option<User>, UserServiceError> {
        let email = normalize_email(email);
        let stored = self
            .verification_repo
            .get_latest(&email)
            .await
            .context("Failed to get verification code")?
            .ok_or(UserServiceError::InvalidCode)?;

        if stored.is_expired() || stored.code != code.trim() {
            return Err(UserServiceError::InvalidCode);
        }

        self.verification_repo
            .delete_for_email(&email)
            .await
            .context("Failed to delete verification code")?;

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
        {
            Some(mut user) if !user.email_verified => {
                user.email_verified = true;
                Some(self.user_repo.update(&user).await.context("Failed to verify user")?)
            }
            other => other,
        };
        Ok(user)
    }

    /// Ban or reinstate an account. Banning revokes every session.
    pub async fn set_status(
        &self,
        actor: &User,
        user_id: i64,
        status: UserStatus,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        if user.id == actor.id || user.is_admin() {
            return Err(UserServiceError::Forbidden(
                "Administrators cannot be banned".to_string(),
            ));
        }

        user.status = status;
        let user = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user status")?;

        if status == UserStatus::Banned {
            let revoked = self.session_repo.revoke_all(user.id).await?;
            tracing::info!("Revoked {} session(s) of banned user {}", revoked, user.id);
        }

        tracing::info!("User {} set to {} by admin {}", user.id, status, actor.id);
        Ok(user)
    }

    /// Paginated customer list for the admin dashboard
    pub async fn list_customers(
        &self,
        role: UserRole,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self
            .user_repo
            .list_by_role(role, params)
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(users, total, params))
    }

    pub async fn count_by_role(&self, role: UserRole) -> Result<i64, UserServiceError> {
        Ok(self
            .user_repo
            .count_by_role(role)
            .await
            .context("Failed to count users")?)
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Purge expired sessions and verification codes
    pub async fn cleanup_expired(&self) -> Result<(i64, i64), UserServiceError> {
        let sessions = self.session_repo.purge_expired(Utc::now()).await?;
        let codes = self
            .verification_repo
            .delete_expired()
            .await
            .context("Failed to delete expired verification codes")?;
        Ok((sessions, codes))
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if email.is_empty() {
            return Err(UserServiceError::ValidationError("Email cannot be empty".to_string()));
        }
        if !EMAIL_RE.is_match(email) {
            return Err(UserServiceError::ValidationError("Invalid email format".to_string()));
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), UserServiceError> {
        if password.chars().count() < self.config.min_password_len {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                self.config.min_password_len
            )));
        }
        Ok(())
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.config.session_days),
            created_at: now,
        };

        if !self.session_repo.open(&session).await? {
            // Banned between the password check and here
            return Err(UserServiceError::Banned);
        }
        Ok(session)
    }
}
