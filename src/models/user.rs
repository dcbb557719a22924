//! User model
//!
//! Guests, hosts and administrators of the marketplace share one account type;
//! the role decides which parts of the API a user may reach.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, stored lowercase)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name
    pub full_name: Option<String>,
    /// Contact phone number
    pub phone: Option<String>,
    /// User role
    pub role: UserRole,
    /// User status (active/banned)
    pub status: UserStatus,
    /// Whether the email address was confirmed with a one-time code
    pub email_verified: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The password must already be hashed.
    pub fn new(email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            full_name: None,
            phone: None,
            role,
            status: UserStatus::Active,
            email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Hosts and admins may create and manage listings
    pub fn can_host(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Host)
    }

    /// Check if the user may manage a listing owned by `host_id`
    pub fn can_manage(&self, host_id: i64) -> bool {
        self.is_admin() || (self.role == UserRole::Host && self.id == host_id)
    }

    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }

    /// Name used in greetings, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Books stays and writes reviews
    #[default]
    Guest,
    /// Lists properties and manages their bookings
    Host,
    /// Full access to the admin dashboard
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Guest => write!(f, "guest"),
            UserRole::Host => write!(f, "host"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(UserRole::Guest),
            "host" => Ok(UserRole::Host),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Account state. Banned users cannot log in and lose their sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Banned,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "banned" => Ok(UserStatus::Banned),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for registering a new account (before password hashing)
#[derive(Debug, Clone, Default)]
pub struct CreateUserInput {
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// Profile fields a user can change about themselves
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    /// New password (will be hashed)
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(id: i64, role: UserRole) -> User {
        let mut user = User::new(format!("user{}@example.com", id), "hash".to_string(), role);
        user.id = id;
        user
    }

    #[test]
    fn test_user_new() {
        let user = User::new("guest@example.com".to_string(), "hash".to_string(), UserRole::Guest);

        assert_eq!(user.id, 0);
        assert_eq!(user.role, UserRole::Guest);
        assert_eq!(user.status, UserStatus::Active);
        assert!(!user.email_verified);
    }

    #[test]
    fn test_can_manage() {
        let admin = user_with(1, UserRole::Admin);
        let host = user_with(2, UserRole::Host);
        let guest = user_with(3, UserRole::Guest);

        assert!(admin.can_manage(2));
        assert!(host.can_manage(2));
        assert!(!host.can_manage(1));
        // A guest never manages listings, even one recorded under their id
        assert!(!guest.can_manage(3));
    }

    #[test]
    fn test_can_host() {
        assert!(user_with(1, UserRole::Admin).can_host());
        assert!(user_with(2, UserRole::Host).can_host());
        assert!(!user_with(3, UserRole::Guest).can_host());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let mut user = user_with(4, UserRole::Guest);
        assert_eq!(user.display_name(), "user4@example.com");

        user.full_name = Some("  ".to_string());
        assert_eq!(user.display_name(), "user4@example.com");

        user.full_name = Some("Asha Rao".to_string());
        assert_eq!(user.display_name(), "Asha Rao");
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("HOST").unwrap(), UserRole::Host);
        assert_eq!(UserRole::from_str("guest").unwrap(), UserRole::Guest);
        assert!(UserRole::from_str("editor").is_err());
        assert_eq!(UserRole::default(), UserRole::Guest);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = user_with(5, UserRole::Host);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "host");
    }
}
