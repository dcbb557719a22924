//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use serde::Deserialize;
use std::str::FromStr;

use crate::api::middleware::ApiError;
use crate::models::ListParams;

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size
pub fn default_per_page() -> u32 {
    20
}

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl From<&PaginationQuery> for ListParams {
    fn from(query: &PaginationQuery) -> Self {
        ListParams::new(query.page, query.per_page)
    }
}

/// Pagination plus an optional `status` filter
#[derive(Debug, Deserialize)]
pub struct StatusListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

impl StatusListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }

    /// Parse the status filter; empty means no filter
    pub fn status<T: FromStr>(&self) -> Result<Option<T>, ApiError> {
        parse_optional("status", self.status.as_deref())
    }
}

/// Request body for status changes
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

impl StatusUpdateRequest {
    pub fn parse<T: FromStr>(&self) -> Result<T, ApiError> {
        self.status
            .parse()
            .map_err(|_| ApiError::validation_error(format!("Invalid status '{}'", self.status)))
    }
}

/// Parse an optional query value, treating blank as absent
pub fn parse_optional<T: FromStr>(field: &str, value: Option<&str>) -> Result<Option<T>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ApiError::validation_error(format!("Invalid {} '{}'", field, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;

    #[test]
    fn test_parse_optional() {
        assert_eq!(parse_optional::<BookingStatus>("status", None).unwrap(), None);
        assert_eq!(parse_optional::<BookingStatus>("status", Some("  ")).unwrap(), None);
        assert_eq!(
            parse_optional::<BookingStatus>("status", Some("confirmed")).unwrap(),
            Some(BookingStatus::Confirmed)
        );

        let err = parse_optional::<BookingStatus>("status", Some("lost")).unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_pagination_is_clamped() {
        let query = PaginationQuery { page: 0, per_page: 1000 };
        let params = ListParams::from(&query);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, ListParams::MAX_PER_PAGE);
    }
}
