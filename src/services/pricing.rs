//! Stay duration and price calculation
//!
//! Pure arithmetic over calendar dates and whole-rupee amounts:
//!
//! ```text
//! nights   = check_out - check_in            (calendar days, must be >= 1)
//! subtotal = rate * nights * rooms
//! taxes    = round_half_up(subtotal * tax_rate)
//! total    = subtotal + taxes + service_fee
//! ```
//!
//! ```ignore
//! use bharattrips::services::pricing::{parse_stay_date, PricingPolicy};
//!
//! let policy = PricingPolicy::default();
//! let quote = policy.quote(
//!     parse_stay_date("2025-07-15")?,
//!     parse_stay_date("2025-07-18")?,
//!     399,
//!     1,
//! )?;
//! assert_eq!(quote.total, 1362);
//! ```

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::config::BookingConfig;

/// Errors produced while pricing a stay
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("Invalid date '{0}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),

    #[error("Check-out must be after check-in")]
    InvalidStayRange,

    #[error("Stay of {nights} nights exceeds the maximum of {max}")]
    StayTooLong { nights: i64, max: i64 },

    #[error("At least one room is required")]
    InvalidRooms,

    #[error("Nightly rate cannot be negative")]
    InvalidRate,

    #[error("Price exceeds the supported range")]
    Overflow,
}

/// Tax, fee and length-of-stay rules applied to every quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Tax rate in basis points (1000 = 10%)
    pub tax_rate_bps: u32,
    /// Flat fee added once per booking
    pub service_fee: i64,
    pub max_nights: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: 1000,
            service_fee: 45,
            max_nights: 30,
        }
    }
}

impl From<&BookingConfig> for PricingPolicy {
    fn from(config: &BookingConfig) -> Self {
        Self {
            tax_rate_bps: config.tax_rate_bps,
            service_fee: config.service_fee,
            max_nights: config.max_nights,
        }
    }
}

/// Price breakdown for a stay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StayQuote {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub rooms: i64,
    pub nightly_rate: i64,
    pub subtotal: i64,
    pub taxes: i64,
    pub service_fee: i64,
    pub total: i64,
}

impl PricingPolicy {
    /// Price `rooms` rooms at `nightly_rate` for `[check_in, check_out)`.
    pub fn quote(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        nightly_rate: i64,
        rooms: i64,
    ) -> Result<StayQuote, PricingError> {
        let nights = (check_out - check_in).num_days();
        if nights <= 0 {
            return Err(PricingError::InvalidStayRange);
        }
        if nights > self.max_nights {
            return Err(PricingError::StayTooLong {
                nights,
                max: self.max_nights,
            });
        }
        if rooms < 1 {
            return Err(PricingError::InvalidRooms);
        }
        if nightly_rate < 0 {
            return Err(PricingError::InvalidRate);
        }

        let subtotal = nightly_rate
            .checked_mul(nights)
            .and_then(|v| v.checked_mul(rooms))
            .ok_or(PricingError::Overflow)?;
        let taxes = round_half_up_bps(subtotal, self.tax_rate_bps).ok_or(PricingError::Overflow)?;
        let total = subtotal
            .checked_add(taxes)
            .and_then(|v| v.checked_add(self.service_fee))
            .ok_or(PricingError::Overflow)?;

        Ok(StayQuote {
            check_in,
            check_out,
            nights,
            rooms,
            nightly_rate,
            subtotal,
            taxes,
            service_fee: self.service_fee,
            total,
        })
    }

    /// Parse both dates, then price the stay
    pub fn quote_str(
        &self,
        check_in: &str,
        check_out: &str,
        nightly_rate: i64,
        rooms: i64,
    ) -> Result<StayQuote, PricingError> {
        self.quote(parse_stay_date(check_in)?, parse_stay_date(check_out)?, nightly_rate, rooms)
    }
}

/// `amount * bps / 10000`, rounded half up. `amount` must be non-negative.
fn round_half_up_bps(amount: i64, bps: u32) -> Option<i64> {
    let scaled = (amount as i128).checked_mul(bps as i128)?;
    i64::try_from((scaled + 5_000) / 10_000).ok()
}

/// Parse a stay date.
///
/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose calendar date in its
/// own offset is used (`2025-08-15T23:30:00+05:30` is the 15th).
pub fn parse_stay_date(input: &str) -> Result<NaiveDate, PricingError> {
    let trimmed = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .map_err(|_| PricingError::InvalidDate(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(s: &str) -> NaiveDate {
        parse_stay_date(s).unwrap()
    }

    #[test]
    fn test_three_nights_single_room() {
        let quote = PricingPolicy::default()
            .quote(date("2025-07-15"), date("2025-07-18"), 399, 1)
            .unwrap();

        assert_eq!(quote.nights, 3);
        assert_eq!(quote.subtotal, 1197);
        assert_eq!(quote.taxes, 120);
        assert_eq!(quote.service_fee, 45);
        assert_eq!(quote.total, 1362);
    }

    #[test]
    fn test_reversed_dates_rejected() {
        let result = PricingPolicy::default().quote_str("2025-08-15", "2025-07-18", 399, 1);
        assert_eq!(result, Err(PricingError::InvalidStayRange));
    }

    #[test]
    fn test_same_day_rejected() {
        let result = PricingPolicy::default().quote_str("2025-08-15", "2025-08-15", 399, 1);
        assert_eq!(result, Err(PricingError::InvalidStayRange));
    }

    #[test]
    fn test_limits() {
        let policy = PricingPolicy::default();
        assert_eq!(
            policy.quote_str("2025-01-01", "2025-03-01", 100, 1),
            Err(PricingError::StayTooLong { nights: 59, max: 30 })
        );
        assert_eq!(
            policy.quote_str("2025-01-01", "2025-01-02", 100, 0),
            Err(PricingError::InvalidRooms)
        );
        assert_eq!(
            policy.quote_str("2025-01-01", "2025-01-02", -1, 1),
            Err(PricingError::InvalidRate)
        );
    }

    #[test]
    fn test_overflow_reported() {
        let policy = PricingPolicy {
            max_nights: 365,
            ..PricingPolicy::default()
        };
        assert_eq!(
            policy.quote_str("2025-01-01", "2025-01-03", i64::MAX / 2, 2),
            Err(PricingError::Overflow)
        );
    }

    #[test]
    fn test_tax_rounds_half_up() {
        let policy = PricingPolicy::default();
        // 5 * 10% = 0.5 -> 1
        assert_eq!(policy.quote_str("2025-01-01", "2025-01-02", 5, 1).unwrap().taxes, 1);
        // 4 * 10% = 0.4 -> 0
        assert_eq!(policy.quote_str("2025-01-01", "2025-01-02", 4, 1).unwrap().taxes, 0);
    }

    #[test]
    fn test_parse_stay_date_formats() {
        assert_eq!(parse_stay_date(" 2025-08-15 ").unwrap(), date("2025-08-15"));
        assert_eq!(parse_stay_date("2025-08-15T23:30:00+05:30").unwrap(), date("2025-08-15"));
        assert_eq!(parse_stay_date("2025-08-15T00:30:00-08:00").unwrap(), date("2025-08-15"));
        assert!(matches!(parse_stay_date("15/08/2025"), Err(PricingError::InvalidDate(_))));
        assert!(matches!(parse_stay_date("2025-02-30"), Err(PricingError::InvalidDate(_))));
    }

    #[test]
    fn test_policy_from_config() {
        let config = BookingConfig {
            tax_rate_bps: 1800,
            service_fee: 99,
            ..BookingConfig::default()
        };
        let policy = PricingPolicy::from(&config);
        let quote = policy.quote_str("2025-01-01", "2025-01-02", 1000, 1).unwrap();
        assert_eq!(quote.taxes, 180);
        assert_eq!(quote.total, 1279);
    }

    proptest! {
        #[test]
        fn quote_is_deterministic_and_consistent(
            offset in 0i64..3000,
            nights in 1i64..=30,
            rate in 0i64..1_000_000,
            rooms in 1i64..50,
        ) {
            let policy = PricingPolicy::default();
            let check_in = date("2024-01-01") + chrono::Duration::days(offset);
            let check_out = check_in + chrono::Duration::days(nights);

            let first = policy.quote(check_in, check_out, rate, rooms).unwrap();
            let second = policy.quote(check_in, check_out, rate, rooms).unwrap();

            prop_assert_eq!(first, second);
            prop_assert_eq!(first.nights, nights);
            prop_assert_eq!(first.subtotal, rate * nights * rooms);
            prop_assert!(first.taxes >= 0);
            prop_assert_eq!(first.total, first.subtotal + first.taxes + first.service_fee);
        }

        #[test]
        fn non_positive_stays_always_rejected(back in 0i64..400) {
            let check_in = date("2025-06-01");
            let check_out = check_in - chrono::Duration::days(back);
            prop_assert_eq!(
                PricingPolicy::default().quote(check_in, check_out, 399, 1),
                Err(PricingError::InvalidStayRange)
            );
        }
    }
}
