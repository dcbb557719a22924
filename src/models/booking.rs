//! Booking model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A reservation of one or more rooms for a date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub property_id: i64,
    pub guest_id: i64,
    pub check_in: NaiveDate,
    /// Exclusive: the guest leaves on this day
    pub check_out: NaiveDate,
    pub guests: i64,
    pub rooms: i64,
    pub nights: i64,
    pub nightly_rate: i64,
    pub subtotal: i64,
    pub taxes: i64,
    pub service_fee: i64,
    pub total: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Whether `[check_in, check_out)` intersects this booking's stay
    pub fn overlaps(&self, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        self.check_in < check_out && check_in < self.check_out
    }
}

/// Booking lifecycle.
///
/// ```text
/// pending ──> confirmed ──> completed
///    │            │
///    ├─> declined └─> cancelled
///    └─> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Declined,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Declined,
    ];

    /// Check if moving from `self` to `next` is a valid transition
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Declined)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }

    /// Active bookings hold rooms
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::Declined => write!(f, "declined"),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            "declined" => Ok(BookingStatus::Declined),
            _ => Err(anyhow::anyhow!("Invalid booking status: {}", s)),
        }
    }
}

/// Request from a guest to book a stay
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingInput {
    pub property_id: i64,
    pub check_in: String,
    pub check_out: String,
    pub guests: i64,
    #[serde(default = "default_rooms")]
    pub rooms: i64,
    pub guest_name: String,
    pub guest_email: String,
    #[serde(default)]
    pub guest_phone: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

pub(crate) fn default_rooms() -> i64 {
    1
}

/// Row to insert once the request has been validated and priced
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub property_id: i64,
    pub guest_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
    pub rooms: i64,
    pub nights: i64,
    pub nightly_rate: i64,
    pub subtotal: i64,
    pub taxes: i64,
    pub service_fee: i64,
    pub total: i64,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub special_requests: Option<String>,
}

/// Booking counts per status plus confirmed revenue
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingStats {
    pub pending: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub declined: i64,
    /// Sum of totals of confirmed and completed bookings
    pub revenue: i64,
}

impl BookingStats {
    pub fn total(&self) -> i64 {
        self.pending + self.confirmed + self.completed + self.cancelled + self.declined
    }

    pub(crate) fn add(&mut self, status: BookingStatus, count: i64) {
        match status {
            BookingStatus::Pending => self.pending += count,
            BookingStatus::Confirmed => self.confirmed += count,
            BookingStatus::Completed => self.completed += count,
            BookingStatus::Cancelled => self.cancelled += count,
            BookingStatus::Declined => self.declined += count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use BookingStatus::*;
        let allowed = [
            (Pending, Confirmed),
            (Pending, Declined),
            (Pending, Cancelled),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
        ];

        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in BookingStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(BookingStatus::ALL.iter().all(|next| !status.can_transition_to(*next)));
        }
    }

    #[test]
    fn test_overlap_is_half_open() {
        let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let booking = Booking {
            id: 1,
            property_id: 1,
            guest_id: 1,
            check_in: date("2025-08-10"),
            check_out: date("2025-08-12"),
            guests: 1,
            rooms: 1,
            nights: 2,
            nightly_rate: 100,
            subtotal: 200,
            taxes: 20,
            service_fee: 45,
            total: 265,
            guest_name: "G".into(),
            guest_email: "g@example.com".into(),
            guest_phone: None,
            special_requests: None,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(booking.overlaps(date("2025-08-11"), date("2025-08-13")));
        assert!(!booking.overlaps(date("2025-08-12"), date("2025-08-14")));
        assert!(!booking.overlaps(date("2025-08-08"), date("2025-08-10")));
    }

    #[test]
    fn test_status_from_str_accepts_us_spelling() {
        assert_eq!(BookingStatus::from_str("canceled").unwrap(), BookingStatus::Cancelled);
        assert!(BookingStatus::from_str("paid").is_err());
    }

    #[test]
    fn test_stats_total() {
        let mut stats = BookingStats::default();
        stats.add(BookingStatus::Pending, 2);
        stats.add(BookingStatus::Declined, 1);
        assert_eq!(stats.total(), 3);
    }
}
