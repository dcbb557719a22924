//! Review model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A guest's rating and comment on a property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub property_id: i64,
    pub user_id: i64,
    /// 1 to 5 stars
    pub rating: i64,
    pub comment: String,
    /// Number of distinct users who liked this review
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

/// Review together with the reviewer's display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub author_name: String,
}

/// Average rating and review count for a property
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Average rating rounded to one decimal, 0 when there are no reviews
    pub average: f64,
    pub count: i64,
}

impl RatingSummary {
    pub fn from_totals(sum: i64, count: i64) -> Self {
        if count <= 0 {
            return Self::default();
        }
        let average = (sum as f64 / count as f64 * 10.0).round() / 10.0;
        Self { average, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_summary() {
        assert_eq!(RatingSummary::from_totals(0, 0), RatingSummary::default());

        let summary = RatingSummary::from_totals(14, 3);
        assert_eq!(summary.count, 3);
        assert!((summary.average - 4.7).abs() < f64::EPSILON);
    }
}
