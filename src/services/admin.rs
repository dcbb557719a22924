//! Admin dashboard statistics

use crate::models::{BookingStats, PropertyStatus, UserRole};
use crate::services::booking::{BookingService, BookingServiceError};
use crate::services::property::{PropertyService, PropertyServiceError};
use crate::services::user::{UserService, UserServiceError};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AdminServiceError {
    #[error(transparent)]
    Users(#[from] UserServiceError),

    #[error(transparent)]
    Properties(#[from] PropertyServiceError),

    #[error(transparent)]
    Bookings(#[from] BookingServiceError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropertyCounts {
    pub draft: i64,
    pub listed: i64,
    pub unlisted: i64,
}

impl PropertyCounts {
    pub fn total(&self) -> i64 {
        self.draft + self.listed + self.unlisted
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub bookings: BookingStats,
    pub total_bookings: i64,
    pub properties: PropertyCounts,
    pub total_properties: i64,
    pub customers: i64,
    pub hosts: i64,
    /// Sum of totals over confirmed and completed bookings
    pub revenue: i64,
}

pub struct AdminService {
    users: Arc<UserService>,
    properties: Arc<PropertyService>,
    bookings: Arc<BookingService>,
}

impl AdminService {
    pub fn new(
        users: Arc<UserService>,
        properties: Arc<PropertyService>,
        bookings: Arc<BookingService>,
    ) -> Self {
        Self {
            users,
            properties,
            bookings,
        }
    }

    pub async fn dashboard(&self) -> Result<DashboardStats, AdminServiceError> {
        let bookings = self.bookings.stats().await?;

        let mut properties = PropertyCounts::default();
        for (status, count) in self.properties.count_by_status().await? {
            match status {
                PropertyStatus::Draft => properties.draft += count,
                PropertyStatus::Listed => properties.listed += count,
                PropertyStatus::Unlisted => properties.unlisted += count,
            }
        }

        let customers = self.users.count_by_role(UserRole::Guest).await?;
        let hosts = self.users.count_by_role(UserRole::Host).await?;

        Ok(DashboardStats {
            total_bookings: bookings.total(),
            revenue: bookings.revenue,
            bookings,
            total_properties: properties.total(),
            properties,
            customers,
            hosts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, CreateBookingInput};
    use crate::services::test_support::Fixture;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_dashboard_counts() {
        let fx = Fixture::new().await;
        fx.draft_property(fx.host.id).await;
        let listed = fx.listed_property(fx.host.id, "Shimla", 1500, 2).await;

        let check_in = Utc::now().date_naive() + Duration::days(3);
        let booking = fx
            .bookings
            .create(
                &fx.guest,
                CreateBookingInput {
                    property_id: listed.id,
                    check_in: check_in.to_string(),
                    check_out: (check_in + Duration::days(2)).to_string(),
                    guests: 1,
                    rooms: 1,
                    guest_name: "Ravi".to_string(),
                    guest_email: "ravi@example.com".to_string(),
                    guest_phone: None,
                    special_requests: None,
                },
            )
            .await
            .unwrap();

        let stats = fx.admin_service.dashboard().await.unwrap();
        assert_eq!(stats.properties, PropertyCounts { draft: 1, listed: 1, unlisted: 0 });
        assert_eq!(stats.total_properties, 2);
        assert_eq!(stats.customers, 1);
        assert_eq!(stats.hosts, 1);
        assert_eq!(stats.total_bookings, 1);
        assert_eq!(stats.revenue, 0);

        fx.bookings
            .transition(&fx.host, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        let stats = fx.admin_service.dashboard().await.unwrap();
        assert_eq!(stats.revenue, booking.total);
        assert_eq!(stats.bookings.confirmed, 1);
    }
}
