//! Booking service
//!
//! Quotes, reservations and the booking status workflow.
//!
//! Reservations are serialized in-process by `create_lock` and the repository
//! re-counts overlapping active bookings inside the insert transaction, so
//! two requests can never oversell the same rooms.

use crate::db::repositories::{BookingRepository, InsertOutcome};
use crate::models::{
    Booking, BookingStats, BookingStatus, CreateBookingInput, ListParams, NewBooking, PagedResult,
    Property, User,
};
use crate::services::email::Notifier;
use crate::services::pricing::{PricingError, PricingPolicy, StayQuote};
use crate::services::property::{PropertyService, PropertyServiceError};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_SPECIAL_REQUESTS_LEN: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum BookingServiceError {
    #[error("Booking not found")]
    NotFound,

    #[error("Property not found")]
    PropertyNotFound,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Only {available} room(s) available for these dates")]
    Unavailable { available: i64 },

    #[error("Cannot change booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Booking was modified concurrently, please retry")]
    Conflict,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<PropertyServiceError> for BookingServiceError {
    fn from(err: PropertyServiceError) -> Self {
        match err {
            PropertyServiceError::NotFound => BookingServiceError::PropertyNotFound,
            PropertyServiceError::ValidationError(msg) => BookingServiceError::ValidationError(msg),
            PropertyServiceError::InternalError(e) => BookingServiceError::InternalError(e),
        }
    }
}

/// Price breakdown plus current availability
#[derive(Debug, Clone, Serialize)]
pub struct BookingQuote {
    pub property_id: i64,
    #[serde(flatten)]
    pub quote: StayQuote,
    pub available_rooms: i64,
}

pub struct BookingService {
    booking_repo: Arc<dyn BookingRepository>,
    properties: Arc<PropertyService>,
    pricing: PricingPolicy,
    notifier: Notifier,
    create_lock: Mutex<()>,
}

impl BookingService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        properties: Arc<PropertyService>,
        pricing: PricingPolicy,
        notifier: Notifier,
    ) -> Self {
        Self {
            booking_repo,
            properties,
            pricing,
            notifier,
            create_lock: Mutex::new(()),
        }
    }

    /// Price a stay at a listed property
    pub async fn quote(
        &self,
        property_id: i64,
        check_in: &str,
        check_out: &str,
        rooms: i64,
    ) -> Result<BookingQuote, BookingServiceError> {
        let property = self.bookable_property(property_id).await?;
        let quote = self
            .pricing
            .quote_str(check_in, check_out, property.base_price, rooms)?;
        let booked = self
            .booking_repo
            .booked_rooms(property.id, quote.check_in, quote.check_out)
            .await
            .context("Failed to count booked rooms")?;

        Ok(BookingQuote {
            property_id: property.id,
            quote,
            available_rooms: (property.total_rooms - booked).max(0),
        })
    }

    /// Reserve rooms for `guest`. New bookings start as `pending`.
    pub async fn create(
        &self,
        guest: &User,
        input: CreateBookingInput,
    ) -> Result<Booking, BookingServiceError> {
        let property = self.bookable_property(input.property_id).await?;
        if property.host_id == guest.id {
            return Err(BookingServiceError::Forbidden(
                "Hosts cannot book their own property".to_string(),
            ));
        }

        let quote = self.pricing.quote_str(
            &input.check_in,
            &input.check_out,
            property.base_price,
            input.rooms,
        )?;
        validate_request(&property, &quote, &input, today())?;

        let guest_name = Some(input.guest_name.trim())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| guest.display_name())
            .to_string();
        let guest_email = Some(input.guest_email.trim())
            .filter(|e| !e.is_empty())
            .unwrap_or(&guest.email)
            .to_lowercase();
        if !guest_email.contains('@') {
            return Err(BookingServiceError::ValidationError(
                "Invalid guest email".to_string(),
            ));
        }

        let new_booking = NewBooking {
            property_id: property.id,
            guest_id: guest.id,
            check_in: quote.check_in,
            check_out: quote.check_out,
            guests: input.guests,
            rooms: quote.rooms,
            nights: quote.nights,
            nightly_rate: quote.nightly_rate,
            subtotal: quote.subtotal,
            taxes: quote.taxes,
            service_fee: quote.service_fee,
            total: quote.total,
            guest_name,
            guest_email,
            guest_phone: trimmed(input.guest_phone),
            special_requests: trimmed(input.special_requests),
        };

        let outcome = {
            let _guard = self.create_lock.lock().await;
            self.booking_repo
                .create_if_available(&new_booking, property.total_rooms)
                .await
                .context("Failed to create booking")?
        };

        match outcome {
            InsertOutcome::Created(booking) => {
                tracing::info!(
                    "Booking {} created: property {}, guest {}, {} to {}",
                    booking.id,
                    booking.property_id,
                    booking.guest_id,
                    booking.check_in,
                    booking.check_out
                );
                self.notifier.booking_received(&booking, &property.name);
                Ok(booking)
            }
            InsertOutcome::Unavailable { available } => {
                Err(BookingServiceError::Unavailable { available })
            }
        }
    }

    /// A booking as seen by its guest, the property's host or an admin
    pub async fn get(&self, viewer: &User, id: i64) -> Result<Booking, BookingServiceError> {
        let booking = self.find(id).await?;
        if booking.guest_id == viewer.id || viewer.is_admin() {
            return Ok(booking);
        }
        let property = self.properties.get(booking.property_id).await?;
        if property.host_id == viewer.id {
            return Ok(booking);
        }
        Err(BookingServiceError::NotFound)
    }

    pub async fn list_for_guest(
        &self,
        guest: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Booking>, BookingServiceError> {
        let (items, total) = self
            .booking_repo
            .list_by_guest(guest.id, params)
            .await
            .context("Failed to list bookings")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_for_host(
        &self,
        host: &User,
        status: Option<BookingStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Booking>, BookingServiceError> {
        let (items, total) = self
            .booking_repo
            .list_by_host(host.id, status, params)
            .await
            .context("Failed to list host bookings")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_all(
        &self,
        status: Option<BookingStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Booking>, BookingServiceError> {
        let (items, total) = self
            .booking_repo
            .list(status, params)
            .await
            .context("Failed to list bookings")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Guest cancellation of their own booking
    pub async fn cancel(&self, guest: &User, id: i64) -> Result<Booking, BookingServiceError> {
        self.transition(guest, id, BookingStatus::Cancelled).await
    }

    /// Move a booking to `to`.
    ///
    /// Admins may apply any valid transition. The property's host may
    /// confirm, decline or complete. A guest may only cancel their own
    /// booking, and only before check-in.
    pub async fn transition(
        &self,
        actor: &User,
        id: i64,
        to: BookingStatus,
    ) -> Result<Booking, BookingServiceError> {
        let booking = self.find(id).await?;
        let property = self.properties.get(booking.property_id).await?;

        self.authorize_transition(actor, &booking, &property, to)?;

        let from = booking.status;
        if !from.can_transition_to(to) {
            return Err(BookingServiceError::InvalidTransition { from, to });
        }

        if !self
            .booking_repo
            .update_status(id, from, to)
            .await
            .context("Failed to update booking status")?
        {
            return Err(BookingServiceError::Conflict);
        }

        let booking = self.find(id).await?;
        tracing::info!("Booking {} moved from {} to {} by user {}", id, from, to, actor.id);
        self.notifier
            .booking_status_changed(&booking, &property.name, to);
        Ok(booking)
    }

    pub async fn stats(&self) -> Result<BookingStats, BookingServiceError> {
        Ok(self
            .booking_repo
            .stats()
            .await
            .context("Failed to load booking stats")?)
    }

    fn authorize_transition(
        &self,
        actor: &User,
        booking: &Booking,
        property: &Property,
        to: BookingStatus,
    ) -> Result<(), BookingServiceError> {
        if actor.is_admin() {
            return Ok(());
        }

        if property.host_id == actor.id && actor.can_host() {
            return match to {
                BookingStatus::Confirmed | BookingStatus::Declined | BookingStatus::Completed => Ok(()),
                _ => Err(BookingServiceError::Forbidden(format!(
                    "Hosts cannot mark a booking as {}",
                    to
                ))),
            };
        }

        if booking.guest_id == actor.id {
            if to != BookingStatus::Cancelled {
                return Err(BookingServiceError::Forbidden(
                    "Guests can only cancel their bookings".to_string(),
                ));
            }
            if today() >= booking.check_in {
                return Err(BookingServiceError::Forbidden(
                    "Bookings cannot be cancelled on or after the check-in date".to_string(),
                ));
            }
            return Ok(());
        }

        Err(BookingServiceError::NotFound)
    }

    async fn find(&self, id: i64) -> Result<Booking, BookingServiceError> {
        self.booking_repo
            .get_by_id(id)
            .await
            .context("Failed to get booking")?
            .ok_or(BookingServiceError::NotFound)
    }

    async fn bookable_property(&self, id: i64) -> Result<Property, BookingServiceError> {
        let property = self.properties.get(id).await?;
        if !property.is_listed() {
            return Err(BookingServiceError::PropertyNotFound);
        }
        Ok(property)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_request(
    property: &Property,
    quote: &StayQuote,
    input: &CreateBookingInput,
    today: NaiveDate,
) -> Result<(), BookingServiceError> {
    let invalid = |msg: String| Err(BookingServiceError::ValidationError(msg));

    if quote.check_in < today {
        return invalid("Check-in cannot be in the past".to_string());
    }
    if quote.rooms > property.total_rooms {
        return invalid(format!("This property has only {} room(s)", property.total_rooms));
    }
    if input.guests < 1 {
        return invalid("At least one guest is required".to_string());
    }
    let capacity = property.max_guests.saturating_mul(quote.rooms);
    if input.guests > capacity {
        return invalid(format!(
            "{} room(s) can host at most {} guest(s)",
            quote.rooms, capacity
        ));
    }
    if input
        .special_requests
        .as_ref()
        .is_some_and(|r| r.chars().count() > MAX_SPECIAL_REQUESTS_LEN)
    {
        return invalid(format!(
            "Special requests cannot exceed {} characters",
            MAX_SPECIAL_REQUESTS_LEN
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Fixture;
    use chrono::Duration;

    fn day(offset: i64) -> String {
        (today() + Duration::days(offset)).format("%Y-%m-%d").to_string()
    }

    fn request(property_id: i64, check_in: i64, check_out: i64, rooms: i64) -> CreateBookingInput {
        CreateBookingInput {
            property_id,
            check_in: day(check_in),
            check_out: day(check_out),
            guests: 2,
            rooms,
            guest_name: "Asha Rao".to_string(),
            guest_email: "Asha@Example.com".to_string(),
            guest_phone: Some(" +91 98765 43210 ".to_string()),
            special_requests: None,
        }
    }

    #[tokio::test]
    async fn test_quote_uses_base_rate() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 399, 2).await;

        let quote = fx
            .bookings
            .quote(property.id, "2031-07-15", "2031-07-18", 1)
            .await
            .unwrap();
        assert_eq!(quote.quote.subtotal, 1197);
        assert_eq!(quote.quote.taxes, 120);
        assert_eq!(quote.quote.total, 1362);
        assert_eq!(quote.available_rooms, 2);

        assert!(matches!(
            fx.bookings.quote(property.id, "2031-08-15", "2031-07-18", 1).await,
            Err(BookingServiceError::Pricing(PricingError::InvalidStayRange))
        ));
    }

    #[tokio::test]
    async fn test_create_booking_prices_and_notifies() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 3).await;

        let booking = fx
            .bookings
            .create(&fx.guest, request(property.id, 10, 13, 2))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.nights, 3);
        assert_eq!(booking.subtotal, 6000);
        assert_eq!(booking.taxes, 600);
        assert_eq!(booking.total, 6645);
        assert_eq!(booking.guest_email, "asha@example.com");
        assert_eq!(booking.guest_phone.as_deref(), Some("+91 98765 43210"));

        fx.wait_for_emails(1).await;
        let sent = fx.mailer.sent.lock().await;
        assert!(sent[0].subject.contains("received"));
    }

    #[tokio::test]
    async fn test_overlapping_bookings_cannot_oversell() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 2).await;

        fx.bookings
            .create(&fx.guest, request(property.id, 10, 13, 1))
            .await
            .unwrap();
        fx.bookings
            .create(&fx.guest, request(property.id, 11, 13, 1))
            .await
            .unwrap();

        // Both rooms are taken on night 12
        let result = fx
            .bookings
            .create(&fx.guest, request(property.id, 12, 14, 1))
            .await;
        assert!(matches!(result, Err(BookingServiceError::Unavailable { available: 0 })));

        // Adjacent stay starting on the check-out day is fine
        fx.bookings
            .create(&fx.guest, request(property.id, 13, 15, 2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_stays_leave_a_room_free() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 2).await;

        fx.bookings
            .create(&fx.guest, request(property.id, 10, 11, 1))
            .await
            .unwrap();
        fx.bookings
            .create(&fx.guest, request(property.id, 12, 13, 1))
            .await
            .unwrap();

        let quote = fx
            .bookings
            .quote(property.id, &day(10), &day(13), 1)
            .await
            .unwrap();
        assert_eq!(quote.available_rooms, 1);

        fx.bookings
            .create(&fx.guest, request(property.id, 10, 13, 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_bookings_serialize() {
        let fx = Arc::new(Fixture::new().await);
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 1).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let fx = fx.clone();
            let property_id = property.id;
            handles.push(tokio::spawn(async move {
                fx.bookings
                    .create(&fx.guest, request(property_id, 20, 22, 1))
                    .await
                    .is_ok()
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 2).await;

        // Host booking own property
        assert!(matches!(
            fx.bookings.create(&fx.host, request(property.id, 5, 6, 1)).await,
            Err(BookingServiceError::Forbidden(_))
        ));
        // Check-in in the past
        assert!(matches!(
            fx.bookings.create(&fx.guest, request(property.id, -2, 1, 1)).await,
            Err(BookingServiceError::ValidationError(_))
        ));
        // More rooms than the property has
        assert!(matches!(
            fx.bookings.create(&fx.guest, request(property.id, 5, 6, 3)).await,
            Err(BookingServiceError::ValidationError(_))
        ));
        // Too many guests for one room (max 2 per room)
        let mut crowded = request(property.id, 5, 6, 1);
        crowded.guests = 3;
        assert!(matches!(
            fx.bookings.create(&fx.guest, crowded).await,
            Err(BookingServiceError::ValidationError(_))
        ));
        // Stay too long
        assert!(matches!(
            fx.bookings.create(&fx.guest, request(property.id, 5, 40, 1)).await,
            Err(BookingServiceError::Pricing(PricingError::StayTooLong { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unlisted_property_not_bookable() {
        let fx = Fixture::new().await;
        let draft = fx.draft_property(fx.host.id).await;
        assert!(matches!(
            fx.bookings.create(&fx.guest, request(draft.id, 5, 6, 1)).await,
            Err(BookingServiceError::PropertyNotFound)
        ));
    }

    #[tokio::test]
    async fn test_host_and_guest_transitions() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 2).await;
        let booking = fx
            .bookings
            .create(&fx.guest, request(property.id, 5, 7, 1))
            .await
            .unwrap();

        // Guests cannot confirm
        assert!(matches!(
            fx.bookings.transition(&fx.guest, booking.id, BookingStatus::Confirmed).await,
            Err(BookingServiceError::Forbidden(_))
        ));

        let confirmed = fx
            .bookings
            .transition(&fx.host, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        // Not in the table
        assert!(matches!(
            fx.bookings.transition(&fx.host, booking.id, BookingStatus::Declined).await,
            Err(BookingServiceError::InvalidTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Declined
            })
        ));

        let cancelled = fx.bookings.cancel(&fx.guest, booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // Terminal
        assert!(matches!(
            fx.bookings.transition(&fx.admin, booking.id, BookingStatus::Confirmed).await,
            Err(BookingServiceError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_strangers_cannot_see_or_touch_booking() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 2).await;
        let booking = fx
            .bookings
            .create(&fx.guest, request(property.id, 5, 7, 1))
            .await
            .unwrap();
        let stranger = fx.create_guest("stranger@example.com").await;

        assert!(matches!(
            fx.bookings.get(&stranger, booking.id).await,
            Err(BookingServiceError::NotFound)
        ));
        assert!(matches!(
            fx.bookings.cancel(&stranger, booking.id).await,
            Err(BookingServiceError::NotFound)
        ));
        assert!(fx.bookings.get(&fx.host, booking.id).await.is_ok());
        assert!(fx.bookings.get(&fx.admin, booking.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_lists_and_stats() {
        let fx = Fixture::new().await;
        let property = fx.listed_property(fx.host.id, "Goa", 1000, 3).await;
        let first = fx
            .bookings
            .create(&fx.guest, request(property.id, 5, 6, 1))
            .await
            .unwrap();
        fx.bookings
            .create(&fx.guest, request(property.id, 8, 9, 1))
            .await
            .unwrap();
        fx.bookings
            .transition(&fx.host, first.id, BookingStatus::Confirmed)
            .await
            .unwrap();

        let params = ListParams::default();
        assert_eq!(fx.bookings.list_for_guest(&fx.guest, &params).await.unwrap().total, 2);
        assert_eq!(
            fx.bookings
                .list_for_host(&fx.host, Some(BookingStatus::Pending), &params)
                .await
                .unwrap()
                .total,
            1
        );
        assert_eq!(fx.bookings.list_all(None, &params).await.unwrap().total, 2);

        let stats = fx.bookings.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.revenue, first.total);
    }
}
