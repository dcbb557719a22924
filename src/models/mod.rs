//! Data models
//!
//! Entities persisted by the repositories plus the inputs and summaries the
//! services pass around.

mod booking;
mod pagination;
mod property;
mod review;
mod session;
mod user;

pub use booking::{Booking, BookingStats, BookingStatus, CreateBookingInput, NewBooking};
pub(crate) use booking::default_rooms;
pub use pagination::{ListParams, PagedResult};
pub use property::{
    HouseRules, OnboardingStep, Property, PropertyDetail, PropertyPhoto, PropertyStatus,
    PropertyType, SearchFilters,
};
pub use review::{RatingSummary, Review, ReviewWithAuthor};
pub use session::{EmailVerification, Session};
pub use user::{CreateUserInput, UpdateProfileInput, User, UserRole, UserStatus};
