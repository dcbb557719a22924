//! Services layer - Business logic
//!
//! Services implement the marketplace rules on top of the repositories:
//! validation, authorization by role and ownership, cache invalidation and
//! notifications.

pub mod admin;
pub mod booking;
pub mod email;
pub mod onboarding;
pub mod password;
pub mod pricing;
pub mod property;
pub mod rate_limiter;
pub mod review;
pub mod storage;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

pub use admin::{AdminService, AdminServiceError, DashboardStats};
pub use booking::{BookingQuote, BookingService, BookingServiceError};
pub use email::{create_mailer, generate_verification_code, Mailer, Notifier};
pub use onboarding::{OnboardingError, OnboardingService, PhotoUploadResult, StepInput};
pub use password::{hash_password, verify_password};
pub use pricing::{parse_stay_date, PricingError, PricingPolicy, StayQuote};
pub use property::{PropertyService, PropertyServiceError};
pub use rate_limiter::AuthRateLimiter;
pub use review::{CreateReviewInput, ReviewService, ReviewServiceError};
pub use storage::{PhotoStorage, UploadedFile};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxBookingRepository, SqlxPhotoRepository, SqlxPropertyRepository, SqlxReviewRepository,
    SqlxSessionRepository, SqlxUserRepository, SqlxVerificationRepository,
};
use crate::db::DynDatabasePool;
use std::sync::Arc;

/// Every service, wired to one database pool
#[derive(Clone)]
pub struct Services {
    pub users: Arc<UserService>,
    pub properties: Arc<PropertyService>,
    pub onboarding: Arc<OnboardingService>,
    pub bookings: Arc<BookingService>,
    pub reviews: Arc<ReviewService>,
    pub admin: Arc<AdminService>,
    pub rate_limiter: Arc<AuthRateLimiter>,
}

impl Services {
    pub fn new(
        pool: DynDatabasePool,
        config: &Config,
        mailer: Arc<dyn Mailer>,
        cache: Arc<MemoryCache>,
    ) -> Self {
        let notifier = Notifier::new(mailer);

        let photo_repo = SqlxPhotoRepository::boxed(pool.clone());
        let property_repo = SqlxPropertyRepository::boxed(pool.clone());
        let review_repo = SqlxReviewRepository::boxed(pool.clone());

        let users = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxVerificationRepository::boxed(pool.clone()),
            notifier.clone(),
            config.auth.clone(),
        ));
        let properties = Arc::new(PropertyService::new(
            property_repo.clone(),
            photo_repo.clone(),
            review_repo.clone(),
            cache,
        ));
        let onboarding = Arc::new(OnboardingService::new(
            property_repo,
            photo_repo,
            properties.clone(),
            Arc::new(
                PhotoStorage::new(config.upload.clone()).with_public_url(&config.server.public_url),
            ),
            config.upload.max_photos_per_property,
        ));
        let bookings = Arc::new(BookingService::new(
            SqlxBookingRepository::boxed(pool),
            properties.clone(),
            PricingPolicy::from(&config.booking),
            notifier,
        ));
        let reviews = Arc::new(ReviewService::new(review_repo, properties.clone()));
        let admin = Arc::new(AdminService::new(
            users.clone(),
            properties.clone(),
            bookings.clone(),
        ));

        Self {
            users,
            properties,
            onboarding,
            bookings,
            reviews,
            admin,
            rate_limiter: Arc::new(AuthRateLimiter::new()),
        }
    }
}
