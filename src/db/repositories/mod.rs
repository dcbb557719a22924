//! Database repositories
//!
//! One trait per entity with a `Sqlx*Repository` implementation that
//! dispatches to SQLite or MySQL queries based on the pool's driver.

pub mod booking;
pub mod photo;
pub mod property;
pub mod review;
pub mod session;
pub mod user;
pub mod verification;

pub use booking::{BookingRepository, InsertOutcome, SqlxBookingRepository};
pub use photo::{PhotoRepository, SqlxPhotoRepository};
pub use property::{PropertyRepository, SqlxPropertyRepository};
pub use review::{ReviewRepository, SqlxReviewRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use verification::{SqlxVerificationRepository, VerificationRepository};
