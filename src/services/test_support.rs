//! Shared fixture for service tests: an in-memory database with an admin,
//! a host and a guest already registered.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::cache::{create_cache, MemoryCache};
use crate::config::Config;
use crate::db::repositories::{PropertyRepository, SqlxPropertyRepository};
use crate::db::{create_test_pool, migrations, DynDatabasePool};
use crate::models::{OnboardingStep, Property, PropertyStatus, PropertyType, User};
use crate::services::email::RecordingMailer;
use crate::services::{
    AdminService, BookingService, OnboardingService, PhotoStorage, PropertyService, RegisterInput,
    ReviewService, Services, UserService,
};

pub(crate) struct Fixture {
    pub pool: DynDatabasePool,
    pub cache: Arc<MemoryCache>,
    pub mailer: Arc<RecordingMailer>,
    pub storage: PhotoStorage,
    pub users: Arc<UserService>,
    pub properties: Arc<PropertyService>,
    pub onboarding: Arc<OnboardingService>,
    pub bookings: Arc<BookingService>,
    pub reviews: Arc<ReviewService>,
    pub admin_service: Arc<AdminService>,
    pub admin: User,
    pub host: User,
    pub guest: User,
    _upload_dir: TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let upload_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.upload.path = upload_dir.path().join("uploads");
        config.upload.max_photos_per_property = 3;

        let cache = create_cache(&config.cache);
        let mailer = Arc::new(RecordingMailer::default());
        let services = Services::new(pool.clone(), &config, mailer.clone(), cache.clone());

        let admin = register(&services.users, "admin@example.com").await;
        let host = register(&services.users, "host@example.com").await;
        let host = services.users.become_host(&host).await.expect("Failed to become host");
        let guest = register(&services.users, "guest@example.com").await;

        Self {
            pool,
            cache,
            mailer,
            storage: PhotoStorage::new(config.upload.clone()),
            users: services.users,
            properties: services.properties,
            onboarding: services.onboarding,
            bookings: services.bookings,
            reviews: services.reviews,
            admin_service: services.admin,
            admin,
            host,
            guest,
            _upload_dir: upload_dir,
        }
    }

    pub async fn create_guest(&self, email: &str) -> User {
        register(&self.users, email).await
    }

    pub async fn create_host(&self, email: &str) -> User {
        let user = register(&self.users, email).await;
        self.users.become_host(&user).await.expect("Failed to become host")
    }

    pub async fn draft_property(&self, host_id: i64) -> Property {
        SqlxPropertyRepository::new(self.pool.clone())
            .create(&Property::draft(host_id))
            .await
            .expect("Failed to create draft")
    }

    /// A property that has finished onboarding and is live
    pub async fn listed_property(&self, host_id: i64, city: &str, price: i64, rooms: i64) -> Property {
        let mut property = Property::draft(host_id);
        property.name = format!("Stay in {}", city);
        property.property_type = PropertyType::Hotel;
        property.address_line = "1 MG Road".to_string();
        property.city = city.to_string();
        property.country = "India".to_string();
        property.base_price = price;
        property.total_rooms = rooms;
        property.max_guests = 2;
        property.onboarding_step = OnboardingStep::Review;
        property.status = PropertyStatus::Listed;

        SqlxPropertyRepository::new(self.pool.clone())
            .create(&property)
            .await
            .expect("Failed to create listed property")
    }

    /// Notifications are sent from spawned tasks
    pub async fn wait_for_emails(&self, count: usize) {
        for _ in 0..100 {
            if self.mailer.sent.lock().await.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} email(s)", count);
    }
}

async fn register(users: &UserService, email: &str) -> User {
    users
        .register(RegisterInput {
            email: email.to_string(),
            password: "password123".to_string(),
            full_name: None,
            phone: None,
        })
        .await
        .expect("Failed to register user")
}
