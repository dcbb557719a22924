//! Host onboarding wizard
//!
//! A draft property moves through the wizard one step at a time:
//!
//! ```text
//! basics -> location -> capacity -> amenities -> rules -> photos -> review
//! ```
//!
//! `onboarding_step` on the property is the next step still to be done.
//! Submitting that step advances the cursor, submitting an earlier step edits
//! it in place, and submitting a later one is rejected. Only a property at
//! `review` can be published.

use crate::db::repositories::{PhotoRepository, PropertyRepository};
use crate::models::{
    HouseRules, OnboardingStep, Property, PropertyPhoto, PropertyStatus, PropertyType, User,
};
use crate::services::property::{PropertyService, PropertyServiceError};
use crate::services::storage::{PhotoStorage, UploadedFile};
use anyhow::Context;
use chrono::{NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_AMENITIES: usize = 50;
const MAX_AMENITY_LEN: usize = 60;
const MAX_RULES_LEN: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Property not found")]
    NotFound,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Step '{submitted}' cannot be submitted before '{current}'")]
    StepOutOfOrder {
        current: OnboardingStep,
        submitted: OnboardingStep,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Listing is incomplete, next step is '{0}'")]
    NotReady(OnboardingStep),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<PropertyServiceError> for OnboardingError {
    fn from(err: PropertyServiceError) -> Self {
        match err {
            PropertyServiceError::NotFound => OnboardingError::NotFound,
            PropertyServiceError::ValidationError(msg) => OnboardingError::ValidationError(msg),
            PropertyServiceError::InternalError(e) => OnboardingError::InternalError(e),
        }
    }
}

/// Data for one wizard step, tagged by `step`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum StepInput {
    Basics {
        name: String,
        property_type: PropertyType,
        #[serde(default)]
        description: String,
    },
    Location {
        address_line: String,
        city: String,
        #[serde(default)]
        state: String,
        country: String,
        #[serde(default)]
        postal_code: String,
    },
    Capacity {
        total_rooms: i64,
        max_guests: i64,
        base_price: i64,
    },
    Amenities {
        amenities: Vec<String>,
    },
    Rules(HouseRules),
    /// Confirms the uploaded photos
    Photos,
}

impl StepInput {
    pub fn step(&self) -> OnboardingStep {
        match self {
            StepInput::Basics { .. } => OnboardingStep::Basics,
            StepInput::Location { .. } => OnboardingStep::Location,
            StepInput::Capacity { .. } => OnboardingStep::Capacity,
            StepInput::Amenities { .. } => OnboardingStep::Amenities,
            StepInput::Rules(_) => OnboardingStep::Rules,
            StepInput::Photos => OnboardingStep::Photos,
        }
    }
}

/// Outcome of a multi-file upload: stored photos and per-file failures
#[derive(Debug, Default, Serialize)]
pub struct PhotoUploadResult {
    pub photos: Vec<PropertyPhoto>,
    pub failed: Vec<String>,
}

pub struct OnboardingService {
    property_repo: Arc<dyn PropertyRepository>,
    photo_repo: Arc<dyn PhotoRepository>,
    properties: Arc<PropertyService>,
    storage: Arc<PhotoStorage>,
    max_photos: i64,
}

impl OnboardingService {
    pub fn new(
        property_repo: Arc<dyn PropertyRepository>,
        photo_repo: Arc<dyn PhotoRepository>,
        properties: Arc<PropertyService>,
        storage: Arc<PhotoStorage>,
        max_photos: i64,
    ) -> Self {
        Self {
            property_repo,
            photo_repo,
            properties,
            storage,
            max_photos,
        }
    }

    /// Create an empty draft at the first step
    pub async fn start_listing(&self, actor: &User) -> Result<Property, OnboardingError> {
        if !actor.can_host() {
            return Err(OnboardingError::Forbidden(
                "Only hosts can create listings".to_string(),
            ));
        }

        let property = self
            .property_repo
            .create(&Property::draft(actor.id))
            .await
            .context("Failed to create draft property")?;

        tracing::info!("Host {} started listing {}", actor.id, property.id);
        Ok(property)
    }

    /// A host's own property, with the same access rule as editing
    pub async fn get_owned(&self, actor: &User, id: i64) -> Result<Property, OnboardingError> {
        let property = self.properties.get(id).await?;
        if !actor.can_manage(property.host_id) {
            // Other hosts' drafts are not revealed
            return Err(OnboardingError::NotFound);
        }
        Ok(property)
    }

    pub async fn list_owned(&self, actor: &User) -> Result<Vec<Property>, OnboardingError> {
        Ok(self.properties.list_by_host(actor.id).await?)
    }

    /// Apply one wizard step
    pub async fn submit_step(
        &self,
        actor: &User,
        id: i64,
        input: StepInput,
    ) -> Result<Property, OnboardingError> {
        let mut property = self.get_owned(actor, id).await?;
        let current = property.onboarding_step;
        let submitted = input.step();

        if submitted > current {
            return Err(OnboardingError::StepOutOfOrder { current, submitted });
        }

        self.apply_step(&mut property, input).await?;
        if submitted == current {
            property.onboarding_step = current.next();
        }
        property.updated_at = Utc::now();

        let property = self
            .property_repo
            .update(&property)
            .await
            .context("Failed to save onboarding step")?;
        self.properties.invalidate(id).await;

        tracing::debug!("Property {} step {} saved, next {}", id, submitted, property.onboarding_step);
        Ok(property)
    }

    /// Make a completed listing searchable and bookable
    pub async fn publish(&self, actor: &User, id: i64) -> Result<Property, OnboardingError> {
        let property = self.get_owned(actor, id).await?;
        if !property.is_complete() {
            return Err(OnboardingError::NotReady(property.onboarding_step));
        }
        self.set_status(actor, property, PropertyStatus::Listed).await
    }

    /// Take a live listing down; it can be published again later
    pub async fn unlist(&self, actor: &User, id: i64) -> Result<Property, OnboardingError> {
        let property = self.get_owned(actor, id).await?;
        if property.status != PropertyStatus::Listed {
            return Err(OnboardingError::InvalidState(format!(
                "Only listed properties can be unlisted (status is {})",
                property.status
            )));
        }
        self.set_status(actor, property, PropertyStatus::Unlisted).await
    }

    /// Listing status change requested from the admin dashboard
    pub async fn change_status(
        &self,
        actor: &User,
        id: i64,
        status: PropertyStatus,
    ) -> Result<Property, OnboardingError> {
        match status {
            PropertyStatus::Listed => self.publish(actor, id).await,
            PropertyStatus::Unlisted => self.unlist(actor, id).await,
            PropertyStatus::Draft => Err(OnboardingError::ValidationError(
                "A property cannot be moved back to draft".to_string(),
            )),
        }
    }

    /// Store uploaded photos. Files that fail validation or storage are
    /// reported in `failed` and the rest are kept.
    pub async fn add_photos(
        &self,
        actor: &User,
        id: i64,
        files: Vec<UploadedFile>,
    ) -> Result<PhotoUploadResult, OnboardingError> {
        let property = self.get_owned(actor, id).await?;
        if files.is_empty() {
            return Err(OnboardingError::ValidationError("No files provided".to_string()));
        }

        let mut count = self
            .photo_repo
            .count_by_property(property.id)
            .await
            .context("Failed to count photos")?;
        let mut result = PhotoUploadResult::default();
        let limit_reached =
            |name: &str| format!("{}: photo limit of {} reached", name, self.max_photos);

        for file in files {
            // Skips storing files that cannot fit; the insert makes the final call
            if count >= self.max_photos {
                result.failed.push(limit_reached(&file.filename));
                continue;
            }

            let stored = match self.storage.store(&file).await {
                Ok(stored) => stored,
                Err(e) => {
                    result.failed.push(format!("{}: {}", file.filename, e));
                    continue;
                }
            };

            let failure = match self
                .photo_repo
                .create(property.id, &stored.filename, &stored.url, self.max_photos)
                .await
            {
                Ok(Some(photo)) => {
                    count += 1;
                    result.photos.push(photo);
                    continue;
                }
                Ok(None) => {
                    // Another upload filled the remaining slots
                    count = self.max_photos;
                    limit_reached(&file.filename)
                }
                Err(e) => {
                    tracing::warn!("Failed to record photo {} for property {}: {}", stored.filename, property.id, e);
                    format!("{}: could not be saved", file.filename)
                }
            };
            if let Err(e) = self.storage.remove(&stored.filename).await {
                tracing::warn!("Failed to remove orphaned photo {}: {}", stored.filename, e);
            }
            result.failed.push(failure);
        }

        if !result.failed.is_empty() {
            tracing::warn!(
                "Property {}: {} photo(s) stored, {} failed",
                property.id,
                result.photos.len(),
                result.failed.len()
            );
        }
        if !result.photos.is_empty() {
            self.properties.invalidate(property.id).await;
        }
        Ok(result)
    }

    /// Remove a photo record and its file
    pub async fn delete_photo(
        &self,
        actor: &User,
        property_id: i64,
        photo_id: i64,
    ) -> Result<(), OnboardingError> {
        let property = self.get_owned(actor, property_id).await?;
        let photo = self
            .photo_repo
            .get_by_id(photo_id)
            .await
            .context("Failed to get photo")?
            .filter(|p| p.property_id == property.id)
            .ok_or(OnboardingError::NotFound)?;

        if property.onboarding_step > OnboardingStep::Photos {
            let count = self
                .photo_repo
                .count_by_property(property.id)
                .await
                .context("Failed to count photos")?;
            if count <= 1 {
                return Err(OnboardingError::InvalidState(
                    "A completed listing must keep at least one photo".to_string(),
                ));
            }
        }

        self.photo_repo
            .delete(photo.id)
            .await
            .context("Failed to delete photo")?;
        if let Err(e) = self.storage.remove(&photo.filename).await {
            tracing::warn!("Photo {} deleted but file removal failed: {}", photo.id, e);
        }
        self.properties.invalidate(property.id).await;
        Ok(())
    }

    async fn set_status(
        &self,
        actor: &User,
        mut property: Property,
        status: PropertyStatus,
    ) -> Result<Property, OnboardingError> {
        property.status = status;
        property.updated_at = Utc::now();
        let property = self
            .property_repo
            .update(&property)
            .await
            .context("Failed to update property status")?;
        self.properties.invalidate(property.id).await;

        tracing::info!("Property {} is now {} (by user {})", property.id, status, actor.id);
        Ok(property)
    }

    async fn apply_step(&self, property: &mut Property, input: StepInput) -> Result<(), OnboardingError> {
        match input {
            StepInput::Basics {
                name,
                property_type,
                description,
            } => {
                let name = required("Name", &name)?;
                if name.chars().count() > MAX_NAME_LEN {
                    return Err(invalid(format!("Name cannot exceed {} characters", MAX_NAME_LEN)));
                }
                if description.chars().count() > MAX_DESCRIPTION_LEN {
                    return Err(invalid(format!(
                        "Description cannot exceed {} characters",
                        MAX_DESCRIPTION_LEN
                    )));
                }
                property.name = name;
                property.property_type = property_type;
                property.description = description.trim().to_string();
            }
            StepInput::Location {
                address_line,
                city,
                state,
                country,
                postal_code,
            } => {
                property.address_line = required("Address", &address_line)?;
                property.city = required("City", &city)?;
                property.country = required("Country", &country)?;
                property.state = state.trim().to_string();
                property.postal_code = postal_code.trim().to_string();
            }
            StepInput::Capacity {
                total_rooms,
                max_guests,
                base_price,
            } => {
                if total_rooms < 1 {
                    return Err(invalid("A property needs at least one room"));
                }
                if max_guests < 1 {
                    return Err(invalid("Each room must allow at least one guest"));
                }
                if base_price <= 0 {
                    return Err(invalid("Nightly rate must be positive"));
                }
                property.total_rooms = total_rooms;
                property.max_guests = max_guests;
                property.base_price = base_price;
            }
            StepInput::Amenities { amenities } => {
                property.amenities = normalize_amenities(amenities)?;
            }
            StepInput::Rules(rules) => {
                validate_time("check_in_time", &rules.check_in_time)?;
                validate_time("check_out_time", &rules.check_out_time)?;
                let additional_rules = rules
                    .additional_rules
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty());
                if additional_rules
                    .as_ref()
                    .is_some_and(|r| r.chars().count() > MAX_RULES_LEN)
                {
                    return Err(invalid(format!(
                        "Additional rules cannot exceed {} characters",
                        MAX_RULES_LEN
                    )));
                }
                property.house_rules = HouseRules {
                    additional_rules,
                    ..rules
                };
            }
            StepInput::Photos => {
                let count = self
                    .photo_repo
                    .count_by_property(property.id)
                    .await
                    .context("Failed to count photos")?;
                if count == 0 {
                    return Err(invalid("Upload at least one photo"));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> OnboardingError {
    OnboardingError::ValidationError(msg.into())
}

fn required(field: &str, value: &str) -> Result<String, OnboardingError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{} cannot be empty", field)));
    }
    Ok(value.to_string())
}

fn validate_time(field: &str, value: &str) -> Result<(), OnboardingError> {
    if value.len() != 5 || NaiveTime::parse_from_str(value, "%H:%M").is_err() {
        return Err(invalid(format!("{} must be HH:MM", field)));
    }
    Ok(())
}

/// Trim, drop blanks and case-insensitive duplicates, keep first-seen order
fn normalize_amenities(amenities: Vec<String>) -> Result<Vec<String>, OnboardingError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for amenity in amenities {
        let amenity = amenity.trim().to_string();
        if amenity.is_empty() || !seen.insert(amenity.to_lowercase()) {
            continue;
        }
        if amenity.chars().count() > MAX_AMENITY_LEN {
            return Err(invalid(format!(
                "Amenity names cannot exceed {} characters",
                MAX_AMENITY_LEN
            )));
        }
        out.push(amenity);
    }
    if out.len() > MAX_AMENITIES {
        return Err(invalid(format!("At most {} amenities are allowed", MAX_AMENITIES)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Fixture;

    fn basics() -> StepInput {
        StepInput::Basics {
            name: "  Sea Breeze Villa ".to_string(),
            property_type: PropertyType::Villa,
            description: "Two minutes from Baga beach".to_string(),
        }
    }

    fn location() -> StepInput {
        StepInput::Location {
            address_line: "12 Beach Road".to_string(),
            city: "Goa".to_string(),
            state: "Goa".to_string(),
            country: "India".to_string(),
            postal_code: "403516".to_string(),
        }
    }

    fn capacity() -> StepInput {
        StepInput::Capacity {
            total_rooms: 4,
            max_guests: 2,
            base_price: 3200,
        }
    }

    fn png() -> UploadedFile {
        UploadedFile {
            filename: "pool.png".to_string(),
            content_type: "image/png".to_string(),
            data: b"\x89PNG\r\n".to_vec(),
        }
    }

    #[test]
    fn test_step_input_deserializes_by_tag() {
        let input: StepInput = serde_json::from_str(
            r#"{"step":"capacity","total_rooms":3,"max_guests":2,"base_price":1500}"#,
        )
        .unwrap();
        assert_eq!(input.step(), OnboardingStep::Capacity);

        let input: StepInput =
            serde_json::from_str(r#"{"step":"rules","check_in_time":"12:00","pets_allowed":true}"#).unwrap();
        match input {
            StepInput::Rules(rules) => {
                assert_eq!(rules.check_in_time, "12:00");
                assert_eq!(rules.check_out_time, "11:00");
                assert!(rules.pets_allowed);
            }
            other => panic!("unexpected {:?}", other),
        }

        let input: StepInput = serde_json::from_str(r#"{"step":"photos"}"#).unwrap();
        assert_eq!(input.step(), OnboardingStep::Photos);
    }

    #[test]
    fn test_normalize_amenities() {
        let out = normalize_amenities(vec![
            " WiFi ".to_string(),
            "wifi".to_string(),
            "".to_string(),
            "Pool".to_string(),
        ])
        .unwrap();
        assert_eq!(out, vec!["WiFi".to_string(), "Pool".to_string()]);

        let many = (0..51).map(|i| format!("a{}", i)).collect();
        assert!(normalize_amenities(many).is_err());
    }

    #[test]
    fn test_validate_time() {
        assert!(validate_time("t", "09:30").is_ok());
        assert!(validate_time("t", "23:59").is_ok());
        assert!(validate_time("t", "9:30").is_err());
        assert!(validate_time("t", "24:00").is_err());
        assert!(validate_time("t", "noon").is_err());
    }

    #[tokio::test]
    async fn test_guest_cannot_start_listing() {
        let fx = Fixture::new().await;
        assert!(matches!(
            fx.onboarding.start_listing(&fx.guest).await,
            Err(OnboardingError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_full_wizard_then_publish() {
        let fx = Fixture::new().await;
        let host = &fx.host;
        let draft = fx.onboarding.start_listing(host).await.unwrap();
        assert_eq!(draft.onboarding_step, OnboardingStep::Basics);
        assert_eq!(draft.status, PropertyStatus::Draft);

        let p = fx.onboarding.submit_step(host, draft.id, basics()).await.unwrap();
        assert_eq!(p.name, "Sea Breeze Villa");
        assert_eq!(p.onboarding_step, OnboardingStep::Location);

        fx.onboarding.submit_step(host, draft.id, location()).await.unwrap();
        fx.onboarding.submit_step(host, draft.id, capacity()).await.unwrap();
        fx.onboarding
            .submit_step(
                host,
                draft.id,
                StepInput::Amenities {
                    amenities: vec!["WiFi".into(), "Pool".into()],
                },
            )
            .await
            .unwrap();
        fx.onboarding
            .submit_step(host, draft.id, StepInput::Rules(HouseRules::default()))
            .await
            .unwrap();

        // Photos step needs an uploaded photo first
        assert!(matches!(
            fx.onboarding.submit_step(host, draft.id, StepInput::Photos).await,
            Err(OnboardingError::ValidationError(_))
        ));
        assert!(matches!(
            fx.onboarding.publish(host, draft.id).await,
            Err(OnboardingError::NotReady(OnboardingStep::Photos))
        ));

        let upload = fx.onboarding.add_photos(host, draft.id, vec![png()]).await.unwrap();
        assert_eq!(upload.photos.len(), 1);
        let p = fx.onboarding.submit_step(host, draft.id, StepInput::Photos).await.unwrap();
        assert_eq!(p.onboarding_step, OnboardingStep::Review);

        let listed = fx.onboarding.publish(host, draft.id).await.unwrap();
        assert_eq!(listed.status, PropertyStatus::Listed);

        let unlisted = fx.onboarding.unlist(host, draft.id).await.unwrap();
        assert_eq!(unlisted.status, PropertyStatus::Unlisted);
        let relisted = fx.onboarding.publish(host, draft.id).await.unwrap();
        assert_eq!(relisted.status, PropertyStatus::Listed);
    }

    #[tokio::test]
    async fn test_skipping_steps_rejected() {
        let fx = Fixture::new().await;
        let draft = fx.onboarding.start_listing(&fx.host).await.unwrap();

        let result = fx.onboarding.submit_step(&fx.host, draft.id, capacity()).await;
        assert!(matches!(
            result,
            Err(OnboardingError::StepOutOfOrder {
                current: OnboardingStep::Basics,
                submitted: OnboardingStep::Capacity
            })
        ));
    }

    #[tokio::test]
    async fn test_resubmitting_earlier_step_keeps_cursor() {
        let fx = Fixture::new().await;
        let draft = fx.onboarding.start_listing(&fx.host).await.unwrap();
        fx.onboarding.submit_step(&fx.host, draft.id, basics()).await.unwrap();
        fx.onboarding.submit_step(&fx.host, draft.id, location()).await.unwrap();

        let edited = fx
            .onboarding
            .submit_step(
                &fx.host,
                draft.id,
                StepInput::Basics {
                    name: "Renamed".to_string(),
                    property_type: PropertyType::Homestay,
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.name, "Renamed");
        assert_eq!(edited.onboarding_step, OnboardingStep::Capacity);
    }

    #[tokio::test]
    async fn test_step_validation() {
        let fx = Fixture::new().await;
        let draft = fx.onboarding.start_listing(&fx.host).await.unwrap();

        let result = fx
            .onboarding
            .submit_step(
                &fx.host,
                draft.id,
                StepInput::Basics {
                    name: "   ".to_string(),
                    property_type: PropertyType::Hotel,
                    description: String::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(OnboardingError::ValidationError(_))));

        let result = fx
            .onboarding
            .submit_step(
                &fx.host,
                draft.id,
                StepInput::Basics {
                    name: "x".repeat(121),
                    property_type: PropertyType::Hotel,
                    description: String::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(OnboardingError::ValidationError(_))));

        fx.onboarding.submit_step(&fx.host, draft.id, basics()).await.unwrap();
        fx.onboarding.submit_step(&fx.host, draft.id, location()).await.unwrap();
        let result = fx
            .onboarding
            .submit_step(
                &fx.host,
                draft.id,
                StepInput::Capacity {
                    total_rooms: 0,
                    max_guests: 2,
                    base_price: 100,
                },
            )
            .await;
        assert!(matches!(result, Err(OnboardingError::ValidationError(_))));

        // Failed validation leaves the cursor where it was
        let property = fx.onboarding.get_owned(&fx.host, draft.id).await.unwrap();
        assert_eq!(property.onboarding_step, OnboardingStep::Capacity);
    }

    #[tokio::test]
    async fn test_other_host_cannot_edit() {
        let fx = Fixture::new().await;
        let other = fx.create_host("other-host@example.com").await;
        let draft = fx.onboarding.start_listing(&fx.host).await.unwrap();

        assert!(matches!(
            fx.onboarding.submit_step(&other, draft.id, basics()).await,
            Err(OnboardingError::NotFound)
        ));
        // Admins may edit any listing
        assert!(fx.onboarding.submit_step(&fx.admin, draft.id, basics()).await.is_ok());
    }

    #[tokio::test]
    async fn test_photo_upload_partial_failure_and_cap() {
        let fx = Fixture::new().await;
        let draft = fx.onboarding.start_listing(&fx.host).await.unwrap();

        let mut bad = png();
        bad.filename = "doc.pdf".to_string();
        bad.content_type = "application/pdf".to_string();

        let result = fx
            .onboarding
            .add_photos(&fx.host, draft.id, vec![png(), bad, png()])
            .await
            .unwrap();
        assert_eq!(result.photos.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].starts_with("doc.pdf"));

        // Fixture caps photos at 3
        let result = fx
            .onboarding
            .add_photos(&fx.host, draft.id, vec![png(), png()])
            .await
            .unwrap();
        assert_eq!(result.photos.len(), 1);
        assert_eq!(result.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_respect_cap() {
        let fx = Arc::new(Fixture::new().await);
        let draft = fx.onboarding.start_listing(&fx.host).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let fx = fx.clone();
            let id = draft.id;
            handles.push(tokio::spawn(async move {
                fx.onboarding
                    .add_photos(&fx.host, id, vec![png(), png()])
                    .await
                    .unwrap()
            }));
        }
        let mut stored = 0;
        for handle in handles {
            stored += handle.await.unwrap().photos.len();
        }

        assert_eq!(stored, 3);
        let detail = fx.properties.get_detail(Some(&fx.host), draft.id).await.unwrap();
        assert_eq!(detail.photos.len(), 3);
        // Rejected uploads leave no files behind
        assert_eq!(std::fs::read_dir(fx.storage.root()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_delete_photo() {
        let fx = Fixture::new().await;
        let draft = fx.onboarding.start_listing(&fx.host).await.unwrap();
        let upload = fx.onboarding.add_photos(&fx.host, draft.id, vec![png()]).await.unwrap();
        let photo = &upload.photos[0];
        let path = fx.storage.root().join(&photo.filename);
        assert!(path.exists());

        fx.onboarding.delete_photo(&fx.host, draft.id, photo.id).await.unwrap();
        assert!(!path.exists());
        assert!(matches!(
            fx.onboarding.delete_photo(&fx.host, draft.id, photo.id).await,
            Err(OnboardingError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_completed_listing_keeps_last_photo() {
        let fx = Fixture::new().await;
        let listed = fx.listed_property(fx.host.id, "Udaipur", 4000, 2).await;
        let upload = fx.onboarding.add_photos(&fx.host, listed.id, vec![png()]).await.unwrap();

        assert!(matches!(
            fx.onboarding.delete_photo(&fx.host, listed.id, upload.photos[0].id).await,
            Err(OnboardingError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_change_status() {
        let fx = Fixture::new().await;
        let listed = fx.listed_property(fx.host.id, "Kochi", 2000, 2).await;

        let p = fx
            .onboarding
            .change_status(&fx.admin, listed.id, PropertyStatus::Unlisted)
            .await
            .unwrap();
        assert_eq!(p.status, PropertyStatus::Unlisted);

        assert!(matches!(
            fx.onboarding.change_status(&fx.admin, listed.id, PropertyStatus::Draft).await,
            Err(OnboardingError::ValidationError(_))
        ));
        assert!(matches!(
            fx.onboarding.unlist(&fx.admin, listed.id).await,
            Err(OnboardingError::InvalidState(_))
        ));
    }
}
