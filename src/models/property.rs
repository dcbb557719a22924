//! Property model
//!
//! A property is built up step by step by its host (see `OnboardingStep`) and
//! becomes bookable once it is published.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::review::RatingSummary;

/// A bookable listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    /// Owning host
    pub host_id: i64,
    pub name: String,
    pub property_type: PropertyType,
    pub description: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    /// Nightly base rate per room, whole rupees
    pub base_price: i64,
    pub total_rooms: i64,
    /// Maximum guests per room
    pub max_guests: i64,
    pub amenities: Vec<String>,
    pub house_rules: HouseRules,
    /// Next wizard step the host still has to complete
    pub onboarding_step: OnboardingStep,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// A fresh draft owned by `host_id`
    pub fn draft(host_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            host_id,
            name: String::new(),
            property_type: PropertyType::default(),
            description: String::new(),
            address_line: String::new(),
            city: String::new(),
            state: String::new(),
            country: String::new(),
            postal_code: String::new(),
            base_price: 0,
            total_rooms: 0,
            max_guests: 0,
            amenities: Vec::new(),
            house_rules: HouseRules::default(),
            onboarding_step: OnboardingStep::Basics,
            status: PropertyStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_listed(&self) -> bool {
        self.status == PropertyStatus::Listed
    }

    /// All wizard steps are done and the listing can go live
    pub fn is_complete(&self) -> bool {
        self.onboarding_step == OnboardingStep::Review
    }
}

/// Kind of property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[default]
    Hotel,
    Apartment,
    Resort,
    Villa,
    Homestay,
    GuestHouse,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropertyType::Hotel => "hotel",
            PropertyType::Apartment => "apartment",
            PropertyType::Resort => "resort",
            PropertyType::Villa => "villa",
            PropertyType::Homestay => "homestay",
            PropertyType::GuestHouse => "guest_house",
        };
        f.write_str(s)
    }
}

impl FromStr for PropertyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "hotel" => Ok(PropertyType::Hotel),
            "apartment" => Ok(PropertyType::Apartment),
            "resort" => Ok(PropertyType::Resort),
            "villa" => Ok(PropertyType::Villa),
            "homestay" => Ok(PropertyType::Homestay),
            "guest_house" => Ok(PropertyType::GuestHouse),
            _ => Err(anyhow::anyhow!("Invalid property type: {}", s)),
        }
    }
}

/// Listing visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropertyStatus {
    /// Being set up by the host, not searchable
    #[default]
    Draft,
    /// Searchable and bookable
    Listed,
    /// Taken down by the host or an admin
    Unlisted,
}

impl fmt::Display for PropertyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyStatus::Draft => write!(f, "draft"),
            PropertyStatus::Listed => write!(f, "listed"),
            PropertyStatus::Unlisted => write!(f, "unlisted"),
        }
    }
}

impl FromStr for PropertyStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PropertyStatus::Draft),
            "listed" => Ok(PropertyStatus::Listed),
            "unlisted" => Ok(PropertyStatus::Unlisted),
            _ => Err(anyhow::anyhow!("Invalid property status: {}", s)),
        }
    }
}

/// Steps of the host listing wizard, in the order they must be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnboardingStep {
    #[default]
    Basics,
    Location,
    Capacity,
    Amenities,
    Rules,
    Photos,
    /// Terminal step: everything is filled in, waiting to be published
    Review,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 7] = [
        OnboardingStep::Basics,
        OnboardingStep::Location,
        OnboardingStep::Capacity,
        OnboardingStep::Amenities,
        OnboardingStep::Rules,
        OnboardingStep::Photos,
        OnboardingStep::Review,
    ];

    /// Step following this one. `Review` is the last step.
    pub fn next(self) -> OnboardingStep {
        match self {
            OnboardingStep::Basics => OnboardingStep::Location,
            OnboardingStep::Location => OnboardingStep::Capacity,
            OnboardingStep::Capacity => OnboardingStep::Amenities,
            OnboardingStep::Amenities => OnboardingStep::Rules,
            OnboardingStep::Rules => OnboardingStep::Photos,
            OnboardingStep::Photos | OnboardingStep::Review => OnboardingStep::Review,
        }
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OnboardingStep::Basics => "basics",
            OnboardingStep::Location => "location",
            OnboardingStep::Capacity => "capacity",
            OnboardingStep::Amenities => "amenities",
            OnboardingStep::Rules => "rules",
            OnboardingStep::Photos => "photos",
            OnboardingStep::Review => "review",
        };
        f.write_str(s)
    }
}

impl FromStr for OnboardingStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OnboardingStep::ALL
            .into_iter()
            .find(|step| step.to_string() == s.to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Invalid onboarding step: {}", s))
    }
}

/// House rules shown to guests before booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseRules {
    /// Earliest check-in, `HH:MM`
    pub check_in_time: String,
    /// Latest check-out, `HH:MM`
    pub check_out_time: String,
    pub pets_allowed: bool,
    pub smoking_allowed: bool,
    pub parties_allowed: bool,
    pub additional_rules: Option<String>,
}

impl Default for HouseRules {
    fn default() -> Self {
        Self {
            check_in_time: "14:00".to_string(),
            check_out_time: "11:00".to_string(),
            pets_allowed: false,
            smoking_allowed: false,
            parties_allowed: false,
            additional_rules: None,
        }
    }
}

/// Photo attached to a property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyPhoto {
    pub id: i64,
    pub property_id: i64,
    /// Stored filename under the upload directory
    pub filename: String,
    /// Public URL the photo is served from
    pub url: String,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// Property with its photos and rating summary, as shown on the detail page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub photos: Vec<PropertyPhoto>,
    pub rating: RatingSummary,
}

/// Search criteria for listed properties
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Guests per room the property must accommodate
    pub guests: Option<i64>,
    /// Stay window; when set, only properties with `rooms` free are returned
    pub stay: Option<(NaiveDate, NaiveDate)>,
    pub rooms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_advance_in_order() {
        let mut step = OnboardingStep::Basics;
        let mut visited = vec![step];
        while step != OnboardingStep::Review {
            step = step.next();
            visited.push(step);
        }
        assert_eq!(visited, OnboardingStep::ALL.to_vec());
        assert_eq!(OnboardingStep::Review.next(), OnboardingStep::Review);
    }

    #[test]
    fn test_step_ordering() {
        assert!(OnboardingStep::Basics < OnboardingStep::Location);
        assert!(OnboardingStep::Photos < OnboardingStep::Review);
    }

    #[test]
    fn test_step_from_str() {
        assert_eq!(OnboardingStep::from_str("Rules").unwrap(), OnboardingStep::Rules);
        assert!(OnboardingStep::from_str("payment").is_err());
    }

    #[test]
    fn test_property_type_round_trip_names() {
        assert_eq!(PropertyType::GuestHouse.to_string(), "guest_house");
        assert_eq!(PropertyType::from_str("guest-house").unwrap(), PropertyType::GuestHouse);
        assert!(PropertyType::from_str("castle").is_err());
    }

    #[test]
    fn test_draft_defaults() {
        let property = Property::draft(7);
        assert_eq!(property.host_id, 7);
        assert_eq!(property.status, PropertyStatus::Draft);
        assert!(!property.is_complete());
        assert!(!property.is_listed());
    }

    #[test]
    fn test_house_rules_partial_json() {
        let rules: HouseRules = serde_json::from_str(r#"{"pets_allowed": true}"#).unwrap();
        assert!(rules.pets_allowed);
        assert_eq!(rules.check_in_time, "14:00");
    }
}
