//! Property repository
//!
//! Database operations for listings, including guest search with optional
//! room availability over a date range.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{
    HouseRules, ListParams, OnboardingStep, Property, PropertyStatus, PropertyType, SearchFilters,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const PROPERTY_COLUMNS: &str = "id, host_id, name, property_type, description, address_line, city, state, country, postal_code, base_price, total_rooms, max_guests, amenities, house_rules, onboarding_step, status, created_at, updated_at";

/// Filters applied to listed properties. Every optional filter is written as
/// `(? IS NULL OR ...)` so the statement text stays fixed; see `bind_search!`
/// for the matching bind order. Free rooms are counted on the busiest night
/// of the stay, the same way as `BookingRepository::booked_rooms`.
const SEARCH_WHERE: &str = r#"
    WHERE status = 'listed'
      AND (? IS NULL OR LOWER(city) = LOWER(?))
      AND (? IS NULL OR property_type = ?)
      AND (? IS NULL OR base_price >= ?)
      AND (? IS NULL OR base_price <= ?)
      AND (? IS NULL OR max_guests * ? >= ?)
      AND total_rooms >= ?
      AND (? IS NULL OR total_rooms - COALESCE((
            SELECT SUM(b2.rooms) AS held
            FROM bookings b1
            JOIN bookings b2 ON b2.property_id = b1.property_id
                AND b2.status IN ('pending', 'confirmed')
                AND b2.check_in <= CASE WHEN b1.check_in > ? THEN b1.check_in ELSE ? END
                AND b2.check_out > CASE WHEN b1.check_in > ? THEN b1.check_in ELSE ? END
            WHERE b1.property_id = properties.id
              AND b1.status IN ('pending', 'confirmed')
              AND b1.check_in < ?
              AND b1.check_out > ?
            GROUP BY b1.id
            ORDER BY held DESC
            LIMIT 1
          ), 0) >= ?)
"#;

macro_rules! bind_search {
    ($query:expr, $filters:expr) => {{
        let f: &SearchFilters = $filters;
        let city = f.city.as_deref();
        let property_type = f.property_type.map(|t| t.to_string());
        let (check_in, check_out) = match f.stay {
            Some((check_in, check_out)) => (Some(check_in), Some(check_out)),
            None => (None, None),
        };
        $query
            .bind(city)
            .bind(city)
            .bind(property_type.clone())
            .bind(property_type)
            .bind(f.min_price)
            .bind(f.min_price)
            .bind(f.max_price)
            .bind(f.max_price)
            .bind(f.guests)
            .bind(f.rooms)
            .bind(f.guests)
            .bind(f.rooms)
            .bind(check_in)
            .bind(check_in)
            .bind(check_in)
            .bind(check_in)
            .bind(check_in)
            .bind(check_out)
            .bind(check_in)
            .bind(f.rooms)
    }};
}

/// Property repository trait
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn create(&self, property: &Property) -> Result<Property>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Property>>;

    /// Persist every mutable field of `property`
    async fn update(&self, property: &Property) -> Result<Property>;

    /// All properties owned by a host, most recently edited first
    async fn list_by_host(&self, host_id: i64) -> Result<Vec<Property>>;

    /// Every property, optionally filtered by status (admin view)
    async fn list(&self, status: Option<PropertyStatus>, params: &ListParams) -> Result<(Vec<Property>, i64)>;

    /// Listed properties matching `filters`, cheapest first
    async fn search(&self, filters: &SearchFilters, params: &ListParams) -> Result<(Vec<Property>, i64)>;

    /// Number of properties per status
    async fn count_by_status(&self) -> Result<Vec<(PropertyStatus, i64)>>;
}

pub struct SqlxPropertyRepository {
    pool: DynDatabasePool,
}

impl SqlxPropertyRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PropertyRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PropertyRepository for SqlxPropertyRepository {
    async fn create(&self, property: &Property) -> Result<Property> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_property_sqlite(sqlite_pool(&self.pool)?, property).await,
            DatabaseDriver::Mysql => create_property_mysql(mysql_pool(&self.pool)?, property).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Property>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_property_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_property_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn update(&self, property: &Property) -> Result<Property> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_property_sqlite(sqlite_pool(&self.pool)?, property).await,
            DatabaseDriver::Mysql => update_property_mysql(mysql_pool(&self.pool)?, property).await,
        }
    }

    async fn list_by_host(&self, host_id: i64) -> Result<Vec<Property>> {
        let sql = format!(
            "SELECT {} FROM properties WHERE host_id = ? ORDER BY updated_at DESC, id DESC",
            PROPERTY_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(host_id)
                    .fetch_all(sqlite_pool(&self.pool)?)
                    .await
                    .context("Failed to list host properties")?;
                rows.iter().map(row_to_property_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(host_id)
                    .fetch_all(mysql_pool(&self.pool)?)
                    .await
                    .context("Failed to list host properties")?;
                rows.iter().map(row_to_property_mysql).collect()
            }
        }
    }

    async fn list(&self, status: Option<PropertyStatus>, params: &ListParams) -> Result<(Vec<Property>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_properties_sqlite(sqlite_pool(&self.pool)?, status, params).await,
            DatabaseDriver::Mysql => list_properties_mysql(mysql_pool(&self.pool)?, status, params).await,
        }
    }

    async fn search(&self, filters: &SearchFilters, params: &ListParams) -> Result<(Vec<Property>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => search_properties_sqlite(sqlite_pool(&self.pool)?, filters, params).await,
            DatabaseDriver::Mysql => search_properties_mysql(mysql_pool(&self.pool)?, filters, params).await,
        }
    }

    async fn count_by_status(&self) -> Result<Vec<(PropertyStatus, i64)>> {
        let sql = "SELECT status, COUNT(*) AS count FROM properties GROUP BY status";
        let pairs: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to count properties")?
                .iter()
                .map(|row| (row.get("status"), row.get("count")))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .fetch_all(mysql_pool(&self.pool)?)
                .await
                .context("Failed to count properties")?
                .iter()
                .map(|row| (row.get("status"), row.get("count")))
                .collect(),
        };

        pairs
            .into_iter()
            .map(|(status, count)| Ok((PropertyStatus::from_str(&status)?, count)))
            .collect()
    }
}

/// Columns stored as text that need parsing on the way out
struct EncodedFields {
    property_type: String,
    amenities: String,
    house_rules: String,
    onboarding_step: String,
    status: String,
}

impl EncodedFields {
    fn encode(property: &Property) -> Result<Self> {
        Ok(Self {
            property_type: property.property_type.to_string(),
            amenities: serde_json::to_string(&property.amenities)?,
            house_rules: serde_json::to_string(&property.house_rules)?,
            onboarding_step: property.onboarding_step.to_string(),
            status: property.status.to_string(),
        })
    }

    fn decode(self) -> Result<(PropertyType, Vec<String>, HouseRules, OnboardingStep, PropertyStatus)> {
        Ok((
            PropertyType::from_str(&self.property_type)?,
            serde_json::from_str(&self.amenities).context("Invalid amenities JSON")?,
            serde_json::from_str(&self.house_rules).context("Invalid house rules JSON")?,
            OnboardingStep::from_str(&self.onboarding_step)?,
            PropertyStatus::from_str(&self.status)?,
        ))
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_property_sqlite(pool: &SqlitePool, property: &Property) -> Result<Property> {
    let now = Utc::now();
    let encoded = EncodedFields::encode(property)?;

    let result = sqlx::query(
        r#"
        INSERT INTO properties (host_id, name, property_type, description, address_line, city, state,
            country, postal_code, base_price, total_rooms, max_guests, amenities, house_rules,
            onboarding_step, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(property.host_id)
    .bind(&property.name)
    .bind(&encoded.property_type)
    .bind(&property.description)
    .bind(&property.address_line)
    .bind(&property.city)
    .bind(&property.state)
    .bind(&property.country)
    .bind(&property.postal_code)
    .bind(property.base_price)
    .bind(property.total_rooms)
    .bind(property.max_guests)
    .bind(&encoded.amenities)
    .bind(&encoded.house_rules)
    .bind(&encoded.onboarding_step)
    .bind(&encoded.status)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create property")?;

    Ok(Property {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..property.clone()
    })
}

async fn get_property_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Property>> {
    let row = sqlx::query(&format!("SELECT {} FROM properties WHERE id = ?", PROPERTY_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get property")?;

    row.as_ref().map(row_to_property_sqlite).transpose()
}

async fn update_property_sqlite(pool: &SqlitePool, property: &Property) -> Result<Property> {
    let encoded = EncodedFields::encode(property)?;

    sqlx::query(
        r#"
        UPDATE properties
        SET name = ?, property_type = ?, description = ?, address_line = ?, city = ?, state = ?,
            country = ?, postal_code = ?, base_price = ?, total_rooms = ?, max_guests = ?,
            amenities = ?, house_rules = ?, onboarding_step = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&property.name)
    .bind(&encoded.property_type)
    .bind(&property.description)
    .bind(&property.address_line)
    .bind(&property.city)
    .bind(&property.state)
    .bind(&property.country)
    .bind(&property.postal_code)
    .bind(property.base_price)
    .bind(property.total_rooms)
    .bind(property.max_guests)
    .bind(&encoded.amenities)
    .bind(&encoded.house_rules)
    .bind(&encoded.onboarding_step)
    .bind(&encoded.status)
    .bind(Utc::now())
    .bind(property.id)
    .execute(pool)
    .await
    .context("Failed to update property")?;

    get_property_sqlite(pool, property.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Property not found after update"))
}

async fn list_properties_sqlite(
    pool: &SqlitePool,
    status: Option<PropertyStatus>,
    params: &ListParams,
) -> Result<(Vec<Property>, i64)> {
    let status = status.map(|s| s.to_string());

    let rows = sqlx::query(&format!(
        "SELECT {} FROM properties WHERE (? IS NULL OR status = ?) ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        PROPERTY_COLUMNS
    ))
    .bind(&status)
    .bind(&status)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list properties")?;

    let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM properties WHERE (? IS NULL OR status = ?)")
        .bind(&status)
        .bind(&status)
        .fetch_one(pool)
        .await
        .context("Failed to count properties")?
        .get("count");

    let properties = rows.iter().map(row_to_property_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((properties, total))
}

async fn search_properties_sqlite(
    pool: &SqlitePool,
    filters: &SearchFilters,
    params: &ListParams,
) -> Result<(Vec<Property>, i64)> {
    let select = format!(
        "SELECT {} FROM properties {} ORDER BY base_price ASC, id ASC LIMIT ? OFFSET ?",
        PROPERTY_COLUMNS, SEARCH_WHERE
    );
    let rows = bind_search!(sqlx::query(&select), filters)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to search properties")?;

    let count = format!("SELECT COUNT(*) AS count FROM properties {}", SEARCH_WHERE);
    let total: i64 = bind_search!(sqlx::query(&count), filters)
        .fetch_one(pool)
        .await
        .context("Failed to count search results")?
        .get("count");

    let properties = rows.iter().map(row_to_property_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((properties, total))
}

fn row_to_property_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Property> {
    let (property_type, amenities, house_rules, onboarding_step, status) = EncodedFields {
        property_type: row.get("property_type"),
        amenities: row.get("amenities"),
        house_rules: row.get("house_rules"),
        onboarding_step: row.get("onboarding_step"),
        status: row.get("status"),
    }
    .decode()?;

    Ok(Property {
        id: row.get("id"),
        host_id: row.get("host_id"),
        name: row.get("name"),
        property_type,
        description: row.get("description"),
        address_line: row.get("address_line"),
        city: row.get("city"),
        state: row.get("state"),
        country: row.get("country"),
        postal_code: row.get("postal_code"),
        base_price: row.get("base_price"),
        total_rooms: row.get("total_rooms"),
        max_guests: row.get("max_guests"),
        amenities,
        house_rules,
        onboarding_step,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_property_mysql(pool: &MySqlPool, property: &Property) -> Result<Property> {
    let now = Utc::now();
    let encoded = EncodedFields::encode(property)?;

    let result = sqlx::query(
        r#"
        INSERT INTO properties (host_id, name, property_type, description, address_line, city, state,
            country, postal_code, base_price, total_rooms, max_guests, amenities, house_rules,
            onboarding_step, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(property.host_id)
    .bind(&property.name)
    .bind(&encoded.property_type)
    .bind(&property.description)
    .bind(&property.address_line)
    .bind(&property.city)
    .bind(&property.state)
    .bind(&property.country)
    .bind(&property.postal_code)
    .bind(property.base_price)
    .bind(property.total_rooms)
    .bind(property.max_guests)
    .bind(&encoded.amenities)
    .bind(&encoded.house_rules)
    .bind(&encoded.onboarding_step)
    .bind(&encoded.status)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create property")?;

    Ok(Property {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..property.clone()
    })
}

async fn get_property_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Property>> {
    let row = sqlx::query(&format!("SELECT {} FROM properties WHERE id = ?", PROPERTY_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get property")?;

    row.as_ref().map(row_to_property_mysql).transpose()
}

async fn update_property_mysql(pool: &MySqlPool, property: &Property) -> Result<Property> {
    let encoded = EncodedFields::encode(property)?;

    sqlx::query(
        r#"
        UPDATE properties
        SET name = ?, property_type = ?, description = ?, address_line = ?, city = ?, state = ?,
            country = ?, postal_code = ?, base_price = ?, total_rooms = ?, max_guests = ?,
            amenities = ?, house_rules = ?, onboarding_step = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&property.name)
    .bind(&encoded.property_type)
    .bind(&property.description)
    .bind(&property.address_line)
    .bind(&property.city)
    .bind(&property.state)
    .bind(&property.country)
    .bind(&property.postal_code)
    .bind(property.base_price)
    .bind(property.total_rooms)
    .bind(property.max_guests)
    .bind(&encoded.amenities)
    .bind(&encoded.house_rules)
    .bind(&encoded.onboarding_step)
    .bind(&encoded.status)
    .bind(Utc::now())
    .bind(property.id)
    .execute(pool)
    .await
    .context("Failed to update property")?;

    get_property_mysql(pool, property.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Property not found after update"))
}

async fn list_properties_mysql(
    pool: &MySqlPool,
    status: Option<PropertyStatus>,
    params: &ListParams,
) -> Result<(Vec<Property>, i64)> {
    let status = status.map(|s| s.to_string());

    let rows = sqlx::query(&format!(
        "SELECT {} FROM properties WHERE (? IS NULL OR status = ?) ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        PROPERTY_COLUMNS
    ))
    .bind(&status)
    .bind(&status)
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list properties")?;

    let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM properties WHERE (? IS NULL OR status = ?)")
        .bind(&status)
        .bind(&status)
        .fetch_one(pool)
        .await
        .context("Failed to count properties")?
        .get("count");

    let properties = rows.iter().map(row_to_property_mysql).collect::<Result<Vec<_>>>()?;
    Ok((properties, total))
}

async fn search_properties_mysql(
    pool: &MySqlPool,
    filters: &SearchFilters,
    params: &ListParams,
) -> Result<(Vec<Property>, i64)> {
    let select = format!(
        "SELECT {} FROM properties {} ORDER BY base_price ASC, id ASC LIMIT ? OFFSET ?",
        PROPERTY_COLUMNS, SEARCH_WHERE
    );
    let rows = bind_search!(sqlx::query(&select), filters)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to search properties")?;

    let count = format!("SELECT COUNT(*) AS count FROM properties {}", SEARCH_WHERE);
    let total: i64 = bind_search!(sqlx::query(&count), filters)
        .fetch_one(pool)
        .await
        .context("Failed to count search results")?
        .get("count");

    let properties = rows.iter().map(row_to_property_mysql).collect::<Result<Vec<_>>>()?;
    Ok((properties, total))
}

fn row_to_property_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Property> {
    let (property_type, amenities, house_rules, onboarding_step, status) = EncodedFields {
        property_type: row.get("property_type"),
        amenities: row.get("amenities"),
        house_rules: row.get("house_rules"),
        onboarding_step: row.get("onboarding_step"),
        status: row.get("status"),
    }
    .decode()?;

    Ok(Property {
        id: row.get("id"),
        host_id: row.get("host_id"),
        name: row.get("name"),
        property_type,
        description: row.get("description"),
        address_line: row.get("address_line"),
        city: row.get("city"),
        state: row.get("state"),
        country: row.get("country"),
        postal_code: row.get("postal_code"),
        base_price: row.get("base_price"),
        total_rooms: row.get("total_rooms"),
        max_guests: row.get("max_guests"),
        amenities,
        house_rules,
        onboarding_step,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
