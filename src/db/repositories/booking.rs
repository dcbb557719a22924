//! Booking repository
//!
//! Bookings are inserted through `create_if_available`, which finds the
//! busiest night of the requested stay and inserts only if enough rooms
//! remain on it, all inside one transaction.

use crate::config::DatabaseDriver;
use crate::db::{mysql_pool, sqlite_pool, DynDatabasePool};
use crate::models::{Booking, BookingStats, BookingStatus, ListParams, NewBooking};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const BOOKING_COLUMNS: &str = "b.id, b.property_id, b.guest_id, b.check_in, b.check_out, b.guests, b.rooms, b.nights, b.nightly_rate, b.subtotal, b.taxes, b.service_fee, b.total, b.guest_name, b.guest_email, b.guest_phone, b.special_requests, b.status, b.created_at, b.updated_at";

/// Rooms held on the busiest night of `[check_in, check_out)`. Occupancy
/// only rises on a booking's first night, so the peak falls on the range
/// start or on the check-in of some overlapping booking (`b1`); each such
/// night is paired with every active booking covering it (`b2`).
///
/// Binds: range start four times, then property id, range end, range start.
const PEAK_ROOMS_SQLITE: &str = r#"
    SELECT SUM(b2.rooms) AS booked
    FROM bookings b1
    JOIN bookings b2 ON b2.property_id = b1.property_id
        AND b2.status IN ('pending', 'confirmed')
        AND b2.check_in <= CASE WHEN b1.check_in > ? THEN b1.check_in ELSE ? END
        AND b2.check_out > CASE WHEN b1.check_in > ? THEN b1.check_in ELSE ? END
    WHERE b1.property_id = ? AND b1.status IN ('pending', 'confirmed')
      AND b1.check_in < ? AND b1.check_out > ?
    GROUP BY b1.id
    ORDER BY booked DESC
    LIMIT 1
"#;

// SUM over BIGINT is DECIMAL in MySQL
const PEAK_ROOMS_MYSQL: &str = r#"
    SELECT CAST(SUM(b2.rooms) AS SIGNED) AS booked
    FROM bookings b1
    JOIN bookings b2 ON b2.property_id = b1.property_id
        AND b2.status IN ('pending', 'confirmed')
        AND b2.check_in <= CASE WHEN b1.check_in > ? THEN b1.check_in ELSE ? END
        AND b2.check_out > CASE WHEN b1.check_in > ? THEN b1.check_in ELSE ? END
    WHERE b1.property_id = ? AND b1.status IN ('pending', 'confirmed')
      AND b1.check_in < ? AND b1.check_out > ?
    GROUP BY b1.id
    ORDER BY booked DESC
    LIMIT 1
"#;

macro_rules! bind_peak {
    ($query:expr, $property_id:expr, $check_in:expr, $check_out:expr) => {
        $query
            .bind($check_in)
            .bind($check_in)
            .bind($check_in)
            .bind($check_in)
            .bind($property_id)
            .bind($check_out)
            .bind($check_in)
    };
}

const INSERT_BOOKING: &str = r#"
    INSERT INTO bookings (property_id, guest_id, check_in, check_out, guests, rooms, nights,
        nightly_rate, subtotal, taxes, service_fee, total, guest_name, guest_email, guest_phone,
        special_requests, status, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

macro_rules! bind_new_booking {
    ($query:expr, $b:expr, $now:expr) => {
        $query
            .bind($b.property_id)
            .bind($b.guest_id)
            .bind($b.check_in)
            .bind($b.check_out)
            .bind($b.guests)
            .bind($b.rooms)
            .bind($b.nights)
            .bind($b.nightly_rate)
            .bind($b.subtotal)
            .bind($b.taxes)
            .bind($b.service_fee)
            .bind($b.total)
            .bind(&$b.guest_name)
            .bind(&$b.guest_email)
            .bind(&$b.guest_phone)
            .bind(&$b.special_requests)
            .bind(BookingStatus::Pending.to_string())
            .bind($now)
            .bind($now)
    };
}

/// Result of an availability-checked insert
#[derive(Debug)]
pub enum InsertOutcome {
    Created(Booking),
    /// Not enough free rooms; carries how many were still free
    Unavailable { available: i64 },
}

/// Booking repository trait
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert `booking` unless some night of the stay has fewer than
    /// `booking.rooms` of `total_rooms` free
    async fn create_if_available(&self, booking: &NewBooking, total_rooms: i64) -> Result<InsertOutcome>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>>;

    /// Rooms held by active bookings on the busiest night of `[check_in, check_out)`
    async fn booked_rooms(&self, property_id: i64, check_in: NaiveDate, check_out: NaiveDate) -> Result<i64>;

    /// A guest's own bookings, newest first
    async fn list_by_guest(&self, guest_id: i64, params: &ListParams) -> Result<(Vec<Booking>, i64)>;

    /// Bookings on properties owned by `host_id`
    async fn list_by_host(
        &self,
        host_id: i64,
        status: Option<BookingStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Booking>, i64)>;

    /// All bookings, optionally filtered by status
    async fn list(&self, status: Option<BookingStatus>, params: &ListParams) -> Result<(Vec<Booking>, i64)>;

    /// Move a booking from `from` to `to`. Returns false if the booking was
    /// no longer in status `from`.
    async fn update_status(&self, id: i64, from: BookingStatus, to: BookingStatus) -> Result<bool>;

    /// Counts per status and revenue
    async fn stats(&self) -> Result<BookingStats>;
}

pub struct SqlxBookingRepository {
    pool: DynDatabasePool,
}

impl SqlxBookingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookingRepository> {
        Arc::new(Self::new(pool))
    }
}

/// WHERE clause and its string binds for the list queries
struct ListFilter {
    clause: &'static str,
    host_id: Option<i64>,
    guest_id: Option<i64>,
    status: Option<String>,
}

impl ListFilter {
    fn new(host_id: Option<i64>, guest_id: Option<i64>, status: Option<BookingStatus>) -> Self {
        Self {
            clause: r#"
                FROM bookings b
                JOIN properties p ON p.id = b.property_id
                WHERE (? IS NULL OR p.host_id = ?)
                  AND (? IS NULL OR b.guest_id = ?)
                  AND (? IS NULL OR b.status = ?)
            "#,
            host_id,
            guest_id,
            status: status.map(|s| s.to_string()),
        }
    }
}

macro_rules! bind_filter {
    ($query:expr, $f:expr) => {
        $query
            .bind($f.host_id)
            .bind($f.host_id)
            .bind($f.guest_id)
            .bind($f.guest_id)
            .bind(&$f.status)
            .bind(&$f.status)
    };
}

#[async_trait]
impl BookingRepository for SqlxBookingRepository {
    async fn create_if_available(&self, booking: &NewBooking, total_rooms: i64) -> Result<InsertOutcome> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_if_available_sqlite(sqlite_pool(&self.pool)?, booking, total_rooms).await
            }
            DatabaseDriver::Mysql => {
                create_if_available_mysql(mysql_pool(&self.pool)?, booking, total_rooms).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings b WHERE b.id = ?", BOOKING_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to get booking")?
                .as_ref()
                .map(row_to_booking_sqlite)
                .transpose(),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(mysql_pool(&self.pool)?)
                .await
                .context("Failed to get booking")?
                .as_ref()
                .map(row_to_booking_mysql)
                .transpose(),
        }
    }

    async fn booked_rooms(&self, property_id: i64, check_in: NaiveDate, check_out: NaiveDate) -> Result<i64> {
        let booked: Option<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => bind_peak!(sqlx::query(PEAK_ROOMS_SQLITE), property_id, check_in, check_out)
                .fetch_optional(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to count booked rooms")?
                .map(|row| row.get("booked")),
            DatabaseDriver::Mysql => bind_peak!(sqlx::query(PEAK_ROOMS_MYSQL), property_id, check_in, check_out)
                .fetch_optional(mysql_pool(&self.pool)?)
                .await
                .context("Failed to count booked rooms")?
                .map(|row| row.get("booked")),
        };
        Ok(booked.unwrap_or(0))
    }

    async fn list_by_guest(&self, guest_id: i64, params: &ListParams) -> Result<(Vec<Booking>, i64)> {
        self.list_filtered(ListFilter::new(None, Some(guest_id), None), params).await
    }

    async fn list_by_host(
        &self,
        host_id: i64,
        status: Option<BookingStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Booking>, i64)> {
        self.list_filtered(ListFilter::new(Some(host_id), None, status), params).await
    }

    async fn list(&self, status: Option<BookingStatus>, params: &ListParams) -> Result<(Vec<Booking>, i64)> {
        self.list_filtered(ListFilter::new(None, None, status), params).await
    }

    async fn update_status(&self, id: i64, from: BookingStatus, to: BookingStatus) -> Result<bool> {
        let sql = "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(to.to_string())
                .bind(Utc::now())
                .bind(id)
                .bind(from.to_string())
                .execute(sqlite_pool(&self.pool)?)
                .await
                .context("Failed to update booking status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(to.to_string())
                .bind(Utc::now())
                .bind(id)
                .bind(from.to_string())
                .execute(mysql_pool(&self.pool)?)
                .await
                .context("Failed to update booking status")?
                .rows_affected(),
        };
        Ok(affected == 1)
    }

    async fn stats(&self) -> Result<BookingStats> {
        let rows: Vec<(String, i64, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "SELECT status, COUNT(*) AS count, COALESCE(SUM(total), 0) AS amount FROM bookings GROUP BY status",
            )
            .fetch_all(sqlite_pool(&self.pool)?)
            .await
            .context("Failed to compute booking stats")?
            .iter()
            .map(|row| (row.get("status"), row.get("count"), row.get("amount")))
            .collect(),
            DatabaseDriver::Mysql => sqlx::query(
                "SELECT status, COUNT(*) AS count, CAST(COALESCE(SUM(total), 0) AS SIGNED) AS amount FROM bookings GROUP BY status",
            )
            .fetch_all(mysql_pool(&self.pool)?)
            .await
            .context("Failed to compute booking stats")?
            .iter()
            .map(|row| (row.get("status"), row.get("count"), row.get("amount")))
            .collect(),
        };

        let mut stats = BookingStats::default();
        for (status, count, amount) in rows {
            let status = BookingStatus::from_str(&status)?;
            stats.add(status, count);
            if matches!(status, BookingStatus::Confirmed | BookingStatus::Completed) {
                stats.revenue += amount;
            }
        }
        Ok(stats)
    }
}

impl SqlxBookingRepository {
    async fn list_filtered(&self, filter: ListFilter, params: &ListParams) -> Result<(Vec<Booking>, i64)> {
        let select = format!(
            "SELECT {} {} ORDER BY b.created_at DESC, b.id DESC LIMIT ? OFFSET ?",
            BOOKING_COLUMNS, filter.clause
        );
        let count = format!("SELECT COUNT(*) AS count {}", filter.clause);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite_pool(&self.pool)?;
                let rows = bind_filter!(sqlx::query(&select), filter)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list bookings")?;
                let total: i64 = bind_filter!(sqlx::query(&count), filter)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count bookings")?
                    .get("count");
                let bookings = rows.iter().map(row_to_booking_sqlite).collect::<Result<Vec<_>>>()?;
                Ok((bookings, total))
            }
            DatabaseDriver::Mysql => {
                let pool = mysql_pool(&self.pool)?;
                let rows = bind_filter!(sqlx::query(&select), filter)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list bookings")?;
                let total: i64 = bind_filter!(sqlx::query(&count), filter)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count bookings")?
                    .get("count");
                let bookings = rows.iter().map(row_to_booking_mysql).collect::<Result<Vec<_>>>()?;
                Ok((bookings, total))
            }
        }
    }
}

fn new_booking_record(id: i64, booking: &NewBooking, now: chrono::DateTime<Utc>) -> Booking {
    Booking {
        id,
        property_id: booking.property_id,
        guest_id: booking.guest_id,
        check_in: booking.check_in,
        check_out: booking.check_out,
        guests: booking.guests,
        rooms: booking.rooms,
        nights: booking.nights,
        nightly_rate: booking.nightly_rate,
        subtotal: booking.subtotal,
        taxes: booking.taxes,
        service_fee: booking.service_fee,
        total: booking.total,
        guest_name: booking.guest_name.clone(),
        guest_email: booking.guest_email.clone(),
        guest_phone: booking.guest_phone.clone(),
        special_requests: booking.special_requests.clone(),
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_if_available_sqlite(
    pool: &SqlitePool,
    booking: &NewBooking,
    total_rooms: i64,
) -> Result<InsertOutcome> {
    let mut tx = pool.begin().await?;

    let booked: i64 = bind_peak!(
        sqlx::query(PEAK_ROOMS_SQLITE),
        booking.property_id,
        booking.check_in,
        booking.check_out
    )
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to count booked rooms")?
    .map(|row| row.get("booked"))
    .unwrap_or(0);

    let available = (total_rooms - booked).max(0);
    if booking.rooms > available {
        tx.rollback().await?;
        return Ok(InsertOutcome::Unavailable { available });
    }

    let now = Utc::now();
    let result = bind_new_booking!(sqlx::query(INSERT_BOOKING), booking, now)
        .execute(&mut *tx)
        .await
        .context("Failed to create booking")?;
    tx.commit().await?;

    Ok(InsertOutcome::Created(new_booking_record(result.last_insert_rowid(), booking, now)))
}

fn row_to_booking_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Booking> {
    let status: String = row.get("status");
    Ok(Booking {
        id: row.get("id"),
        property_id: row.get("property_id"),
        guest_id: row.get("guest_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        guests: row.get("guests"),
        rooms: row.get("rooms"),
        nights: row.get("nights"),
        nightly_rate: row.get("nightly_rate"),
        subtotal: row.get("subtotal"),
        taxes: row.get("taxes"),
        service_fee: row.get("service_fee"),
        total: row.get("total"),
        guest_name: row.get("guest_name"),
        guest_email: row.get("guest_email"),
        guest_phone: row.get("guest_phone"),
        special_requests: row.get("special_requests"),
        status: BookingStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_if_available_mysql(
    pool: &MySqlPool,
    booking: &NewBooking,
    total_rooms: i64,
) -> Result<InsertOutcome> {
    let mut tx = pool.begin().await?;

    // Lock the property row so concurrent writers from other processes
    // serialize on the same listing.
    sqlx::query("SELECT id FROM properties WHERE id = ? FOR UPDATE")
        .bind(booking.property_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock property")?;

    let booked: i64 = bind_peak!(
        sqlx::query(PEAK_ROOMS_MYSQL),
        booking.property_id,
        booking.check_in,
        booking.check_out
    )
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to count booked rooms")?
    .map(|row| row.get("booked"))
    .unwrap_or(0);

    let available = (total_rooms - booked).max(0);
    if booking.rooms > available {
        tx.rollback().await?;
        return Ok(InsertOutcome::Unavailable { available });
    }

    let now = Utc::now();
    let result = bind_new_booking!(sqlx::query(INSERT_BOOKING), booking, now)
        .execute(&mut *tx)
        .await
        .context("Failed to create booking")?;
    tx.commit().await?;

    Ok(InsertOutcome::Created(new_booking_record(result.last_insert_id() as i64, booking, now)))
}

fn row_to_booking_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Booking> {
    let status: String = row.get("status");
    Ok(Booking {
        id: row.get("id"),
        property_id: row.get("property_id"),
        guest_id: row.get("guest_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        guests: row.get("guests"),
        rooms: row.get("rooms"),
        nights: row.get("nights"),
        nightly_rate: row.get("nightly_rate"),
        subtotal: row.get("subtotal"),
        taxes: row.get("taxes"),
        service_fee: row.get("service_fee"),
        total: row.get("total"),
        guest_name: row.get("guest_name"),
        guest_email: row.get("guest_email"),
        guest_phone: row.get("guest_phone"),
        special_requests: row.get("special_requests"),
        status: BookingStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    struct Fixture {
        repo: SqlxBookingRepository,
        host_id: i64,
        guest_id: i64,
        property_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();

        let mut ids = Vec::new();
        for (email, role) in [("host@example.com", "host"), ("guest@example.com", "guest")] {
            let id = sqlx::query("INSERT INTO users (email, password_hash, role) VALUES (?, 'h', ?)")
                .bind(email)
                .bind(role)
                .execute(sqlite)
                .await
                .unwrap()
                .last_insert_rowid();
            ids.push(id);
        }
        let property_id = sqlx::query(
            "INSERT INTO properties (host_id, name, total_rooms, max_guests, status) VALUES (?, 'Stay', 2, 2, 'listed')",
        )
        .bind(ids[0])
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        Fixture {
            repo: SqlxBookingRepository::new(pool.clone()),
            host_id: ids[0],
            guest_id: ids[1],
            property_id,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_booking(f: &Fixture, check_in: &str, check_out: &str, rooms: i64) -> NewBooking {
        NewBooking {
            property_id: f.property_id,
            guest_id: f.guest_id,
            check_in: date(check_in),
            check_out: date(check_out),
            guests: 1,
            rooms,
            nights: (date(check_out) - date(check_in)).num_days(),
            nightly_rate: 399,
            subtotal: 1197,
            taxes: 120,
            service_fee: 45,
            total: 1362,
            guest_name: "Meera".to_string(),
            guest_email: "guest@example.com".to_string(),
            guest_phone: None,
            special_requests: Some("Late arrival".to_string()),
        }
    }

    async fn create(f: &Fixture, booking: &NewBooking) -> Booking {
        match f.repo.create_if_available(booking, 2).await.unwrap() {
            InsertOutcome::Created(b) => b,
            other => panic!("expected booking to be created, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let f = setup().await;
        let created = create(&f, &new_booking(&f, "2030-03-01", "2030-03-04", 1)).await;

        let loaded = f.repo.get_by_id(created.id).await.unwrap().expect("missing");
        assert_eq!(loaded.status, BookingStatus::Pending);
        assert_eq!(loaded.check_in, date("2030-03-01"));
        assert_eq!(loaded.total, 1362);
        assert_eq!(loaded.special_requests.as_deref(), Some("Late arrival"));
    }

    #[tokio::test]
    async fn test_overlapping_bookings_cannot_exceed_rooms() {
        let f = setup().await;
        create(&f, &new_booking(&f, "2030-03-01", "2030-03-04", 1)).await;
        create(&f, &new_booking(&f, "2030-03-02", "2030-03-05", 1)).await;

        let outcome = f
            .repo
            .create_if_available(&new_booking(&f, "2030-03-03", "2030-03-06", 1), 2)
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Unavailable { available: 0 }));
    }

    #[tokio::test]
    async fn test_adjacent_stays_do_not_overlap() {
        let f = setup().await;
        create(&f, &new_booking(&f, "2030-03-01", "2030-03-04", 2)).await;
        create(&f, &new_booking(&f, "2030-03-04", "2030-03-06", 2)).await;

        assert_eq!(
            f.repo.booked_rooms(f.property_id, date("2030-03-03"), date("2030-03-05")).await.unwrap(),
            2
        );
        assert_eq!(
            f.repo.booked_rooms(f.property_id, date("2030-03-06"), date("2030-03-07")).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_disjoint_bookings_share_a_room() {
        let f = setup().await;
        create(&f, &new_booking(&f, "2030-03-10", "2030-03-11", 1)).await;
        create(&f, &new_booking(&f, "2030-03-12", "2030-03-13", 1)).await;

        // Never more than one room is taken on a single night
        assert_eq!(
            f.repo.booked_rooms(f.property_id, date("2030-03-10"), date("2030-03-13")).await.unwrap(),
            1
        );
        create(&f, &new_booking(&f, "2030-03-10", "2030-03-13", 1)).await;

        let outcome = f
            .repo
            .create_if_available(&new_booking(&f, "2030-03-09", "2030-03-11", 1), 2)
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Unavailable { available: 0 }));
        assert_eq!(
            f.repo.booked_rooms(f.property_id, date("2030-03-11"), date("2030-03-12")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_busiest_night_inside_the_range() {
        let f = setup().await;
        create(&f, &new_booking(&f, "2030-05-01", "2030-05-03", 1)).await;
        create(&f, &new_booking(&f, "2030-05-02", "2030-05-06", 1)).await;

        assert_eq!(
            f.repo.booked_rooms(f.property_id, date("2030-04-28"), date("2030-05-10")).await.unwrap(),
            2
        );
        assert_eq!(
            f.repo.booked_rooms(f.property_id, date("2030-05-03"), date("2030-05-10")).await.unwrap(),
            1
        );
        assert_eq!(
            f.repo.booked_rooms(f.property_id, date("2030-04-01"), date("2030-05-01")).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_cancelled_bookings_free_rooms() {
        let f = setup().await;
        let booking = create(&f, &new_booking(&f, "2030-03-01", "2030-03-04", 2)).await;

        assert!(f
            .repo
            .update_status(booking.id, BookingStatus::Pending, BookingStatus::Cancelled)
            .await
            .unwrap());

        create(&f, &new_booking(&f, "2030-03-01", "2030-03-04", 2)).await;
    }

    #[tokio::test]
    async fn test_update_status_checks_current_status() {
        let f = setup().await;
        let booking = create(&f, &new_booking(&f, "2030-03-01", "2030-03-04", 1)).await;

        let moved = f
            .repo
            .update_status(booking.id, BookingStatus::Confirmed, BookingStatus::Completed)
            .await
            .unwrap();
        assert!(!moved);
        assert_eq!(
            f.repo.get_by_id(booking.id).await.unwrap().unwrap().status,
            BookingStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_lists_and_stats() {
        let f = setup().await;
        let first = create(&f, &new_booking(&f, "2030-03-01", "2030-03-02", 1)).await;
        create(&f, &new_booking(&f, "2030-04-01", "2030-04-02", 1)).await;
        f.repo
            .update_status(first.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .unwrap();

        let (mine, total) = f.repo.list_by_guest(f.guest_id, &ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(mine.len(), 2);

        let (confirmed, total) = f
            .repo
            .list_by_host(f.host_id, Some(BookingStatus::Confirmed), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(confirmed[0].id, first.id);

        let (none, _) = f.repo.list_by_host(f.guest_id, None, &ListParams::default()).await.unwrap();
        assert!(none.is_empty());

        let stats = f.repo.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.revenue, 1362);
    }
}
