//! Database models for the booking engine.
//!
//! These models use sqlx's FromRow derive for direct database deserialization.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::calendar::DateRange;

/// Rental unit joined with its rate type
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RentalUnit {
    pub id: Uuid,
    pub title: String,
    /// Maximum number of occupants
    pub bedding: i32,
    pub is_active: bool,
    pub rate_type_id: Uuid,
    pub rate_label: String,
    pub rate_active: bool,
    /// Base daily price in minor currency units
    pub daily_price: i64,
}

impl RentalUnit {
    /// A unit can only be booked while both it and its rate type are active
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.rate_active
    }
}

/// Pricing season from seasons
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Season {
    pub id: Uuid,
    pub label: String,
    pub is_closed: bool,
    /// Multiplier on the base rate: 0 = free, 100 = base rate, >100 = surcharge
    pub percentage: i32,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

impl Season {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.date_start, self.date_end)
    }
}

/// Owner-imposed unavailability window from blocked_ranges
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BlockedRange {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

impl BlockedRange {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.date_start, self.date_end)
    }
}

/// Reservation status, stored as SMALLINT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Refused = 0,
    Confirmed = 1,
    Pending = 2,
}

impl ReservationStatus {
    /// Only confirmed reservations hold their dates
    pub fn blocks_dates(self) -> bool {
        matches!(self, ReservationStatus::Confirmed)
    }
}

/// Reservation from reservations
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reservation {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub user_id: Uuid,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub adults_count: i32,
    pub kids_count: i32,
    /// Total price in minor currency units
    pub price: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.date_start, self.date_end)
    }

    /// The stay this reservation describes, for re-running admission checks
    pub fn stay(&self) -> StayRequest {
        StayRequest {
            rental_id: self.rental_id,
            date_start: self.date_start,
            date_end: self.date_end,
            adults: self.adults_count,
            kids: self.kids_count,
        }
    }
}

/// Reservation row joined with its rental title, for listings
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReservationSummary {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub rental_title: String,
    pub user_id: Uuid,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub adults_count: i32,
    pub kids_count: i32,
    pub price: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

/// Back-office listing window relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationPeriod {
    /// Stays that ended before today
    Past,
    /// Stays in progress today
    Current,
    /// Stays starting after today
    Upcoming,
}

/// A candidate stay: what a booking request asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StayRequest {
    pub rental_id: Uuid,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub adults: i32,
    pub kids: i32,
}

impl StayRequest {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.date_start, self.date_end)
    }

    pub fn occupants(&self) -> i64 {
        i64::from(self.adults) + i64::from(self.kids)
    }
}
