//! Availability checker: decides whether a stay may be booked for a rental unit.
//!
//! Checks run in a fixed order and stop at the first failure, so a given request always
//! reports the same reason. Collections are fetched only when the check that needs them
//! is reached.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AppError;

use super::calendar::DateRange;
use super::models::{RentalUnit, StayRequest};
use super::source::BookingSource;

/// Why a stay cannot be booked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Rejection {
    /// Unknown rental, inactive rental or inactive rate type
    RentalUnavailable,
    StartDateInPast {
        today: NaiveDate,
    },
    EndNotAfterStart,
    InvalidOccupancy {
        adults: i32,
        kids: i32,
    },
    OverCapacity {
        capacity: i32,
        requested: i64,
    },
    /// The campsite is closed during `range`
    CampClosed {
        season: String,
        range: DateRange,
    },
    /// The stay overlaps a blocked range or a confirmed reservation
    DatesBlocked {
        range: DateRange,
    },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::RentalUnavailable => write!(f, "This rental is not available for booking"),
            Rejection::StartDateInPast { .. } => {
                write!(f, "The start date must not be before today")
            }
            Rejection::EndNotAfterStart => write!(f, "The end date must be after the start date"),
            Rejection::InvalidOccupancy { .. } => write!(
                f,
                "At least one adult is required and the number of kids cannot be negative"
            ),
            Rejection::OverCapacity {
                capacity,
                requested,
            } => write!(
                f,
                "{} guests exceed the rental capacity of {}",
                requested, capacity
            ),
            Rejection::CampClosed { season, range } => {
                write!(f, "The campsite is closed ({}) from {}", season, range)
            }
            Rejection::DatesBlocked { .. } => write!(f, "The selected dates are not available"),
        }
    }
}

/// Outcome of an availability check
#[derive(Debug, Clone)]
pub enum Availability {
    /// Every check passed; carries the rental for pricing
    Available(RentalUnit),
    Rejected(Rejection),
}

/// Date and occupancy checks that need nothing but the request and the rental.
pub fn validate_stay(stay: &StayRequest, rental: &RentalUnit, today: NaiveDate) -> Option<Rejection> {
    if !rental.is_bookable() {
        return Some(Rejection::RentalUnavailable);
    }
    if stay.date_start < today {
        return Some(Rejection::StartDateInPast { today });
    }
    if stay.date_end <= stay.date_start {
        return Some(Rejection::EndNotAfterStart);
    }
    if stay.adults < 1 || stay.kids < 0 {
        return Some(Rejection::InvalidOccupancy {
            adults: stay.adults,
            kids: stay.kids,
        });
    }
    if stay.occupants() > i64::from(rental.bedding) {
        return Some(Rejection::OverCapacity {
            capacity: rental.bedding,
            requested: stay.occupants(),
        });
    }
    None
}

/// First range in `ranges` that overlaps `stay`
pub fn first_conflict<I>(stay: DateRange, ranges: I) -> Option<DateRange>
where
    I: IntoIterator<Item = DateRange>,
{
    ranges.into_iter().find(|range| range.overlaps(&stay))
}

/// Run the full check sequence against `source`.
///
/// Side-effect free: calling it twice over unchanged data gives the same answer.
pub async fn check_availability<S>(
    source: &mut S,
    stay: &StayRequest,
    today: NaiveDate,
) -> Result<Availability, AppError>
where
    S: BookingSource + ?Sized,
{
    let rental = match source.rental(stay.rental_id).await? {
        Some(rental) => rental,
        None => return Ok(Availability::Rejected(Rejection::RentalUnavailable)),
    };

    if let Some(rejection) = validate_stay(stay, &rental, today) {
        return Ok(Availability::Rejected(rejection));
    }

    let range = stay.range();

    let closed = source.closed_seasons().await?;
    if let Some(season) = closed.iter().find(|s| s.range().overlaps(&range)) {
        return Ok(Availability::Rejected(Rejection::CampClosed {
            season: season.label.clone(),
            range: season.range(),
        }));
    }

    let blocked = source.blocked_ranges(rental.id).await?;
    if let Some(conflict) = first_conflict(range, blocked.iter().map(|b| b.range())) {
        return Ok(Availability::Rejected(Rejection::DatesBlocked { range: conflict }));
    }

    let reservations = source.confirmed_reservations(rental.id).await?;
    let confirmed = reservations
        .iter()
        .filter(|r| r.status.blocks_dates())
        .map(|r| r.range());
    if let Some(conflict) = first_conflict(range, confirmed) {
        return Ok(Availability::Rejected(Rejection::DatesBlocked { range: conflict }));
    }

    Ok(Availability::Available(rental))
}
