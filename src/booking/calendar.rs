//! Calendar-date ranges shared by the availability checker and the price calculator.
//!
//! Every range here is inclusive on both ends and carries no time-of-day.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Two inclusive ranges [a,b] and [c,d] intersect iff a <= d and c <= b.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The clipped sub-range shared by both ranges, if any.
    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            Some(DateRange { start, end })
        } else {
            None
        }
    }

    /// Number of calendar days covered, counting both ends.
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use campsite_reservations::booking::DateRange;
    ///
    /// let april = DateRange::new(
    ///     NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
    ///     NaiveDate::from_ymd_opt(2025, 4, 30).unwrap(),
    /// );
    /// assert_eq!(april.inclusive_days(), 30);
    /// ```
    pub fn inclusive_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start.format("%d/%m/%Y"), self.end.format("%d/%m/%Y"))
    }
}

/// Strip the time-of-day so comparisons never see a partial day.
pub fn to_calendar_date(value: NaiveDateTime) -> NaiveDate {
    value.date()
}

/// Whole days from `today` until `date`; negative once the date has passed.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Source of "today" for everything that compares against the current date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date in the server's local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Clock pinned to a single date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Serde helpers accepting either a bare date or a date-time and keeping only the date.
///
/// Accepted forms: `2025-04-01`, `2025-04-01T15:30:00`, `2025-04-01 15:30:00` and
/// RFC 3339 (`2025-04-01T15:30:00+02:00`). The offset is ignored; the local calendar
/// date written by the client is what gets booked.
pub mod calendar_date {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(super::to_calendar_date(dt.naive_local()));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(super::to_calendar_date)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid calendar date: {}", raw)))
    }

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }
}
