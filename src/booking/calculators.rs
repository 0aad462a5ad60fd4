//! Core pricing calculation functions.
//!
//! Pure functions for stay pricing - no database access.
//! All amounts are integers in minor currency units (cents).

use rust_decimal::Decimal;
use serde::Serialize;

use super::calendar::DateRange;
use super::models::Season;

/// One priced slice of a stay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceSegment {
    /// Season label, or `None` for the base-rate segment
    pub season: Option<String>,
    pub range: DateRange,
    pub days: i64,
    pub percentage: i32,
    pub amount: i64,
}

/// Price of a stay with its per-season breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub total: i64,
    pub daily_rate: i64,
    pub segments: Vec<PriceSegment>,
}

/// Total price of a stay in minor units.
///
/// With no overlapping season every day is charged at `daily_rate`. Once at least one
/// season overlaps, each season is clipped to the stay and charged
/// `floor(days * percentage * daily_rate / 100)`; days outside every season add nothing.
pub fn calculate_price(stay: DateRange, daily_rate: i64, seasons: &[Season]) -> i64 {
    price_breakdown(stay, daily_rate, seasons).total
}

/// Same computation as [`calculate_price`], keeping one segment per contributing season.
///
/// Seasons are not assumed to partition the stay: overlapping seasons each contribute
/// their clipped days independently.
pub fn price_breakdown(stay: DateRange, daily_rate: i64, seasons: &[Season]) -> PriceBreakdown {
    let daily_rate = daily_rate.max(0);

    let segments: Vec<PriceSegment> = seasons
        .iter()
        .filter_map(|season| {
            let clipped = stay.intersection(&season.range())?;
            let days = clipped.inclusive_days();
            Some(PriceSegment {
                season: Some(season.label.clone()),
                range: clipped,
                days,
                percentage: season.percentage,
                amount: segment_amount(days, season.percentage, daily_rate),
            })
        })
        .collect();

    let segments = if segments.is_empty() {
        let days = stay.inclusive_days().max(0);
        vec![PriceSegment {
            season: None,
            range: stay,
            days,
            percentage: 100,
            amount: saturate(i128::from(days) * i128::from(daily_rate)),
        }]
    } else {
        segments
    };

    let total = segments
        .iter()
        .fold(0i64, |acc, segment| acc.saturating_add(segment.amount));

    PriceBreakdown {
        total,
        daily_rate,
        segments,
    }
}

/// floor(days * percentage * rate / 100), never negative
fn segment_amount(days: i64, percentage: i32, daily_rate: i64) -> i64 {
    if days <= 0 || percentage <= 0 {
        return 0;
    }
    let product = i128::from(days) * i128::from(percentage) * i128::from(daily_rate);
    saturate(product / 100)
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value.max(0)).unwrap_or(i64::MAX)
}

/// Convert minor units to a two-place decimal amount for display.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use campsite_reservations::booking::to_major_units;
///
/// assert_eq!(to_major_units(12050), dec!(120.50));
/// assert_eq!(to_major_units(7), dec!(0.07));
/// ```
pub fn to_major_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
