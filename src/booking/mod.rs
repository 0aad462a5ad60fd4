//! Reservation admission and pricing engine.
//!
//! Decides whether a stay can be booked for a rental unit, prices it from the unit's daily
//! rate and the seasons it crosses, and moves stored reservations between statuses.

pub mod availability;
pub mod calculators;
pub mod calendar;
pub mod lifecycle;
pub mod models;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;
pub mod source;

// Re-export commonly used items
pub use availability::{check_availability, Availability, Rejection};
pub use calculators::{calculate_price, price_breakdown, to_major_units};
pub use calendar::{Clock, DateRange, FixedClock, SystemClock};
pub use routes::router;
pub use services::{Admission, Confirmation, RetryPolicy, StatusChange};
pub use source::{BookingSource, PgSource};
