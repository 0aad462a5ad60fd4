//! Reservation status transitions.
//!
//! `Pending` only ever describes a quote and is never written. A reservation is created
//! `Confirmed`, may be cancelled to `Refused` up to the cutoff, and only an administrator
//! may bring a `Refused` reservation back after re-checking availability.

use chrono::NaiveDate;
use serde::Serialize;

use super::calendar::days_until;
use super::models::ReservationStatus;

/// Cancellation is allowed while the stay starts at least this many days from today
pub const CANCELLATION_CUTOFF_DAYS: i64 = 2;

/// Explicit status-changing actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Client or admin cancels a confirmed stay
    Cancel,
    /// Admin restores a cancelled stay
    Reactivate,
}

/// Why a status change was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum LifecycleRejection {
    NotConfirmed { status: ReservationStatus },
    NotRefused { status: ReservationStatus },
    CancellationWindowClosed { days_until: i64 },
}

impl std::fmt::Display for LifecycleRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleRejection::NotConfirmed { .. } => {
                write!(f, "Only confirmed reservations can be cancelled")
            }
            LifecycleRejection::NotRefused { .. } => {
                write!(f, "Only cancelled reservations can be reactivated")
            }
            LifecycleRejection::CancellationWindowClosed { days_until } => write!(
                f,
                "Cancellation closes {} days before arrival ({} left)",
                CANCELLATION_CUTOFF_DAYS, days_until
            ),
        }
    }
}

/// Whether a stay starting on `date_start` can still be cancelled
pub fn within_cancellation_window(date_start: NaiveDate, today: NaiveDate) -> bool {
    days_until(date_start, today) >= CANCELLATION_CUTOFF_DAYS
}

/// Whether the reservation would currently accept a cancel
pub fn is_cancelable(status: ReservationStatus, date_start: NaiveDate, today: NaiveDate) -> bool {
    plan(status, Transition::Cancel, date_start, today).is_ok()
}

/// Target status of `transition`, or why it is not allowed.
///
/// Reactivation additionally requires a fresh availability check, which the caller runs.
pub fn plan(
    status: ReservationStatus,
    transition: Transition,
    date_start: NaiveDate,
    today: NaiveDate,
) -> Result<ReservationStatus, LifecycleRejection> {
    match (transition, status) {
        (Transition::Cancel, ReservationStatus::Confirmed) => {
            if within_cancellation_window(date_start, today) {
                Ok(ReservationStatus::Refused)
            } else {
                Err(LifecycleRejection::CancellationWindowClosed {
                    days_until: days_until(date_start, today),
                })
            }
        }
        (Transition::Cancel, status) => Err(LifecycleRejection::NotConfirmed { status }),
        (Transition::Reactivate, ReservationStatus::Refused) => Ok(ReservationStatus::Confirmed),
        (Transition::Reactivate, status) => Err(LifecycleRejection::NotRefused { status }),
    }
}
