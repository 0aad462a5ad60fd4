//! Response DTOs for booking API endpoints.
//!
//! Booking rejections are answered with `ok: false`, a machine-readable `reason` and a
//! human-readable `message`; only infrastructure faults use error status codes.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::availability::Rejection;
use super::calculators::{to_major_units, PriceSegment};
use super::lifecycle::LifecycleRejection;
use super::models::{ReservationStatus, ReservationSummary};
use super::services::{Admission, Confirmation, ReservationView, StatusChange};

/// Money value for JSON responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoneyResponse {
    pub amount_minor: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
}

impl MoneyResponse {
    pub fn new(amount_minor: i64, currency: &str) -> Self {
        Self {
            amount_minor,
            amount: to_major_units(amount_minor),
            currency: currency.to_string(),
        }
    }
}

/// One season slice of a quoted price
#[derive(Debug, Serialize)]
pub struct SegmentResponse {
    pub season: Option<String>,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub days: i64,
    pub percentage: i32,
    pub amount: MoneyResponse,
}

impl SegmentResponse {
    fn new(segment: PriceSegment, currency: &str) -> Self {
        Self {
            season: segment.season,
            date_start: segment.range.start,
            date_end: segment.range.end,
            days: segment.days,
            percentage: segment.percentage,
            amount: MoneyResponse::new(segment.amount, currency),
        }
    }
}

/// Response for a quote
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<MoneyResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_rate: Option<MoneyResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<SegmentResponse>,
}

impl QuoteResponse {
    pub fn from_admission(admission: Admission, currency: &str) -> Self {
        match admission {
            Admission::Accepted(quote) => Self {
                ok: true,
                reason: None,
                message: None,
                price: Some(MoneyResponse::new(quote.price.total, currency)),
                daily_rate: Some(MoneyResponse::new(quote.price.daily_rate, currency)),
                breakdown: quote
                    .price
                    .segments
                    .into_iter()
                    .map(|segment| SegmentResponse::new(segment, currency))
                    .collect(),
            },
            Admission::Rejected(rejection) => Self {
                ok: false,
                message: Some(rejection.to_string()),
                reason: Some(rejection),
                price: None,
                daily_rate: None,
                breakdown: Vec::new(),
            },
        }
    }
}

/// Response for a booking confirmation
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<MoneyResponse>,
}

impl ConfirmResponse {
    pub fn from_confirmation(confirmation: Confirmation, currency: &str) -> Self {
        match confirmation {
            Confirmation::Confirmed { reservation, .. } => Self {
                ok: true,
                reason: None,
                message: None,
                reservation_id: Some(reservation.id),
                price: Some(MoneyResponse::new(reservation.price, currency)),
            },
            Confirmation::Rejected(rejection) => Self {
                ok: false,
                message: Some(rejection.to_string()),
                reason: Some(rejection),
                reservation_id: None,
                price: None,
            },
        }
    }
}

/// Reason a cancel or reactivation did not happen
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TransitionReason {
    Lifecycle(LifecycleRejection),
    Availability(Rejection),
}

/// Response for a cancel or reactivation
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub ok: bool,
    pub reservation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReservationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TransitionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TransitionResponse {
    pub fn from_change(reservation_id: Uuid, change: StatusChange) -> Self {
        let (status, reason, message) = match change {
            StatusChange::Changed { status, .. } => (Some(status), None, None),
            StatusChange::NotAllowed(rejection) => {
                let message = rejection.to_string();
                (None, Some(TransitionReason::Lifecycle(rejection)), Some(message))
            }
            StatusChange::Unavailable(rejection) => {
                let message = rejection.to_string();
                (None, Some(TransitionReason::Availability(rejection)), Some(message))
            }
        };

        Self {
            ok: status.is_some(),
            reservation_id,
            status,
            reason,
            message,
        }
    }
}

/// A stored reservation
#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub rental_id: Uuid,
    pub rental_title: String,
    pub user_id: Uuid,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub adults: i32,
    pub kids: i32,
    pub price: MoneyResponse,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_cancelable: Option<bool>,
}

impl ReservationResponse {
    pub fn new(summary: ReservationSummary, is_cancelable: Option<bool>, currency: &str) -> Self {
        Self {
            id: summary.id,
            rental_id: summary.rental_id,
            rental_title: summary.rental_title,
            user_id: summary.user_id,
            date_start: summary.date_start,
            date_end: summary.date_end,
            adults: summary.adults_count,
            kids: summary.kids_count,
            price: MoneyResponse::new(summary.price, currency),
            status: summary.status,
            created_at: summary.created_at,
            is_cancelable,
        }
    }

    pub fn from_view(view: ReservationView, currency: &str) -> Self {
        Self::new(view.reservation, Some(view.is_cancelable), currency)
    }
}
