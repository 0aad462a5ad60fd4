//! Booking service functions with database access.
//!
//! Quotes run on a pooled connection and may use the reference-data cache. Anything that
//! writes runs in its own transaction; confirmations and reactivations are SERIALIZABLE and
//! hold a per-rental advisory lock so two overlapping stays can never both be confirmed.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::{Caller, Capability};
use crate::cache::AppCache;
use crate::error::AppError;

use super::availability::{check_availability, Availability, Rejection};
use super::calculators::{price_breakdown, PriceBreakdown};
use super::calendar::DateRange;
use super::lifecycle::{self, LifecycleRejection, Transition};
use super::models::{
    Reservation, ReservationPeriod, ReservationStatus, ReservationSummary, StayRequest,
};
use super::queries;
use super::source::{BookingSource, PgSource};

/// A priced stay that passed every availability check
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub rental_id: Uuid,
    pub rental_title: String,
    pub range: DateRange,
    pub adults: i32,
    pub kids: i32,
    pub price: PriceBreakdown,
}

/// Result of running admission for a stay
#[derive(Debug, Clone)]
pub enum Admission {
    Accepted(Quote),
    Rejected(Rejection),
}

/// Result of a confirmation request
#[derive(Debug, Clone)]
pub enum Confirmation {
    Confirmed {
        reservation: Reservation,
        quote: Quote,
    },
    Rejected(Rejection),
}

/// Result of a cancel or reactivate request
#[derive(Debug, Clone)]
pub enum StatusChange {
    Changed {
        reservation_id: Uuid,
        status: ReservationStatus,
    },
    /// The transition itself is not allowed from the current status
    NotAllowed(LifecycleRejection),
    /// Reactivation found the dates taken or otherwise unbookable
    Unavailable(Rejection),
}

/// A reservation as shown to its owner or an administrator
#[derive(Debug, Clone, Serialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: ReservationSummary,
    pub is_cancelable: bool,
}

/// How often a conflicting transaction is re-run
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Sleep before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

/// Availability check followed by pricing, against any data source.
///
/// Reads only; the same inputs over unchanged data always give the same admission.
pub async fn admit<S>(
    source: &mut S,
    stay: &StayRequest,
    today: NaiveDate,
) -> Result<Admission, AppError>
where
    S: BookingSource + ?Sized,
{
    let rental = match check_availability(source, stay, today).await? {
        Availability::Available(rental) => rental,
        Availability::Rejected(rejection) => return Ok(Admission::Rejected(rejection)),
    };

    let range = stay.range();
    let seasons = source.seasons_overlapping(range).await?;
    let price = price_breakdown(range, rental.daily_price, &seasons);

    Ok(Admission::Accepted(Quote {
        rental_id: rental.id,
        rental_title: rental.title,
        range,
        adults: stay.adults,
        kids: stay.kids,
        price,
    }))
}

/// Check and price a stay without persisting anything
pub async fn check_and_quote(
    pool: &PgPool,
    cache: &AppCache,
    stay: &StayRequest,
    today: NaiveDate,
) -> Result<Admission, AppError> {
    let mut conn = pool.acquire().await?;
    let mut source = PgSource::cached(&mut *conn, cache);
    let admission = admit(&mut source, stay, today).await?;

    match &admission {
        Admission::Accepted(quote) => tracing::debug!(
            "Quoted rental {} for {}: {}",
            stay.rental_id,
            quote.range,
            quote.price.total
        ),
        Admission::Rejected(rejection) => {
            tracing::debug!("Quote rejected for rental {}: {:?}", stay.rental_id, rejection)
        }
    }

    Ok(admission)
}

/// Check, price and persist a confirmed reservation.
///
/// Under SERIALIZABLE the transaction snapshot is taken by the advisory-lock statement,
/// before the lock is granted. A booker that had to wait for a concurrent booking of the
/// same rental therefore fails once with a serialization conflict and succeeds, or gets
/// `DatesBlocked`, on its retry. More simultaneous bookers of one rental than
/// `policy.max_attempts` can end in `AppError::Contention`.
pub async fn check_and_confirm(
    pool: &PgPool,
    stay: &StayRequest,
    user_id: Uuid,
    today: NaiveDate,
    policy: &RetryPolicy,
) -> Result<Confirmation, AppError> {
    let confirmation =
        with_retry(policy, "confirm", move || try_confirm(pool, stay, user_id, today)).await?;

    match &confirmation {
        Confirmation::Confirmed { reservation, .. } => tracing::info!(
            "Reservation {} confirmed for rental {} ({}), price {}",
            reservation.id,
            reservation.rental_id,
            reservation.range(),
            reservation.price
        ),
        Confirmation::Rejected(rejection) => tracing::info!(
            "Booking rejected for rental {}: {:?}",
            stay.rental_id,
            rejection
        ),
    }

    Ok(confirmation)
}

async fn try_confirm(
    pool: &PgPool,
    stay: &StayRequest,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<Confirmation, AppError> {
    let mut tx = pool.begin().await?;
    queries::set_serializable(&mut *tx).await?;
    queries::lock_rental(&mut *tx, stay.rental_id).await?;

    let admission = {
        let mut source = PgSource::live(&mut *tx);
        admit(&mut source, stay, today).await?
    };

    let quote = match admission {
        Admission::Accepted(quote) => quote,
        Admission::Rejected(rejection) => {
            tx.rollback().await?;
            return Ok(Confirmation::Rejected(rejection));
        }
    };

    let reservation = queries::insert_reservation(
        &mut *tx,
        stay,
        user_id,
        quote.price.total,
        ReservationStatus::Confirmed,
    )
    .await?;
    tx.commit().await?;

    Ok(Confirmation::Confirmed { reservation, quote })
}

/// Cancel a confirmed reservation, subject to the cancellation cutoff
pub async fn cancel_reservation(
    pool: &PgPool,
    reservation_id: Uuid,
    caller: &Caller,
    today: NaiveDate,
) -> Result<StatusChange, AppError> {
    let mut tx = pool.begin().await?;
    let reservation = queries::get_reservation_for_update(&mut *tx, reservation_id)
        .await?
        .ok_or(AppError::NotFound)?;

    caller.require_owner(reservation.user_id, Capability::CancelOwnReservation)?;

    let next = match lifecycle::plan(
        reservation.status,
        Transition::Cancel,
        reservation.date_start,
        today,
    ) {
        Ok(next) => next,
        Err(rejection) => {
            tx.rollback().await?;
            return Ok(StatusChange::NotAllowed(rejection));
        }
    };

    queries::update_reservation_status(&mut *tx, reservation.id, next).await?;
    tx.commit().await?;

    tracing::info!(
        "Reservation {} cancelled by {} ({:?})",
        reservation.id,
        caller.user_id,
        caller.role
    );

    Ok(StatusChange::Changed {
        reservation_id: reservation.id,
        status: next,
    })
}

/// Bring a cancelled reservation back once its stay is bookable again.
///
/// The stored price is kept as it was when the stay was first confirmed.
pub async fn reactivate_reservation(
    pool: &PgPool,
    reservation_id: Uuid,
    today: NaiveDate,
    policy: &RetryPolicy,
) -> Result<StatusChange, AppError> {
    let change = with_retry(policy, "reactivate", move || {
        try_reactivate(pool, reservation_id, today)
    })
    .await?;

    match &change {
        StatusChange::Changed { reservation_id, .. } => {
            tracing::info!("Reservation {} reactivated", reservation_id)
        }
        other => tracing::info!("Reactivation of {} refused: {:?}", reservation_id, other),
    }

    Ok(change)
}

async fn try_reactivate(
    pool: &PgPool,
    reservation_id: Uuid,
    today: NaiveDate,
) -> Result<StatusChange, AppError> {
    let mut tx = pool.begin().await?;
    queries::set_serializable(&mut *tx).await?;

    let reservation = queries::get_reservation_for_update(&mut *tx, reservation_id)
        .await?
        .ok_or(AppError::NotFound)?;

    queries::lock_rental(&mut *tx, reservation.rental_id).await?;

    let change = {
        let mut source = PgSource::live(&mut *tx);
        decide_reactivation(&mut source, &reservation, today).await?
    };

    match change {
        StatusChange::Changed { status, .. } => {
            queries::update_reservation_status(&mut *tx, reservation.id, status).await?;
            tx.commit().await?;
        }
        _ => tx.rollback().await?,
    }

    Ok(change)
}

/// Whether `reservation` may be reactivated now, and its status if so.
///
/// Reads only. The reservation itself is Refused, so it never blocks its own dates.
pub async fn decide_reactivation<S>(
    source: &mut S,
    reservation: &Reservation,
    today: NaiveDate,
) -> Result<StatusChange, AppError>
where
    S: BookingSource + ?Sized,
{
    let next = match lifecycle::plan(
        reservation.status,
        Transition::Reactivate,
        reservation.date_start,
        today,
    ) {
        Ok(next) => next,
        Err(rejection) => return Ok(StatusChange::NotAllowed(rejection)),
    };

    match check_availability(source, &reservation.stay(), today).await? {
        Availability::Available(_) => Ok(StatusChange::Changed {
            reservation_id: reservation.id,
            status: next,
        }),
        Availability::Rejected(rejection) => Ok(StatusChange::Unavailable(rejection)),
    }
}

/// Get one reservation, visible to its owner and to administrators
pub async fn get_reservation(
    pool: &PgPool,
    reservation_id: Uuid,
    caller: &Caller,
    today: NaiveDate,
) -> Result<ReservationView, AppError> {
    let reservation = queries::get_reservation_summary(pool, reservation_id).await?;
    caller.require_owner(reservation.user_id, Capability::ViewOwnReservations)?;

    let is_cancelable = lifecycle::is_cancelable(reservation.status, reservation.date_start, today);

    Ok(ReservationView {
        reservation,
        is_cancelable,
    })
}

/// Every reservation made by a user
pub async fn list_user_reservations(
    pool: &PgPool,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<ReservationView>, AppError> {
    let reservations = queries::get_reservations_for_user(pool, user_id).await?;

    Ok(reservations
        .into_iter()
        .map(|reservation| ReservationView {
            is_cancelable: lifecycle::is_cancelable(
                reservation.status,
                reservation.date_start,
                today,
            ),
            reservation,
        })
        .collect())
}

/// Back-office listing of past, current or upcoming stays
pub async fn list_reservations_in_period(
    pool: &PgPool,
    period: ReservationPeriod,
    today: NaiveDate,
) -> Result<Vec<ReservationSummary>, AppError> {
    queries::get_reservations_in_period(pool, period, today).await
}

/// Run `attempt` until it succeeds, fails for a reason other than a serialization
/// conflict, or the attempt budget is spent.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut tries = 0;

    loop {
        tries += 1;
        match attempt().await {
            Err(e) if e.is_serialization_conflict() => {
                if tries >= max_attempts {
                    tracing::warn!("{} failed after {} conflicting attempts", operation, tries);
                    return Err(AppError::Contention { attempts: tries });
                }
                tracing::debug!("{} hit a serialization conflict, retrying ({})", operation, tries);
                tokio::time::sleep(policy.backoff * tries).await;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::models::{BlockedRange, RentalUnit, Season};
    use crate::booking::source::memory::MemorySource;
    use chrono::Utc;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn today() -> NaiveDate {
        d(2025, 3, 1)
    }

    fn fixture() -> (MemorySource, RentalUnit) {
        let rental = RentalUnit {
            id: Uuid::new_v4(),
            title: "Chalet Bruyère".to_string(),
            bedding: 6,
            is_active: true,
            rate_type_id: Uuid::new_v4(),
            rate_label: "Chalet".to_string(),
            rate_active: true,
            daily_price: 1000,
        };
        let source = MemorySource {
            rentals: vec![rental.clone()],
            seasons: vec![
                Season {
                    id: Uuid::new_v4(),
                    label: "Low".to_string(),
                    is_closed: false,
                    percentage: 80,
                    date_start: d(2025, 6, 1),
                    date_end: d(2025, 6, 30),
                },
                Season {
                    id: Uuid::new_v4(),
                    label: "High".to_string(),
                    is_closed: false,
                    percentage: 120,
                    date_start: d(2025, 7, 1),
                    date_end: d(2025, 8, 31),
                },
                Season {
                    id: Uuid::new_v4(),
                    label: "Closed".to_string(),
                    is_closed: true,
                    percentage: 0,
                    date_start: d(2025, 11, 1),
                    date_end: d(2026, 2, 28),
                },
            ],
            ..Default::default()
        };
        (source, rental)
    }

    fn stay(rental: &RentalUnit, start: NaiveDate, end: NaiveDate) -> StayRequest {
        StayRequest {
            rental_id: rental.id,
            date_start: start,
            date_end: end,
            adults: 2,
            kids: 1,
        }
    }

    fn accepted(admission: Admission) -> Quote {
        match admission {
            Admission::Accepted(quote) => quote,
            Admission::Rejected(rejection) => panic!("unexpected rejection: {:?}", rejection),
        }
    }

    #[tokio::test]
    async fn test_admit_prices_across_two_seasons() {
        let (mut source, rental) = fixture();
        let request = stay(&rental, d(2025, 6, 26), d(2025, 7, 5));

        let quote = accepted(admit(&mut source, &request, today()).await.unwrap());
        assert_eq!(quote.price.total, 10000);
        assert_eq!(quote.price.segments.len(), 2);
        assert_eq!(quote.rental_title, "Chalet Bruyère");
    }

    #[tokio::test]
    async fn test_admit_base_rate_outside_seasons() {
        let (mut source, rental) = fixture();
        let request = stay(&rental, d(2025, 4, 1), d(2025, 4, 30));

        let quote = accepted(admit(&mut source, &request, today()).await.unwrap());
        assert_eq!(quote.price.total, 30000);
    }

    #[tokio::test]
    async fn test_admit_rejects_closed_period() {
        let (mut source, rental) = fixture();
        let request = stay(&rental, d(2025, 10, 30), d(2025, 11, 3));

        match admit(&mut source, &request, today()).await.unwrap() {
            Admission::Rejected(Rejection::CampClosed { season, .. }) => assert_eq!(season, "Closed"),
            other => panic!("expected CampClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admit_is_idempotent() {
        let (mut source, rental) = fixture();
        source.blocked.push(BlockedRange {
            id: Uuid::new_v4(),
            rental_id: rental.id,
            date_start: d(2025, 5, 10),
            date_end: d(2025, 5, 12),
        });

        let ok = stay(&rental, d(2025, 6, 26), d(2025, 7, 5));
        let first = accepted(admit(&mut source, &ok, today()).await.unwrap());
        let second = accepted(admit(&mut source, &ok, today()).await.unwrap());
        assert_eq!(first.price, second.price);
        assert_eq!(first.range, second.range);

        let blocked = stay(&rental, d(2025, 5, 11), d(2025, 5, 14));
        let a = admit(&mut source, &blocked, today()).await.unwrap();
        let b = admit(&mut source, &blocked, today()).await.unwrap();
        match (a, b) {
            (Admission::Rejected(x), Admission::Rejected(y)) => assert_eq!(x, y),
            other => panic!("expected two rejections, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_confirmed_stay_blocks_the_next_request() {
        let (mut source, rental) = fixture();
        let request = stay(&rental, d(2025, 4, 1), d(2025, 4, 10));

        let quote = accepted(admit(&mut source, &request, today()).await.unwrap());
        source.reservations.push(Reservation {
            id: Uuid::new_v4(),
            rental_id: rental.id,
            user_id: Uuid::new_v4(),
            date_start: request.date_start,
            date_end: request.date_end,
            adults_count: request.adults,
            kids_count: request.kids,
            price: quote.price.total,
            status: ReservationStatus::Confirmed,
            created_at: Utc::now(),
        });

        let overlapping = stay(&rental, d(2025, 4, 10), d(2025, 4, 12));
        assert!(matches!(
            admit(&mut source, &overlapping, today()).await.unwrap(),
            Admission::Rejected(Rejection::DatesBlocked { .. })
        ));

        let adjacent = stay(&rental, d(2025, 4, 11), d(2025, 4, 12));
        assert!(matches!(
            admit(&mut source, &adjacent, today()).await.unwrap(),
            Admission::Accepted(_)
        ));
    }

    // ==================== reactivation ====================

    fn reservation(rental: &RentalUnit, status: ReservationStatus, start: NaiveDate, end: NaiveDate) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            rental_id: rental.id,
            user_id: Uuid::new_v4(),
            date_start: start,
            date_end: end,
            adults_count: 2,
            kids_count: 0,
            price: 5000,
            status,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reactivation_rejected_when_dates_rebooked() {
        let (mut source, rental) = fixture();
        let cancelled = reservation(&rental, ReservationStatus::Refused, d(2025, 4, 1), d(2025, 4, 5));
        source.reservations.push(cancelled.clone());
        source.reservations.push(reservation(
            &rental,
            ReservationStatus::Confirmed,
            d(2025, 4, 4),
            d(2025, 4, 8),
        ));

        match decide_reactivation(&mut source, &cancelled, today()).await.unwrap() {
            StatusChange::Unavailable(Rejection::DatesBlocked { range }) => {
                assert_eq!(range, DateRange::new(d(2025, 4, 4), d(2025, 4, 8)))
            }
            other => panic!("expected DatesBlocked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_reservation_does_not_block_itself() {
        let (mut source, rental) = fixture();
        let cancelled = reservation(&rental, ReservationStatus::Refused, d(2025, 4, 1), d(2025, 4, 5));
        source.reservations.push(cancelled.clone());

        match decide_reactivation(&mut source, &cancelled, today()).await.unwrap() {
            StatusChange::Changed {
                reservation_id,
                status,
            } => {
                assert_eq!(reservation_id, cancelled.id);
                assert_eq!(status, ReservationStatus::Confirmed);
            }
            other => panic!("expected reactivation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reactivation_requires_refused_status() {
        let (mut source, rental) = fixture();
        let active = reservation(&rental, ReservationStatus::Confirmed, d(2025, 4, 1), d(2025, 4, 5));
        let reads_before = source.reads;

        assert!(matches!(
            decide_reactivation(&mut source, &active, today()).await.unwrap(),
            StatusChange::NotAllowed(LifecycleRejection::NotRefused { .. })
        ));
        assert_eq!(source.reads, reads_before);
    }

    #[tokio::test]
    async fn test_reactivation_rejects_past_stays() {
        let (mut source, rental) = fixture();
        let cancelled = reservation(&rental, ReservationStatus::Refused, d(2025, 2, 1), d(2025, 2, 5));

        assert!(matches!(
            decide_reactivation(&mut source, &cancelled, today()).await.unwrap(),
            StatusChange::Unavailable(Rejection::StartDateInPast { .. })
        ));
    }

    // ==================== retry ====================

    #[derive(Debug)]
    struct FakeDbError(&'static str);

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake database error {}", self.0)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "could not serialize access"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn conflict(code: &'static str) -> AppError {
        AppError::Database(sqlx::Error::Database(Box::new(FakeDbError(code))))
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_serialization_failure() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&quick(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(conflict("40001"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_with_contention() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = with_retry(&quick(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(conflict("40P01")) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Contention { attempts: 3 })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_other_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = with_retry(&quick(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(conflict("23505")) }
        })
        .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
