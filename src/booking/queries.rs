//! Database queries for the booking engine.
//!
//! Queries used inside the admission transaction take a `&mut PgConnection` so they run
//! the same way on a pooled connection or on `&mut *tx`.

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;

use super::calendar::DateRange;
use super::models::{
    BlockedRange, Reservation, ReservationPeriod, ReservationStatus, ReservationSummary,
    RentalUnit, Season, StayRequest,
};

/// Get a rental unit with its rate type
pub async fn get_rental(
    conn: &mut PgConnection,
    rental_id: Uuid,
) -> Result<Option<RentalUnit>, AppError> {
    let rental = sqlx::query_as::<_, RentalUnit>(
        r#"
        SELECT
            r.id, r.title, r.bedding, r.is_active,
            t.id AS rate_type_id, t.label AS rate_label,
            t.is_active AS rate_active, t.daily_price
        FROM rentals r
        JOIN rate_types t ON t.id = r.rate_type_id
        WHERE r.id = $1
        "#,
    )
    .bind(rental_id)
    .fetch_optional(conn)
    .await?;

    Ok(rental)
}

/// Get all seasons (for cache warming)
pub async fn get_all_seasons(conn: &mut PgConnection) -> Result<Vec<Season>, AppError> {
    let seasons = sqlx::query_as::<_, Season>(
        r#"
        SELECT id, label, is_closed, percentage, date_start, date_end
        FROM seasons
        ORDER BY date_start, label
        "#,
    )
    .fetch_all(conn)
    .await?;

    Ok(seasons)
}

/// Get the seasons during which the campsite is closed
pub async fn get_closed_seasons(conn: &mut PgConnection) -> Result<Vec<Season>, AppError> {
    let seasons = sqlx::query_as::<_, Season>(
        r#"
        SELECT id, label, is_closed, percentage, date_start, date_end
        FROM seasons
        WHERE is_closed = true
        ORDER BY date_start
        "#,
    )
    .fetch_all(conn)
    .await?;

    Ok(seasons)
}

/// Get every season overlapping the given range
pub async fn get_seasons_overlapping(
    conn: &mut PgConnection,
    range: DateRange,
) -> Result<Vec<Season>, AppError> {
    let seasons = sqlx::query_as::<_, Season>(
        r#"
        SELECT id, label, is_closed, percentage, date_start, date_end
        FROM seasons
        WHERE date_start <= $2
          AND date_end >= $1
        ORDER BY date_start
        "#,
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(conn)
    .await?;

    Ok(seasons)
}

/// Get the blocked ranges of a rental unit
pub async fn get_blocked_ranges(
    conn: &mut PgConnection,
    rental_id: Uuid,
) -> Result<Vec<BlockedRange>, AppError> {
    let ranges = sqlx::query_as::<_, BlockedRange>(
        r#"
        SELECT id, rental_id, date_start, date_end
        FROM blocked_ranges
        WHERE rental_id = $1
        ORDER BY date_start
        "#,
    )
    .bind(rental_id)
    .fetch_all(conn)
    .await?;

    Ok(ranges)
}

/// Get the confirmed reservations of a rental unit
pub async fn get_confirmed_reservations(
    conn: &mut PgConnection,
    rental_id: Uuid,
) -> Result<Vec<Reservation>, AppError> {
    let reservations = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT
            id, rental_id, user_id, date_start, date_end,
            adults_count, kids_count, price, status, created_at
        FROM reservations
        WHERE rental_id = $1
          AND status = $2
        ORDER BY date_start
        "#,
    )
    .bind(rental_id)
    .bind(ReservationStatus::Confirmed)
    .fetch_all(conn)
    .await?;

    Ok(reservations)
}

/// Take the per-rental advisory lock for the rest of the transaction
pub async fn lock_rental(conn: &mut PgConnection, rental_id: Uuid) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind(rental_id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Switch the current transaction to SERIALIZABLE; must run before any other statement
pub async fn set_serializable(conn: &mut PgConnection) -> Result<(), AppError> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(conn)
        .await?;

    Ok(())
}

/// Insert a reservation and return it
pub async fn insert_reservation(
    conn: &mut PgConnection,
    stay: &StayRequest,
    user_id: Uuid,
    price: i64,
    status: ReservationStatus,
) -> Result<Reservation, AppError> {
    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        INSERT INTO reservations
            (id, rental_id, user_id, date_start, date_end,
             adults_count, kids_count, price, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING
            id, rental_id, user_id, date_start, date_end,
            adults_count, kids_count, price, status, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(stay.rental_id)
    .bind(user_id)
    .bind(stay.date_start)
    .bind(stay.date_end)
    .bind(stay.adults)
    .bind(stay.kids)
    .bind(price)
    .bind(status)
    .fetch_one(conn)
    .await?;

    Ok(reservation)
}

/// Get a reservation by id, locking the row for the rest of the transaction
pub async fn get_reservation_for_update(
    conn: &mut PgConnection,
    reservation_id: Uuid,
) -> Result<Option<Reservation>, AppError> {
    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT
            id, rental_id, user_id, date_start, date_end,
            adults_count, kids_count, price, status, created_at
        FROM reservations
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(reservation_id)
    .fetch_optional(conn)
    .await?;

    Ok(reservation)
}

/// Change the status of a reservation
pub async fn update_reservation_status(
    conn: &mut PgConnection,
    reservation_id: Uuid,
    status: ReservationStatus,
) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE reservations SET status = $2 WHERE id = $1")
        .bind(reservation_id)
        .bind(status)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(())
}

/// Get a reservation with its rental title
pub async fn get_reservation_summary(
    pool: &PgPool,
    reservation_id: Uuid,
) -> Result<ReservationSummary, AppError> {
    sqlx::query_as::<_, ReservationSummary>(
        r#"
        SELECT
            r.id, r.rental_id, re.title AS rental_title, r.user_id,
            r.date_start, r.date_end, r.adults_count, r.kids_count,
            r.price, r.status, r.created_at
        FROM reservations r
        JOIN rentals re ON re.id = r.rental_id
        WHERE r.id = $1
        "#,
    )
    .bind(reservation_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound)
}

/// Get every reservation of a user, newest stay first
pub async fn get_reservations_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<ReservationSummary>, AppError> {
    let reservations = sqlx::query_as::<_, ReservationSummary>(
        r#"
        SELECT
            r.id, r.rental_id, re.title AS rental_title, r.user_id,
            r.date_start, r.date_end, r.adults_count, r.kids_count,
            r.price, r.status, r.created_at
        FROM reservations r
        JOIN rentals re ON re.id = r.rental_id
        WHERE r.user_id = $1
        ORDER BY r.date_start DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(reservations)
}

/// Get reservations whose stay is past, in progress or upcoming relative to `today`
pub async fn get_reservations_in_period(
    pool: &PgPool,
    period: ReservationPeriod,
    today: NaiveDate,
) -> Result<Vec<ReservationSummary>, AppError> {
    let filter = match period {
        ReservationPeriod::Past => "r.date_end < $1 ORDER BY r.date_end DESC",
        ReservationPeriod::Current => "r.date_start <= $1 AND r.date_end >= $1 ORDER BY r.date_end",
        ReservationPeriod::Upcoming => "r.date_start > $1 ORDER BY r.date_start",
    };

    let sql = format!(
        r#"
        SELECT
            r.id, r.rental_id, re.title AS rental_title, r.user_id,
            r.date_start, r.date_end, r.adults_count, r.kids_count,
            r.price, r.status, r.created_at
        FROM reservations r
        JOIN rentals re ON re.id = r.rental_id
        WHERE {}
        "#,
        filter
    );

    let reservations = sqlx::query_as::<_, ReservationSummary>(&sql)
        .bind(today)
        .fetch_all(pool)
        .await?;

    Ok(reservations)
}
