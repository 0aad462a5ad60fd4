//! Booking route handlers

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{Caller, Capability};
use crate::cache::CacheStats;
use crate::error::Result;
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

use super::requests::{BookingRequest, ReservationListQuery};
use super::responses::{ConfirmResponse, QuoteResponse, ReservationResponse, TransitionResponse};
use super::services;

/// Booking API routes, mounted under `/api`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", post(quote))
        .route("/reservations", post(confirm).get(my_reservations))
        .route("/reservations/:id", get(reservation))
        .route("/reservations/:id/cancel", post(cancel))
        .route("/admin/reservations", get(admin_reservations))
        .route("/admin/reservations/:id/reactivate", post(reactivate))
        .route("/admin/cache", get(cache_stats))
        .route("/admin/cache/invalidate", post(invalidate_cache))
}

/// Check availability and price a stay
async fn quote(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<BookingRequest>,
) -> Result<Json<QuoteResponse>> {
    caller.require(Capability::RequestQuote)?;

    let stay = request.into_stay();
    let admission =
        services::check_and_quote(&state.db, &state.cache, &stay, state.clock.today()).await?;

    Ok(Json(QuoteResponse::from_admission(admission, &state.currency)))
}

/// Book a stay for the caller, or for another user when a manager sets `user_id`
async fn confirm(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<BookingRequest>,
) -> Result<Json<ConfirmResponse>> {
    caller.require(Capability::BookStay)?;
    let owner = caller.booking_owner(request.user_id)?;

    let stay = request.into_stay();
    let confirmation = services::check_and_confirm(
        &state.db,
        &stay,
        owner,
        state.clock.today(),
        &state.retry,
    )
    .await?;

    Ok(Json(ConfirmResponse::from_confirmation(
        confirmation,
        &state.currency,
    )))
}

/// List the caller's own reservations
async fn my_reservations(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ReservationResponse>>> {
    caller.require(Capability::ViewOwnReservations)?;

    let views =
        services::list_user_reservations(&state.db, caller.user_id, state.clock.today()).await?;

    Ok(Json(
        views
            .into_iter()
            .map(|view| ReservationResponse::from_view(view, &state.currency))
            .collect(),
    ))
}

async fn reservation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>> {
    caller.require(Capability::ViewOwnReservations)?;

    let view = services::get_reservation(&state.db, id, &caller, state.clock.today()).await?;

    Ok(Json(ReservationResponse::from_view(view, &state.currency)))
}

async fn cancel(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>> {
    caller.require(Capability::CancelOwnReservation)?;

    let change = services::cancel_reservation(&state.db, id, &caller, state.clock.today()).await?;

    Ok(Json(TransitionResponse::from_change(id, change)))
}

/// Back-office listing by period
async fn admin_reservations(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<ReservationListQuery>,
) -> Result<Json<Vec<ReservationResponse>>> {
    caller.require(Capability::ManageReservations)?;

    let reservations =
        services::list_reservations_in_period(&state.db, query.period, state.clock.today())
            .await?;

    Ok(Json(
        reservations
            .into_iter()
            .map(|summary| ReservationResponse::new(summary, None, &state.currency))
            .collect(),
    ))
}

async fn reactivate(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>> {
    caller.require(Capability::ManageReservations)?;

    let change =
        services::reactivate_reservation(&state.db, id, state.clock.today(), &state.retry).await?;

    Ok(Json(TransitionResponse::from_change(id, change)))
}

async fn cache_stats(State(state): State<AppState>, caller: Caller) -> Result<Json<CacheStats>> {
    caller.require(Capability::ManageReservations)?;

    Ok(Json(state.cache.stats()))
}

/// Drop cached seasons and rentals after reference data changes
async fn invalidate_cache(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<CacheStats>> {
    caller.require(Capability::ManageReservations)?;

    state.cache.invalidate_all();
    Ok(Json(state.cache.stats()))
}
