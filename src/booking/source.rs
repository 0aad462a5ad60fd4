//! Data sources the admission engine reads from.
//!
//! The checker and calculator only see this trait, never a storage representation.

use async_trait::async_trait;
use sqlx::PgConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::AppCache;
use crate::error::AppError;

use super::calendar::DateRange;
use super::models::{BlockedRange, Reservation, RentalUnit, Season};
use super::queries;

/// Read access to the reference data and reservations behind a booking decision
#[async_trait]
pub trait BookingSource: Send {
    async fn rental(&mut self, rental_id: Uuid) -> Result<Option<RentalUnit>, AppError>;

    async fn closed_seasons(&mut self) -> Result<Vec<Season>, AppError>;

    async fn seasons_overlapping(&mut self, range: DateRange) -> Result<Vec<Season>, AppError>;

    async fn blocked_ranges(&mut self, rental_id: Uuid) -> Result<Vec<BlockedRange>, AppError>;

    /// Only reservations that currently hold their dates
    async fn confirmed_reservations(
        &mut self,
        rental_id: Uuid,
    ) -> Result<Vec<Reservation>, AppError>;
}

/// PostgreSQL-backed source over a single connection or transaction.
///
/// With a cache attached, rentals and seasons are served from memory; without one every
/// read goes to the connection, which is what the admission transaction needs.
pub struct PgSource<'a> {
    conn: &'a mut PgConnection,
    cache: Option<&'a AppCache>,
}

impl<'a> PgSource<'a> {
    /// Authoritative reads only
    pub fn live(conn: &'a mut PgConnection) -> Self {
        Self { conn, cache: None }
    }

    /// Reference data may come from the cache
    pub fn cached(conn: &'a mut PgConnection, cache: &'a AppCache) -> Self {
        Self {
            conn,
            cache: Some(cache),
        }
    }

    async fn cached_seasons(&mut self, cache: &AppCache) -> Result<Arc<Vec<Season>>, AppError> {
        if let Some(seasons) = cache.seasons.get(AppCache::SEASONS_KEY).await {
            tracing::debug!("Cache HIT for seasons");
            return Ok(seasons);
        }

        tracing::debug!("Cache MISS for seasons");
        let seasons = Arc::new(queries::get_all_seasons(&mut *self.conn).await?);
        cache
            .seasons
            .insert(AppCache::SEASONS_KEY.to_string(), seasons.clone())
            .await;
        Ok(seasons)
    }
}

#[async_trait]
impl<'a> BookingSource for PgSource<'a> {
    async fn rental(&mut self, rental_id: Uuid) -> Result<Option<RentalUnit>, AppError> {
        let Some(cache) = self.cache else {
            return queries::get_rental(&mut *self.conn, rental_id).await;
        };

        if let Some(rental) = cache.rentals.get(&rental_id).await {
            tracing::debug!("Cache HIT for rental: {}", rental_id);
            return Ok(Some((*rental).clone()));
        }

        tracing::debug!("Cache MISS for rental: {}", rental_id);
        let rental = queries::get_rental(&mut *self.conn, rental_id).await?;
        if let Some(found) = &rental {
            cache.rentals.insert(rental_id, Arc::new(found.clone())).await;
        }
        Ok(rental)
    }

    async fn closed_seasons(&mut self) -> Result<Vec<Season>, AppError> {
        match self.cache {
            Some(cache) => {
                let seasons = self.cached_seasons(cache).await?;
                Ok(seasons.iter().filter(|s| s.is_closed).cloned().collect())
            }
            None => queries::get_closed_seasons(&mut *self.conn).await,
        }
    }

    async fn seasons_overlapping(&mut self, range: DateRange) -> Result<Vec<Season>, AppError> {
        match self.cache {
            Some(cache) => {
                let seasons = self.cached_seasons(cache).await?;
                Ok(seasons
                    .iter()
                    .filter(|s| s.range().overlaps(&range))
                    .cloned()
                    .collect())
            }
            None => queries::get_seasons_overlapping(&mut *self.conn, range).await,
        }
    }

    async fn blocked_ranges(&mut self, rental_id: Uuid) -> Result<Vec<BlockedRange>, AppError> {
        queries::get_blocked_ranges(&mut *self.conn, rental_id).await
    }

    async fn confirmed_reservations(
        &mut self,
        rental_id: Uuid,
    ) -> Result<Vec<Reservation>, AppError> {
        queries::get_confirmed_reservations(&mut *self.conn, rental_id).await
    }
}
