//! In-memory caching using moka
//!
//! Caches the reference data that quotes read on every request: seasons and rental units.
//! Reservations are never cached, and confirmations always read live from the database.

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::booking::models::{RentalUnit, Season};
use crate::booking::queries;

/// Application cache holding seasons and rental units
#[derive(Clone)]
pub struct AppCache {
    /// Full season list, stored under a single key
    pub seasons: Cache<String, Arc<Vec<Season>>>,
    /// Rental units with their rate type (rental id -> RentalUnit)
    pub rentals: Cache<Uuid, Arc<RentalUnit>>,
}

impl AppCache {
    pub const SEASONS_KEY: &'static str = "seasons";

    /// Create a new cache instance with configured TTLs
    pub fn new() -> Self {
        Self {
            // Seasons: 1 entry, 15 min TTL, refreshed by the warmer
            seasons: Cache::builder()
                .max_capacity(1)
                .time_to_live(Duration::from_secs(15 * 60))
                .build(),

            // Rentals: 1000 entries, 5 min TTL so deactivation shows up quickly
            rentals: Cache::builder()
                .max_capacity(1000)
                .time_to_live(Duration::from_secs(5 * 60))
                .time_to_idle(Duration::from_secs(2 * 60))
                .build(),
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            seasons_cached: self.seasons.entry_count() > 0,
            rentals_size: self.rentals.entry_count(),
        }
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.seasons.invalidate_all();
        self.rentals.invalidate_all();
        info!("All caches invalidated");
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub seasons_cached: bool,
    pub rentals_size: u64,
}

/// Start background cache warmer
///
/// Warms the season cache on startup and refreshes it every `refresh`.
pub async fn start_cache_warmer(cache: AppCache, db: PgPool, refresh: Duration) {
    let mut interval = interval(refresh);
    loop {
        // first tick completes immediately
        interval.tick().await;
        warm_cache(&cache, &db).await;
    }
}

async fn warm_cache(cache: &AppCache, db: &PgPool) {
    info!("Starting cache warm-up...");

    let mut conn = match db.acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("Failed to acquire connection for cache warm-up: {}", e);
            return;
        }
    };

    match queries::get_all_seasons(&mut *conn).await {
        Ok(seasons) => {
            cache
                .seasons
                .insert(AppCache::SEASONS_KEY.to_string(), Arc::new(seasons))
                .await;
        }
        Err(e) => warn!("Failed to warm seasons cache: {}", e),
    }

    info!("Cache warm-up complete. Stats: {:?}", cache.stats());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rental() -> RentalUnit {
        RentalUnit {
            id: Uuid::new_v4(),
            title: "Mobil-home Les Pins".to_string(),
            bedding: 4,
            is_active: true,
            rate_type_id: Uuid::new_v4(),
            rate_label: "Mobil-home".to_string(),
            rate_active: true,
            daily_price: 4500,
        }
    }

    #[tokio::test]
    async fn test_stats_and_invalidate_all() {
        let cache = AppCache::new();
        assert!(!cache.stats().seasons_cached);
        assert_eq!(cache.stats().rentals_size, 0);

        let unit = rental();
        cache.rentals.insert(unit.id, Arc::new(unit.clone())).await;
        cache
            .seasons
            .insert(
                AppCache::SEASONS_KEY.to_string(),
                Arc::new(vec![Season {
                    id: Uuid::new_v4(),
                    label: "High".to_string(),
                    is_closed: false,
                    percentage: 120,
                    date_start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                    date_end: NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(),
                }]),
            )
            .await;
        cache.rentals.run_pending_tasks().await;
        cache.seasons.run_pending_tasks().await;

        let stats = cache.stats();
        assert!(stats.seasons_cached);
        assert_eq!(stats.rentals_size, 1);

        cache.invalidate_all();
        assert!(cache.rentals.get(&unit.id).await.is_none());
        assert!(cache.seasons.get(AppCache::SEASONS_KEY).await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = AppCache::default();
        let clone = cache.clone();
        let unit = rental();

        clone.rentals.insert(unit.id, Arc::new(unit.clone())).await;
        let cached = cache.rentals.get(&unit.id).await.unwrap();
        assert_eq!(cached.title, unit.title);
    }
}
