use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{keys, CacheTtls, KvCache};
use crate::db::Store;
use crate::error::StoreError;
use crate::models::{Geofence, GpsPoint, HistoryPage, HistoryQuery};

/// Cache-aside views for current location, location history and company geofences.
///
/// Reads check the cache, fall back to the store on a miss and populate the cache.
/// Cache failures are logged and treated as misses.
///
/// Writes of a vehicle's current location are serialized per vehicle, so the
/// newest `captured_at` seen by this process is the one left in the cache.
#[derive(Clone)]
pub struct LocationCache {
    cache: Arc<dyn KvCache>,
    store: Arc<dyn Store>,
    ttls: CacheTtls,
    current_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LocationCache {
    pub fn new(cache: Arc<dyn KvCache>, store: Arc<dyn Store>, ttls: CacheTtls) -> Self {
        Self {
            cache,
            store,
            ttls,
            current_locks: Arc::new(DashMap::new()),
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                debug!("cache miss: {}", key);
                None
            }
            Err(e) => {
                warn!("Cache read failed for {}, reading store: {}", key, e);
                None
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not serialize cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(key, raw, ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    pub async fn current_location(&self, vehicle_id: Uuid) -> Result<Option<GpsPoint>, StoreError> {
        let key = keys::current_location(vehicle_id);
        if let Some(point) = self.lookup::<GpsPoint>(&key).await {
            return Ok(Some(point));
        }

        let point = self.store.latest_point(vehicle_id).await?;
        if let Some(point) = &point {
            self.refresh_current(point).await;
        }
        Ok(point)
    }

    /// Caches `point` as current unless a newer point is already cached.
    async fn refresh_current(&self, point: &GpsPoint) {
        let lock = self
            .current_locks
            .entry(point.vehicle_id)
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        let key = keys::current_location(point.vehicle_id);
        let newer_cached = self
            .lookup::<GpsPoint>(&key)
            .await
            .map_or(false, |cached| cached.captured_at > point.captured_at);
        if !newer_cached {
            self.populate(&key, point, self.ttls.current_location).await;
        }
    }

    pub async fn location_history(
        &self,
        vehicle_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError> {
        let key = keys::history(vehicle_id, query);
        if let Some(page) = self.lookup::<HistoryPage>(&key).await {
            return Ok(page);
        }

        let page = self.store.location_history(vehicle_id, query).await?;
        self.populate(&key, &page, self.ttls.history).await;
        Ok(page)
    }

    /// Active geofences of a company.
    pub async fn company_geofences(&self, company_id: Uuid) -> Result<Vec<Geofence>, StoreError> {
        let key = keys::company_geofences(company_id);
        if let Some(fences) = self.lookup::<Vec<Geofence>>(&key).await {
            return Ok(fences);
        }

        let fences = self.store.list_geofences(company_id, true).await?;
        self.populate(&key, &fences, self.ttls.geofences).await;
        Ok(fences)
    }

    /// Write path after a point is stored: refresh current location, drop history pages.
    pub async fn point_ingested(&self, point: &GpsPoint) {
        self.refresh_current(point).await;

        match self
            .cache
            .delete_prefix(&keys::history_prefix(point.vehicle_id))
            .await
        {
            Ok(n) => debug!("Invalidated {} history pages for {}", n, point.vehicle_id),
            Err(e) => warn!(
                "History invalidation failed for vehicle {}: {}",
                point.vehicle_id, e
            ),
        }
    }

    pub async fn invalidate_geofences(&self, company_id: Uuid) {
        if let Err(e) = self.cache.delete(&keys::company_geofences(company_id)).await {
            warn!("Geofence invalidation failed for company {}: {}", company_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::memory::MemoryStore;
    use crate::error::CacheError;
    use crate::models::NewPoint;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::Ordering;

    struct BrokenCache;

    #[async_trait]
    impl KvCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    async fn store_with_points(n: i64) -> (Arc<MemoryStore>, Uuid, Vec<GpsPoint>) {
        let store = Arc::new(MemoryStore::new());
        let (_, vehicle_id, driver_id) = store.seed_fleet();
        let base = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        let mut points = Vec::new();
        for i in 0..n {
            let p = NewPoint {
                vehicle_id,
                driver_id,
                latitude: -6.2 + i as f64 * 0.001,
                longitude: 106.8,
                altitude: 0.0,
                speed: 30.0 + i as f64,
                heading: 0.0,
                horizontal_accuracy: 5.0,
                battery_level: None,
                network_type: None,
                captured_at: base + ChronoDuration::seconds(i * 10),
                received_at: base + ChronoDuration::seconds(i * 10),
            };
            points.push(store.insert_point(p).await.unwrap());
        }
        (store, vehicle_id, points)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (store, vehicle_id, points) = store_with_points(3).await;
        let views = LocationCache::new(
            Arc::new(MemoryCache::new(100)),
            store.clone(),
            CacheTtls::default(),
        );

        let first = views.current_location(vehicle_id).await.unwrap();
        assert_eq!(first.as_ref(), points.last());
        assert_eq!(store.latest_reads.load(Ordering::SeqCst), 1);

        let second = views.current_location(vehicle_id).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(store.latest_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_invalidated_by_ingest() {
        let (store, vehicle_id, points) = store_with_points(3).await;
        let views = LocationCache::new(
            Arc::new(MemoryCache::new(100)),
            store.clone(),
            CacheTtls::default(),
        );
        let q = HistoryQuery::default();

        let page = views.location_history(vehicle_id, &q).await.unwrap();
        assert_eq!(page.total, 3);
        views.location_history(vehicle_id, &q).await.unwrap();
        assert_eq!(store.history_reads.load(Ordering::SeqCst), 1);

        views.point_ingested(&points[2]).await;

        views.location_history(vehicle_id, &q).await.unwrap();
        assert_eq!(store.history_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_history_queries_do_not_collide() {
        let (store, vehicle_id, _) = store_with_points(5).await;
        let views = LocationCache::new(
            Arc::new(MemoryCache::new(100)),
            store.clone(),
            CacheTtls::default(),
        );

        let all = views
            .location_history(vehicle_id, &HistoryQuery::default())
            .await
            .unwrap();
        let slow = views
            .location_history(
                vehicle_id,
                &HistoryQuery {
                    max_speed: Some(31.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(slow.total, 2);
        assert_eq!(store.history_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ingest_refreshes_current_location() {
        let (store, vehicle_id, points) = store_with_points(2).await;
        let views = LocationCache::new(
            Arc::new(MemoryCache::new(100)),
            store.clone(),
            CacheTtls::default(),
        );

        views.point_ingested(&points[1]).await;
        let current = views.current_location(vehicle_id).await.unwrap();
        assert_eq!(current.as_ref(), Some(&points[1]));
        assert_eq!(store.latest_reads.load(Ordering::SeqCst), 0);

        // An older point arriving late keeps the newer entry.
        views.point_ingested(&points[0]).await;
        let current = views.current_location(vehicle_id).await.unwrap();
        assert_eq!(current.as_ref(), Some(&points[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_keep_newest_point() {
        let (store, vehicle_id, points) = store_with_points(8).await;
        let views = LocationCache::new(
            Arc::new(MemoryCache::new(100)),
            store.clone(),
            CacheTtls::default(),
        );

        for _ in 0..20 {
            views
                .cache
                .delete(&keys::current_location(vehicle_id))
                .await
                .unwrap();
            let handles: Vec<_> = [5, 7, 0, 3, 6, 1, 4, 2]
                .into_iter()
                .map(|i| {
                    let views = views.clone();
                    let point = points[i].clone();
                    tokio::spawn(async move { views.point_ingested(&point).await })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }

            let current = views.current_location(vehicle_id).await.unwrap();
            assert_eq!(current.as_ref(), points.last());
        }
        assert_eq!(store.latest_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_broken_cache_degrades_to_store() {
        let (store, vehicle_id, points) = store_with_points(2).await;
        let views = LocationCache::new(Arc::new(BrokenCache), store.clone(), CacheTtls::default());

        let current = views.current_location(vehicle_id).await.unwrap();
        assert_eq!(current.as_ref(), points.last());
        let page = views
            .location_history(vehicle_id, &HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        // Write path must not panic or error either.
        views.point_ingested(&points[1]).await;
        views.invalidate_geofences(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_store_errors_surface_on_miss() {
        let (store, vehicle_id, _) = store_with_points(1).await;
        let views = LocationCache::new(
            Arc::new(MemoryCache::new(100)),
            store.clone(),
            CacheTtls::default(),
        );
        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(views.current_location(vehicle_id).await.is_err());
    }
}
