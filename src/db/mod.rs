use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Driver, DriverEvent, Geofence, GpsPoint, HistoryPage, HistoryQuery, NewPoint, Trip, Vehicle,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// The relational source of truth. Every write is scoped by vehicle or company.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<Option<Vehicle>, StoreError>;

    async fn get_driver(&self, driver_id: Uuid) -> Result<Option<Driver>, StoreError>;

    async fn insert_point(&self, point: NewPoint) -> Result<GpsPoint, StoreError>;

    /// Refreshes the vehicle's last-known-location summary.
    async fn update_last_location(&self, point: &GpsPoint) -> Result<(), StoreError>;

    /// Newest-first points for a driver captured in `[since, until]`, at most `limit`.
    async fn recent_points(
        &self,
        driver_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<GpsPoint>, StoreError>;

    async fn insert_events(&self, events: &[DriverEvent]) -> Result<(), StoreError>;

    async fn latest_point(&self, vehicle_id: Uuid) -> Result<Option<GpsPoint>, StoreError>;

    async fn location_history(
        &self,
        vehicle_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError>;

    async fn active_trip(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<Trip>, StoreError>;

    /// Fails with `StoreError::Conflict` when the pair already has an active trip.
    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError>;

    /// Returns false when the trip was no longer active.
    async fn complete_trip(&self, trip: &Trip) -> Result<bool, StoreError>;

    /// Oldest-first points for the pair captured in `[start, end]`.
    async fn points_between(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GpsPoint>, StoreError>;

    async fn list_geofences(
        &self,
        company_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Geofence>, StoreError>;

    async fn get_geofence(
        &self,
        company_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<Option<Geofence>, StoreError>;

    async fn insert_geofence(&self, geofence: &Geofence) -> Result<(), StoreError>;

    /// Returns false when no geofence matched.
    async fn update_geofence(&self, geofence: &Geofence) -> Result<bool, StoreError>;

    /// Returns false when no geofence matched.
    async fn delete_geofence(&self, company_id: Uuid, geofence_id: Uuid)
        -> Result<bool, StoreError>;
}
