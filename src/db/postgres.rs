use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::{queries, DbPool, Store};
use crate::error::StoreError;
use crate::models::{
    Driver, DriverEvent, Geofence, GpsPoint, HistoryPage, HistoryQuery, NewPoint, Trip,
    TripStatus, Vehicle,
};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TripRow {
    id: Uuid,
    company_id: Uuid,
    vehicle_id: Uuid,
    driver_id: Uuid,
    status: String, // text column, see TripStatus
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    start_lat: f64,
    start_lng: f64,
    end_lat: Option<f64>,
    end_lng: Option<f64>,
    start_odometer: Option<f64>,
    end_odometer: Option<f64>,
    total_distance: f64,
    average_speed: f64,
    max_speed: f64,
    total_duration: i64,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let status = TripStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Unavailable(format!("unknown trip status '{}'", row.status))
        })?;
        Ok(Trip {
            id: row.id,
            company_id: row.company_id,
            vehicle_id: row.vehicle_id,
            driver_id: row.driver_id,
            status,
            start_time: row.start_time,
            end_time: row.end_time,
            start_lat: row.start_lat,
            start_lng: row.start_lng,
            end_lat: row.end_lat,
            end_lng: row.end_lng,
            start_odometer: row.start_odometer,
            end_odometer: row.end_odometer,
            total_distance: row.total_distance,
            average_speed: row.average_speed,
            max_speed: row.max_speed,
            total_duration: row.total_duration,
        })
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Store for PgStore {
    async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<Option<Vehicle>, StoreError> {
        let vehicle = sqlx::query_as::<_, Vehicle>(queries::SELECT_VEHICLE)
            .bind(vehicle_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vehicle)
    }

    async fn get_driver(&self, driver_id: Uuid) -> Result<Option<Driver>, StoreError> {
        let driver = sqlx::query_as::<_, Driver>(queries::SELECT_DRIVER)
            .bind(driver_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(driver)
    }

    async fn insert_point(&self, point: NewPoint) -> Result<GpsPoint, StoreError> {
        let id: i64 = sqlx::query_scalar(queries::INSERT_GPS_POINT)
            .bind(point.vehicle_id)
            .bind(point.driver_id)
            .bind(point.latitude)
            .bind(point.longitude)
            .bind(point.altitude)
            .bind(point.speed)
            .bind(point.heading)
            .bind(point.horizontal_accuracy)
            .bind(point.battery_level)
            .bind(point.network_type.as_deref())
            .bind(point.captured_at)
            .bind(point.received_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(point.stored(id))
    }

    async fn update_last_location(&self, point: &GpsPoint) -> Result<(), StoreError> {
        sqlx::query(queries::UPDATE_VEHICLE_LAST_LOCATION)
            .bind(point.vehicle_id)
            .bind(point.latitude)
            .bind(point.longitude)
            .bind(point.speed)
            .bind(point.captured_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_points(
        &self,
        driver_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<GpsPoint>, StoreError> {
        let points = sqlx::query_as::<_, GpsPoint>(&queries::select_recent_points())
            .bind(driver_id)
            .bind(since)
            .bind(until)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(points)
    }

    async fn insert_events(&self, events: &[DriverEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for event in events {
            sqlx::query(queries::INSERT_DRIVER_EVENT)
                .bind(event.id)
                .bind(event.driver_id)
                .bind(event.vehicle_id)
                .bind(event.event_type.as_str())
                .bind(event.severity.as_str())
                .bind(event.latitude)
                .bind(event.longitude)
                .bind(event.speed)
                .bind(&event.description)
                .bind(event.geofence_id)
                .bind(event.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn latest_point(&self, vehicle_id: Uuid) -> Result<Option<GpsPoint>, StoreError> {
        let point = sqlx::query_as::<_, GpsPoint>(&queries::select_latest_point())
            .bind(vehicle_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(point)
    }

    async fn location_history(
        &self,
        vehicle_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError> {
        let page_sql = queries::select_history_page(query.sort.column(), query.order.keyword());
        let points = sqlx::query_as::<_, GpsPoint>(&page_sql)
            .bind(vehicle_id)
            .bind(query.driver_id)
            .bind(query.from)
            .bind(query.to)
            .bind(query.min_accuracy)
            .bind(query.max_speed)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&queries::count_history())
            .bind(vehicle_id)
            .bind(query.driver_id)
            .bind(query.from)
            .bind(query.to)
            .bind(query.min_accuracy)
            .bind(query.max_speed)
            .fetch_one(&self.pool)
            .await?;

        Ok(HistoryPage {
            points,
            total,
            page: query.page(),
            limit: query.limit(),
        })
    }

    async fn active_trip(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<Trip>, StoreError> {
        let row = sqlx::query_as::<_, TripRow>(&queries::select_active_trip())
            .bind(vehicle_id)
            .bind(driver_id)
            .bind(TripStatus::Active.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trip::try_from).transpose()
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        // The partial unique index on (vehicle_id, driver_id) WHERE status = 'active'
        // settles concurrent starts.
        let result = sqlx::query(queries::INSERT_TRIP)
            .bind(trip.id)
            .bind(trip.company_id)
            .bind(trip.vehicle_id)
            .bind(trip.driver_id)
            .bind(trip.status.as_str())
            .bind(trip.start_time)
            .bind(trip.start_lat)
            .bind(trip.start_lng)
            .bind(trip.start_odometer)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "vehicle {} / driver {} already has an active trip",
                trip.vehicle_id, trip.driver_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn complete_trip(&self, trip: &Trip) -> Result<bool, StoreError> {
        let result = sqlx::query(queries::UPDATE_TRIP_END)
            .bind(trip.id)
            .bind(trip.end_time)
            .bind(trip.end_lat)
            .bind(trip.end_lng)
            .bind(trip.end_odometer)
            .bind(trip.total_distance)
            .bind(trip.average_speed)
            .bind(trip.max_speed)
            .bind(trip.total_duration)
            .bind(trip.status.as_str())
            .bind(TripStatus::Active.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn points_between(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GpsPoint>, StoreError> {
        let points = sqlx::query_as::<_, GpsPoint>(&queries::select_points_between())
            .bind(vehicle_id)
            .bind(driver_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        Ok(points)
    }

    async fn list_geofences(
        &self,
        company_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Geofence>, StoreError> {
        let fences = sqlx::query_as::<_, Geofence>(&queries::select_company_geofences())
            .bind(company_id)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(fences)
    }

    async fn get_geofence(
        &self,
        company_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<Option<Geofence>, StoreError> {
        let fence = sqlx::query_as::<_, Geofence>(&queries::select_geofence())
            .bind(company_id)
            .bind(geofence_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(fence)
    }

    async fn insert_geofence(&self, geofence: &Geofence) -> Result<(), StoreError> {
        sqlx::query(queries::INSERT_GEOFENCE)
            .bind(geofence.id)
            .bind(geofence.company_id)
            .bind(&geofence.name)
            .bind(&geofence.geofence_type)
            .bind(geofence.center_latitude)
            .bind(geofence.center_longitude)
            .bind(geofence.radius_meters)
            .bind(geofence.alert_on_enter)
            .bind(geofence.alert_on_exit)
            .bind(geofence.is_active)
            .bind(geofence.created_at)
            .bind(geofence.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_geofence(&self, geofence: &Geofence) -> Result<bool, StoreError> {
        let result = sqlx::query(queries::UPDATE_GEOFENCE)
            .bind(geofence.company_id)
            .bind(geofence.id)
            .bind(&geofence.name)
            .bind(&geofence.geofence_type)
            .bind(geofence.center_latitude)
            .bind(geofence.center_longitude)
            .bind(geofence.radius_meters)
            .bind(geofence.alert_on_enter)
            .bind(geofence.alert_on_exit)
            .bind(geofence.is_active)
            .bind(geofence.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_geofence(
        &self,
        company_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(queries::DELETE_GEOFENCE)
            .bind(company_id)
            .bind(geofence_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
