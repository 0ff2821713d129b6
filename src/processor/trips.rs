//! Trip lifecycle: none -> active -> completed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::Store;
use crate::error::{IngestError, ValidationError};
use crate::geo::distance_meters;
use crate::models::{GpsPoint, Trip, TripStatus};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TripMetrics {
    pub total_distance: f64,
    pub average_speed: f64,
    pub max_speed: f64,
}

/// Folds the trip's points (oldest first) into distance and speed figures.
///
/// Stationary points (speed 0) still count towards distance but not towards the average.
pub fn aggregate(points: &[GpsPoint]) -> TripMetrics {
    let total_distance = points
        .windows(2)
        .map(|w| distance_meters(w[0].latitude, w[0].longitude, w[1].latitude, w[1].longitude))
        .sum();

    let max_speed = points.iter().map(|p| p.speed).fold(0.0, f64::max);

    let moving: Vec<f64> = points.iter().map(|p| p.speed).filter(|s| *s > 0.0).collect();
    let average_speed = if moving.is_empty() {
        0.0
    } else {
        moving.iter().sum::<f64>() / moving.len() as f64
    };

    TripMetrics {
        total_distance,
        average_speed,
        max_speed,
    }
}

/// Where and when a trip transition happens.
#[derive(Debug, Clone, Copy)]
pub struct TripMark {
    pub latitude: f64,
    pub longitude: f64,
    pub odometer: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

pub struct TripManager {
    store: Arc<dyn Store>,
}

impl TripManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn start(
        &self,
        company_id: Uuid,
        vehicle_id: Uuid,
        driver_id: Uuid,
        mark: TripMark,
    ) -> Result<Trip, IngestError> {
        if self.store.active_trip(vehicle_id, driver_id).await?.is_some() {
            return Err(IngestError::Conflict(format!(
                "vehicle {} / driver {} already has an active trip",
                vehicle_id, driver_id
            )));
        }

        let trip = Trip {
            id: Uuid::new_v4(),
            company_id,
            vehicle_id,
            driver_id,
            status: TripStatus::Active,
            start_time: mark.timestamp,
            end_time: None,
            start_lat: mark.latitude,
            start_lng: mark.longitude,
            end_lat: None,
            end_lng: None,
            start_odometer: mark.odometer,
            end_odometer: None,
            total_distance: 0.0,
            average_speed: 0.0,
            max_speed: 0.0,
            total_duration: 0,
        };
        // Conflict from a concurrent start surfaces here through the store.
        self.store.insert_trip(&trip).await?;

        info!("Started trip {} for vehicle {} driver {}", trip.id, vehicle_id, driver_id);
        Ok(trip)
    }

    pub async fn end(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
        mark: TripMark,
    ) -> Result<Trip, IngestError> {
        let mut trip = self
            .store
            .active_trip(vehicle_id, driver_id)
            .await?
            .ok_or_else(|| {
                IngestError::NotFound(format!(
                    "active trip for vehicle {} / driver {}",
                    vehicle_id, driver_id
                ))
            })?;

        if mark.timestamp < trip.start_time {
            return Err(ValidationError::TripEndsBeforeStart.into());
        }

        let points = self
            .store
            .points_between(vehicle_id, driver_id, trip.start_time, mark.timestamp)
            .await?;
        let metrics = aggregate(&points);

        trip.status = TripStatus::Completed;
        trip.end_time = Some(mark.timestamp);
        trip.end_lat = Some(mark.latitude);
        trip.end_lng = Some(mark.longitude);
        trip.end_odometer = mark.odometer;
        trip.total_distance = metrics.total_distance;
        trip.average_speed = metrics.average_speed;
        trip.max_speed = metrics.max_speed;
        trip.total_duration = (mark.timestamp - trip.start_time).num_seconds();

        if !self.store.complete_trip(&trip).await? {
            // Ended concurrently by another request.
            return Err(IngestError::NotFound(format!("active trip {}", trip.id)));
        }

        info!(
            "Ended trip {} for vehicle {}: {:.0} m over {} s from {} points",
            trip.id,
            vehicle_id,
            trip.total_distance,
            trip.total_duration,
            points.len()
        );
        Ok(trip)
    }
}
