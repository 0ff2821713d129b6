use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::side_effects::{SideEffect, SideEffectQueue};
use super::trips::{TripManager, TripMark};
use super::validator;
use crate::cache::LocationCache;
use crate::db::Store;
use crate::error::{Degradation, IngestError, ValidationError};
use crate::models::history::MAX_PAGE;
use crate::models::{
    Geofence, GeofenceInput, GpsPoint, HistoryPage, HistoryQuery, NewPoint, PointReport, Trip,
    TripAction, TripActionRequest, Vehicle,
};

/// A point that was stored, plus any best-effort step that did not happen.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub point: GpsPoint,
    pub degraded: Vec<Degradation>,
}

/// Orchestrates validation, persistence and the deferred side effects of ingestion,
/// and fronts the trip, query and geofence operations.
pub struct IngestionPipeline {
    store: Arc<dyn Store>,
    cache: LocationCache,
    side_effects: SideEffectQueue,
    trips: TripManager,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn Store>, cache: LocationCache, side_effects: SideEffectQueue) -> Self {
        Self {
            trips: TripManager::new(store.clone()),
            store,
            cache,
            side_effects,
        }
    }

    /// Vehicle and driver must exist, be active, and the driver must be assigned to it.
    async fn check_assignment(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
    ) -> Result<Vehicle, IngestError> {
        let vehicle = self
            .store
            .get_vehicle(vehicle_id)
            .await?
            .filter(|v| v.is_active)
            .ok_or_else(|| IngestError::NotFound(format!("vehicle {}", vehicle_id)))?;

        let driver = self
            .store
            .get_driver(driver_id)
            .await?
            .filter(|d| d.is_active)
            .ok_or_else(|| IngestError::NotFound(format!("driver {}", driver_id)))?;

        if driver.company_id != vehicle.company_id || vehicle.assigned_driver_id != Some(driver_id)
        {
            return Err(IngestError::BadRequest(format!(
                "driver {} is not assigned to vehicle {}",
                driver_id, vehicle_id
            )));
        }

        Ok(vehicle)
    }

    /// Decodes a raw JSON report (HTTP body or Kafka payload) and ingests it.
    pub async fn process_payload(&self, payload: &[u8]) -> Result<IngestOutcome, IngestError> {
        let report: PointReport = serde_json::from_slice(payload).map_err(|e| {
            warn!("Undecodable point report: {}", e);
            IngestError::BadRequest(format!("malformed point report: {}", e))
        })?;
        self.process_point(report).await
    }

    pub async fn process_point(&self, report: PointReport) -> Result<IngestOutcome, IngestError> {
        // 1. Validate
        if let Err(e) = validator::validate_report(&report) {
            warn!("Rejected point for vehicle {}: {}", report.vehicle_id, e);
            return Err(e.into());
        }

        // 2. Vehicle / driver assignment
        self.check_assignment(report.vehicle_id, report.driver_id)
            .await?;

        // 3. Authoritative persist
        let new_point = NewPoint::from_report(&report, Utc::now());
        let point = self.store.insert_point(new_point).await.map_err(|e| {
            error!("Failed to store point for vehicle {}: {}", report.vehicle_id, e);
            IngestError::from(e)
        })?;

        let mut degraded = Vec::new();

        // 4. Vehicle summary, best-effort
        if let Err(e) = self.store.update_last_location(&point).await {
            warn!("Last location not updated for vehicle {}: {}", point.vehicle_id, e);
            degraded.push(Degradation::LastLocationNotUpdated);
        }

        // 5. Deferred side effects
        let submitted = [
            SideEffect::AnalyzePoint(point.clone()),
            SideEffect::PublishPoint(point.clone()),
            SideEffect::RefreshCache(point.clone()),
        ]
        .into_iter()
        .map(|effect| self.side_effects.submit(effect))
        .fold(true, |all, ok| all && ok);
        if !submitted {
            degraded.push(Degradation::SideEffectsDropped);
        }

        Ok(IngestOutcome { point, degraded })
    }

    pub async fn process_trip(&self, request: TripActionRequest) -> Result<Trip, IngestError> {
        validator::validate_coordinates(request.latitude, request.longitude)?;
        let vehicle = self
            .check_assignment(request.vehicle_id, request.driver_id)
            .await?;

        let mark = TripMark {
            latitude: request.latitude,
            longitude: request.longitude,
            odometer: request.odometer,
            timestamp: request.timestamp,
        };

        match request.action {
            TripAction::Start => {
                self.trips
                    .start(vehicle.company_id, request.vehicle_id, request.driver_id, mark)
                    .await
            }
            TripAction::End => {
                self.trips
                    .end(request.vehicle_id, request.driver_id, mark)
                    .await
            }
        }
    }

    pub async fn current_location(&self, vehicle_id: Uuid) -> Result<GpsPoint, IngestError> {
        self.cache
            .current_location(vehicle_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("location for vehicle {}", vehicle_id)))
    }

    pub async fn location_history(
        &self,
        vehicle_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, IngestError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(IngestError::BadRequest("'from' is after 'to'".to_string()));
            }
        }
        if query.page() > MAX_PAGE {
            return Err(IngestError::BadRequest(format!(
                "page {} is beyond the last allowed page {}",
                query.page(),
                MAX_PAGE
            )));
        }
        Ok(self.cache.location_history(vehicle_id, query).await?)
    }

    fn check_geofence_input(input: &GeofenceInput) -> Result<(), ValidationError> {
        if input.name.trim().is_empty() {
            return Err(ValidationError::EmptyGeofenceName);
        }
        validator::validate_coordinates(input.center_latitude, input.center_longitude)?;
        if !(input.radius_meters > 0.0 && input.radius_meters.is_finite()) {
            return Err(ValidationError::InvalidRadius(input.radius_meters));
        }
        Ok(())
    }

    pub async fn list_geofences(&self, company_id: Uuid) -> Result<Vec<Geofence>, IngestError> {
        Ok(self.store.list_geofences(company_id, false).await?)
    }

    pub async fn create_geofence(
        &self,
        company_id: Uuid,
        input: GeofenceInput,
    ) -> Result<Geofence, IngestError> {
        Self::check_geofence_input(&input)?;
        let fence = input.into_geofence(Uuid::new_v4(), company_id, Utc::now());
        self.store.insert_geofence(&fence).await?;
        self.cache.invalidate_geofences(company_id).await;
        info!("Created geofence {} for company {}", fence.id, company_id);
        Ok(fence)
    }

    pub async fn update_geofence(
        &self,
        company_id: Uuid,
        geofence_id: Uuid,
        input: GeofenceInput,
    ) -> Result<Geofence, IngestError> {
        Self::check_geofence_input(&input)?;
        let existing = self
            .store
            .get_geofence(company_id, geofence_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("geofence {}", geofence_id)))?;

        let mut fence = input.into_geofence(geofence_id, company_id, Utc::now());
        fence.created_at = existing.created_at;
        if !self.store.update_geofence(&fence).await? {
            return Err(IngestError::NotFound(format!("geofence {}", geofence_id)));
        }
        self.cache.invalidate_geofences(company_id).await;
        Ok(fence)
    }

    pub async fn delete_geofence(
        &self,
        company_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<(), IngestError> {
        if !self.store.delete_geofence(company_id, geofence_id).await? {
            return Err(IngestError::NotFound(format!("geofence {}", geofence_id)));
        }
        self.cache.invalidate_geofences(company_id).await;
        info!("Deleted geofence {} of company {}", geofence_id, company_id);
        Ok(())
    }
}
