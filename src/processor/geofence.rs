//! Geofence membership and enter/exit transitions.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::LocationCache;
use crate::db::Store;
use crate::error::IngestError;
use crate::geo::distance_meters;
use crate::models::{DriverEvent, EventType, Geofence, GpsPoint, Severity};

/// True when the point lies within the fence radius (boundary inclusive).
pub fn contains(fence: &Geofence, lat: f64, lon: f64) -> bool {
    distance_meters(lat, lon, fence.center_latitude, fence.center_longitude) <= fence.radius_meters
}

/// Active fences containing the point.
pub fn containing(fences: &[Geofence], lat: f64, lon: f64) -> Vec<Geofence> {
    fences
        .iter()
        .filter(|f| f.is_active && contains(f, lat, lon))
        .cloned()
        .collect()
}

/// Evaluates points against a company's active geofences and tracks the last known
/// membership of each vehicle so that only transitions produce events.
///
/// Membership lives in process memory; after a restart the first point of a vehicle
/// reports an enter for every fence it is already inside.
pub struct GeofenceEvaluator {
    store: Arc<dyn Store>,
    cache: LocationCache,
    membership: DashMap<Uuid, HashSet<Uuid>>,
}

impl GeofenceEvaluator {
    pub fn new(store: Arc<dyn Store>, cache: LocationCache) -> Self {
        Self {
            store,
            cache,
            membership: DashMap::new(),
        }
    }

    async fn company_fences(&self, vehicle_id: Uuid) -> Result<Vec<Geofence>, IngestError> {
        let vehicle = self
            .store
            .get_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| IngestError::NotFound(format!("vehicle {}", vehicle_id)))?;
        Ok(self.cache.company_geofences(vehicle.company_id).await?)
    }

    /// Geofences of the vehicle's company that currently contain `(lat, lon)`.
    pub async fn evaluate(
        &self,
        vehicle_id: Uuid,
        lat: f64,
        lon: f64,
    ) -> Result<Vec<Geofence>, IngestError> {
        let fences = self.company_fences(vehicle_id).await?;
        Ok(containing(&fences, lat, lon))
    }

    /// Enter/exit events for the point, honoring each fence's alert flags.
    ///
    /// Membership is not updated here: pass the returned `Membership` to `commit`
    /// once the events are persisted, so a failed write reports them again.
    pub async fn transitions(
        &self,
        point: &GpsPoint,
    ) -> Result<(Vec<DriverEvent>, Membership), IngestError> {
        let fences = self.company_fences(point.vehicle_id).await?;
        let inside: HashSet<Uuid> = containing(&fences, point.latitude, point.longitude)
            .iter()
            .map(|f| f.id)
            .collect();

        let previous = self
            .membership
            .get(&point.vehicle_id)
            .map(|m| m.clone())
            .unwrap_or_default();

        let mut events = Vec::new();
        for fence in &fences {
            let was_inside = previous.contains(&fence.id);
            let is_inside = inside.contains(&fence.id);
            let (event_type, verb) = match (was_inside, is_inside) {
                (false, true) if fence.alert_on_enter => (EventType::GeofenceEnter, "entered"),
                (true, false) if fence.alert_on_exit => (EventType::GeofenceExit, "left"),
                _ => continue,
            };
            events.push(DriverEvent {
                id: Uuid::new_v4(),
                driver_id: point.driver_id,
                vehicle_id: point.vehicle_id,
                event_type,
                severity: Severity::Medium,
                latitude: point.latitude,
                longitude: point.longitude,
                speed: point.speed,
                description: format!("Vehicle {} geofence '{}'", verb, fence.name),
                geofence_id: Some(fence.id),
                created_at: Utc::now(),
            });
        }

        let membership = Membership {
            vehicle_id: point.vehicle_id,
            inside,
        };
        Ok((events, membership))
    }

    /// Records the vehicle's membership as last known.
    pub fn commit(&self, membership: Membership) {
        self.membership.insert(membership.vehicle_id, membership.inside);
    }
}

/// Fences a vehicle was found inside, pending `GeofenceEvaluator::commit`.
#[derive(Debug, Clone)]
pub struct Membership {
    vehicle_id: Uuid,
    inside: HashSet<Uuid>,
}
