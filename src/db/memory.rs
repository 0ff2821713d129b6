//! In-process store used by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::Store;
use crate::error::StoreError;
use crate::models::{
    Driver, DriverEvent, Geofence, GpsPoint, HistoryPage, HistoryQuery, HistorySort, NewPoint,
    SortOrder, Trip, TripStatus, Vehicle,
};

#[derive(Default)]
struct Tables {
    vehicles: HashMap<Uuid, Vehicle>,
    drivers: HashMap<Uuid, Driver>,
    points: Vec<GpsPoint>,
    events: Vec<DriverEvent>,
    trips: Vec<Trip>,
    geofences: Vec<Geofence>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pub fail_point_inserts: AtomicBool,
    pub fail_last_location: AtomicBool,
    pub fail_event_inserts: AtomicBool,
    pub fail_reads: AtomicBool,
    pub history_reads: AtomicUsize,
    pub latest_reads: AtomicUsize,
    pub geofence_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an active company vehicle with an assigned active driver.
    pub fn seed_fleet(&self) -> (Uuid, Uuid, Uuid) {
        let company_id = Uuid::new_v4();
        let vehicle_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let mut t = self.tables.lock().unwrap();
        t.vehicles.insert(
            vehicle_id,
            Vehicle {
                id: vehicle_id,
                company_id,
                is_active: true,
                assigned_driver_id: Some(driver_id),
            },
        );
        t.drivers.insert(
            driver_id,
            Driver {
                id: driver_id,
                company_id,
                is_active: true,
            },
        );
        (company_id, vehicle_id, driver_id)
    }

    pub fn put_vehicle(&self, vehicle: Vehicle) {
        self.tables.lock().unwrap().vehicles.insert(vehicle.id, vehicle);
    }

    pub fn put_driver(&self, driver: Driver) {
        self.tables.lock().unwrap().drivers.insert(driver.id, driver);
    }

    pub fn points(&self) -> Vec<GpsPoint> {
        self.tables.lock().unwrap().points.clone()
    }

    pub fn events(&self) -> Vec<DriverEvent> {
        self.tables.lock().unwrap().events.clone()
    }

    pub fn trips(&self) -> Vec<Trip> {
        self.tables.lock().unwrap().trips.clone()
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_vehicle(&self, vehicle_id: Uuid) -> Result<Option<Vehicle>, StoreError> {
        self.check_reads()?;
        Ok(self.tables.lock().unwrap().vehicles.get(&vehicle_id).cloned())
    }

    async fn get_driver(&self, driver_id: Uuid) -> Result<Option<Driver>, StoreError> {
        self.check_reads()?;
        Ok(self.tables.lock().unwrap().drivers.get(&driver_id).cloned())
    }

    async fn insert_point(&self, point: NewPoint) -> Result<GpsPoint, StoreError> {
        if self.fail_point_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("point inserts disabled".into()));
        }
        let mut t = self.tables.lock().unwrap();
        let stored = point.stored(t.points.len() as i64 + 1);
        t.points.push(stored.clone());
        Ok(stored)
    }

    async fn update_last_location(&self, _point: &GpsPoint) -> Result<(), StoreError> {
        if self.fail_last_location.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("vehicle summary disabled".into()));
        }
        Ok(())
    }

    async fn recent_points(
        &self,
        driver_id: Uuid,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<GpsPoint>, StoreError> {
        self.check_reads()?;
        let t = self.tables.lock().unwrap();
        let mut points: Vec<GpsPoint> = t
            .points
            .iter()
            .filter(|p| p.driver_id == driver_id && p.captured_at >= since && p.captured_at <= until)
            .cloned()
            .collect();
        points.sort_by(|a, b| b.captured_at.cmp(&a.captured_at).then(b.id.cmp(&a.id)));
        points.truncate(limit.max(0) as usize);
        Ok(points)
    }

    async fn insert_events(&self, events: &[DriverEvent]) -> Result<(), StoreError> {
        if self.fail_event_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("event inserts disabled".into()));
        }
        self.tables.lock().unwrap().events.extend_from_slice(events);
        Ok(())
    }

    async fn latest_point(&self, vehicle_id: Uuid) -> Result<Option<GpsPoint>, StoreError> {
        self.check_reads()?;
        self.latest_reads.fetch_add(1, Ordering::SeqCst);
        let t = self.tables.lock().unwrap();
        Ok(t.points
            .iter()
            .filter(|p| p.vehicle_id == vehicle_id)
            .max_by(|a, b| a.captured_at.cmp(&b.captured_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn location_history(
        &self,
        vehicle_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError> {
        self.check_reads()?;
        self.history_reads.fetch_add(1, Ordering::SeqCst);
        let t = self.tables.lock().unwrap();
        let mut points: Vec<GpsPoint> = t
            .points
            .iter()
            .filter(|p| p.vehicle_id == vehicle_id && query.matches(p))
            .cloned()
            .collect();
        points.sort_by(|a, b| {
            let ord = match query.sort {
                HistorySort::CapturedAt => a.captured_at.cmp(&b.captured_at),
                HistorySort::Speed => a.speed.total_cmp(&b.speed),
            }
            .then(a.id.cmp(&b.id));
            match query.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let total = points.len() as i64;
        let points = points
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect();
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
        self.check_reads()?;
        let t = self.tables.lock().unwrap();
        Ok(t.trips
            .iter()
            .find(|trip| {
                trip.vehicle_id == vehicle_id
                    && trip.driver_id == driver_id
                    && trip.status == TripStatus::Active
            })
            .cloned())
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut t = self.tables.lock().unwrap();
        let exists = t.trips.iter().any(|existing| {
            existing.vehicle_id == trip.vehicle_id
                && existing.driver_id == trip.driver_id
                && existing.status == TripStatus::Active
        });
        if exists {
            return Err(StoreError::Conflict("active trip exists".into()));
        }
        t.trips.push(trip.clone());
        Ok(())
    }

    async fn complete_trip(&self, trip: &Trip) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().unwrap();
        match t
            .trips
            .iter_mut()
            .find(|existing| existing.id == trip.id && existing.status == TripStatus::Active)
        {
            Some(existing) => {
                *existing = trip.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn points_between(
        &self,
        vehicle_id: Uuid,
        driver_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GpsPoint>, StoreError> {
        self.check_reads()?;
        let t = self.tables.lock().unwrap();
        let mut points: Vec<GpsPoint> = t
            .points
            .iter()
            .filter(|p| {
                p.vehicle_id == vehicle_id
                    && p.driver_id == driver_id
                    && p.captured_at >= start
                    && p.captured_at <= end
            })
            .cloned()
            .collect();
        points.sort_by(|a, b| a.captured_at.cmp(&b.captured_at).then(a.id.cmp(&b.id)));
        Ok(points)
    }

    async fn list_geofences(
        &self,
        company_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Geofence>, StoreError> {
        self.check_reads()?;
        self.geofence_reads.fetch_add(1, Ordering::SeqCst);
        let t = self.tables.lock().unwrap();
        Ok(t.geofences
            .iter()
            .filter(|g| g.company_id == company_id && (!active_only || g.is_active))
            .cloned()
            .collect())
    }

    async fn get_geofence(
        &self,
        company_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<Option<Geofence>, StoreError> {
        self.check_reads()?;
        let t = self.tables.lock().unwrap();
        Ok(t.geofences
            .iter()
            .find(|g| g.company_id == company_id && g.id == geofence_id)
            .cloned())
    }

    async fn insert_geofence(&self, geofence: &Geofence) -> Result<(), StoreError> {
        self.tables.lock().unwrap().geofences.push(geofence.clone());
        Ok(())
    }

    async fn update_geofence(&self, geofence: &Geofence) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().unwrap();
        match t
            .geofences
            .iter_mut()
            .find(|g| g.company_id == geofence.company_id && g.id == geofence.id)
        {
            Some(existing) => {
                *existing = geofence.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_geofence(
        &self,
        company_id: Uuid,
        geofence_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().unwrap();
        let before = t.geofences.len();
        t.geofences
            .retain(|g| !(g.company_id == company_id && g.id == geofence_id));
        Ok(t.geofences.len() < before)
    }
}
