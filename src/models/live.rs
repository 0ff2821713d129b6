use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::DriverEvent;
use super::point::GpsPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointUpdate {
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<&GpsPoint> for PointUpdate {
    fn from(point: &GpsPoint) -> Self {
        Self {
            vehicle_id: point.vehicle_id,
            latitude: point.latitude,
            longitude: point.longitude,
            speed: point.speed,
            heading: point.heading,
            timestamp: point.captured_at,
        }
    }
}

/// Messages fanned out to live observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    PointUpdate(PointUpdate),
    BehaviorEvent(DriverEvent),
}
