use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SpeedViolation,
    HarshBraking,
    RapidAcceleration,
    GeofenceEnter,
    GeofenceExit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SpeedViolation => "speed_violation",
            EventType::HarshBraking => "harsh_braking",
            EventType::RapidAcceleration => "rapid_acceleration",
            EventType::GeofenceEnter => "geofence_enter",
            EventType::GeofenceExit => "geofence_exit",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived observation about a driver. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEvent {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub severity: Severity,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub description: String,
    /// Set for geofence transitions.
    pub geofence_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
