use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Active,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TripStatus::Active),
            "completed" => Some(TripStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub company_id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub status: TripStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_lat: Option<f64>,
    pub end_lng: Option<f64>,
    pub start_odometer: Option<f64>,
    pub end_odometer: Option<f64>,
    /// Meters.
    pub total_distance: f64,
    /// km/h, over moving points only.
    pub average_speed: f64,
    pub max_speed: f64,
    /// Seconds.
    pub total_duration: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripAction {
    Start,
    End,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripActionRequest {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub action: TripAction,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(deserialize_with = "crate::models::point::parse_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub odometer: Option<f64>,
}
