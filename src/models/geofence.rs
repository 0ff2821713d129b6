use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named circular region. Read-only from the ingestion path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Geofence {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub geofence_type: String,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_meters: f64,
    pub alert_on_enter: bool,
    pub alert_on_exit: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_type() -> String {
    "circle".to_string()
}

/// Create/update payload for the geofence management surface.
#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceInput {
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub geofence_type: String,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub radius_meters: f64,
    #[serde(default = "default_true")]
    pub alert_on_enter: bool,
    #[serde(default = "default_true")]
    pub alert_on_exit: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl GeofenceInput {
    pub fn into_geofence(self, id: Uuid, company_id: Uuid, now: DateTime<Utc>) -> Geofence {
        Geofence {
            id,
            company_id,
            name: self.name.trim().to_string(),
            geofence_type: self.geofence_type,
            center_latitude: self.center_latitude,
            center_longitude: self.center_longitude,
            radius_meters: self.radius_meters,
            alert_on_enter: self.alert_on_enter,
            alert_on_exit: self.alert_on_exit,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}
