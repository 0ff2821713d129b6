use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A position report as sent by a device, before validation.
///
/// Numeric fields accept either JSON numbers or numeric strings, since
/// several tracker firmwares serialize everything as text.
#[derive(Debug, Clone, Deserialize)]
pub struct PointReport {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    #[serde(deserialize_with = "parse_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "parse_f64")]
    pub longitude: f64,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub altitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub heading: Option<f64>,
    #[serde(deserialize_with = "parse_f64")]
    pub accuracy: f64,
    #[serde(deserialize_with = "parse_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub network_type: Option<String>,
}

/// A validated point about to be written to the store.
#[derive(Debug, Clone)]
pub struct NewPoint {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub horizontal_accuracy: f64,
    pub battery_level: Option<f64>,
    pub network_type: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl NewPoint {
    pub fn from_report(report: &PointReport, received_at: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: report.vehicle_id,
            driver_id: report.driver_id,
            latitude: report.latitude,
            longitude: report.longitude,
            altitude: report.altitude.unwrap_or(0.0),
            speed: report.speed.unwrap_or(0.0),
            heading: report.heading.unwrap_or(0.0),
            horizontal_accuracy: report.accuracy,
            battery_level: report.battery_level,
            network_type: report.network_type.clone(),
            captured_at: report.timestamp,
            received_at,
        }
    }

    pub fn stored(self, id: i64) -> GpsPoint {
        GpsPoint {
            id,
            vehicle_id: self.vehicle_id,
            driver_id: self.driver_id,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            speed: self.speed,
            heading: self.heading,
            horizontal_accuracy: self.horizontal_accuracy,
            battery_level: self.battery_level,
            network_type: self.network_type,
            captured_at: self.captured_at,
            received_at: self.received_at,
        }
    }
}

/// A persisted, validated position. Speed is km/h, heading degrees, accuracy meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GpsPoint {
    pub id: i64, // bigserial
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub horizontal_accuracy: f64,
    pub battery_level: Option<f64>,
    pub network_type: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrFloat {
    String(String),
    Float(f64),
}

fn parse_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::Float(f) => Ok(f),
        StringOrFloat::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS` (taken as UTC), or unix epoch seconds.
pub(crate) fn parse_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrEpoch {
        String(String),
        Epoch(i64),
    }

    match StringOrEpoch::deserialize(deserializer)? {
        StringOrEpoch::Epoch(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid epoch: {}", secs))),
        StringOrEpoch::String(s) => {
            let s = s.trim();
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Ok(t.with_timezone(&Utc));
            }
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: '{}'", s)))
        }
    }
}
