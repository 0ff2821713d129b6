//! Error taxonomy shared by the store, cache and ingestion layers.

use serde::Serialize;
use thiserror::Error;

/// Input rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),
    #[error("invalid accuracy: {0}")]
    InvalidAccuracy(f64),
    #[error("accuracy too low: {0} m")]
    AccuracyTooLow(f64),
    #[error("null island coordinates (0, 0)")]
    NullIsland,
    #[error("latitude beyond trackable range: {0}")]
    PolarLatitude(f64),
    #[error("invalid speed: {0}")]
    InvalidSpeed(f64),
    #[error("invalid heading: {0}")]
    InvalidHeading(f64),
    #[error("invalid altitude: {0}")]
    InvalidAltitude(f64),
    #[error("invalid battery level: {0}")]
    InvalidBatteryLevel(f64),
    #[error("geofence name must not be empty")]
    EmptyGeofenceName,
    #[error("geofence radius must be positive: {0}")]
    InvalidRadius(f64),
    #[error("trip end time precedes its start time")]
    TripEndsBeforeStart,
}

impl ValidationError {
    /// Machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::InvalidLatitude(_) => "invalid_latitude",
            ValidationError::InvalidLongitude(_) => "invalid_longitude",
            ValidationError::InvalidAccuracy(_) => "invalid_accuracy",
            ValidationError::AccuracyTooLow(_) => "accuracy_too_low",
            ValidationError::NullIsland => "null_island",
            ValidationError::PolarLatitude(_) => "polar_latitude",
            ValidationError::InvalidSpeed(_) => "invalid_speed",
            ValidationError::InvalidHeading(_) => "invalid_heading",
            ValidationError::InvalidAltitude(_) => "invalid_altitude",
            ValidationError::InvalidBatteryLevel(_) => "invalid_battery_level",
            ValidationError::EmptyGeofenceName => "empty_geofence_name",
            ValidationError::InvalidRadius(_) => "invalid_radius",
            ValidationError::TripEndsBeforeStart => "trip_ends_before_start",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a pipeline operation. No error variant implies a stored point.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Validation(e) => e.reason(),
            IngestError::NotFound(_) => "not_found",
            IngestError::BadRequest(_) => "bad_request",
            IngestError::Conflict(_) => "conflict",
            IngestError::Internal(_) => "internal",
        }
    }

    pub fn point_stored(&self) -> bool {
        false
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => IngestError::Conflict(msg),
            other => IngestError::Internal(other.to_string()),
        }
    }
}

/// Best-effort steps that did not happen for an accepted point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    LastLocationNotUpdated,
    SideEffectsDropped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let e: IngestError = ValidationError::InvalidLatitude(91.0).into();
        assert_eq!(e.code(), "invalid_latitude");
        assert!(!e.point_stored());

        let e: IngestError = StoreError::Conflict("trip".into()).into();
        assert_eq!(e.code(), "conflict");

        let e: IngestError = StoreError::Unavailable("down".into()).into();
        assert_eq!(e.code(), "internal");
    }

    #[test]
    fn test_degradation_wire_names() {
        assert_eq!(
            serde_json::to_value(Degradation::SideEffectsDropped).unwrap(),
            "side_effects_dropped"
        );
    }
}
