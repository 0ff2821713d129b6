//! Coordinate and signal checks applied before anything is stored.

use crate::error::ValidationError;
use crate::models::PointReport;

/// Readings less precise than this are dropped rather than stored.
pub const MAX_ACCURACY_METERS: f64 = 50.0;
/// Beyond this latitude a vehicle fix is treated as a sentinel value.
pub const MAX_TRACKABLE_LATITUDE: f64 = 89.0;

/// Checks a coordinate pair without an accuracy reading (trip endpoints, geofence centers).
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::InvalidLatitude(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationError::InvalidLongitude(lon));
    }
    check_sentinels(lat, lon)
}

/// Rules run in order: latitude range, longitude range, accuracy, then sentinel values.
pub fn validate(lat: f64, lon: f64, accuracy: f64) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::InvalidLatitude(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationError::InvalidLongitude(lon));
    }
    if !(accuracy >= 0.0) {
        return Err(ValidationError::InvalidAccuracy(accuracy));
    }
    if accuracy > MAX_ACCURACY_METERS {
        return Err(ValidationError::AccuracyTooLow(accuracy));
    }
    check_sentinels(lat, lon)
}

fn check_sentinels(lat: f64, lon: f64) -> Result<(), ValidationError> {
    if lat == 0.0 && lon == 0.0 {
        return Err(ValidationError::NullIsland);
    }
    if lat.abs() > MAX_TRACKABLE_LATITUDE {
        return Err(ValidationError::PolarLatitude(lat));
    }
    Ok(())
}

/// Full report check: the coordinate rules plus sanity of the optional readings.
pub fn validate_report(report: &PointReport) -> Result<(), ValidationError> {
    validate(report.latitude, report.longitude, report.accuracy)?;

    if let Some(speed) = report.speed {
        if !(speed >= 0.0 && speed.is_finite()) {
            return Err(ValidationError::InvalidSpeed(speed));
        }
    }
    if let Some(heading) = report.heading {
        if !(0.0..=360.0).contains(&heading) {
            return Err(ValidationError::InvalidHeading(heading));
        }
    }
    if let Some(altitude) = report.altitude {
        if !altitude.is_finite() {
            return Err(ValidationError::InvalidAltitude(altitude));
        }
    }
    if let Some(battery) = report.battery_level {
        if !(0.0..=100.0).contains(&battery) {
            return Err(ValidationError::InvalidBatteryLevel(battery));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn report(lat: f64, lon: f64, accuracy: f64) -> PointReport {
        PointReport {
            vehicle_id: Uuid::new_v4(),
            driver_id: Uuid::new_v4(),
            latitude: lat,
            longitude: lon,
            altitude: None,
            speed: Some(30.0),
            heading: Some(90.0),
            accuracy,
            timestamp: Utc::now(),
            battery_level: None,
            network_type: None,
        }
    }

    #[test]
    fn test_accepts_ordinary_fix() {
        assert_eq!(validate(-6.2088, 106.8456, 5.0), Ok(()));
        assert_eq!(validate(-6.2088, 106.8456, 50.0), Ok(()));
    }

    #[test]
    fn test_rejects_latitude_out_of_range() {
        assert_eq!(
            validate(91.0, 106.0, 5.0),
            Err(ValidationError::InvalidLatitude(91.0))
        );
        // Latitude is checked before accuracy.
        assert_eq!(
            validate(91.0, 106.0, 150.0),
            Err(ValidationError::InvalidLatitude(91.0))
        );
        assert!(matches!(
            validate(f64::NAN, 0.0, 1.0),
            Err(ValidationError::InvalidLatitude(_))
        ));
    }

    #[test]
    fn test_rejects_longitude_out_of_range() {
        assert_eq!(
            validate(10.0, -180.5, 5.0),
            Err(ValidationError::InvalidLongitude(-180.5))
        );
    }

    #[test]
    fn test_rejects_low_accuracy() {
        assert_eq!(
            validate(-6.2, 106.8, 150.0),
            Err(ValidationError::AccuracyTooLow(150.0))
        );
        assert_eq!(
            validate(-6.2, 106.8, 50.1),
            Err(ValidationError::AccuracyTooLow(50.1))
        );
    }

    #[test]
    fn test_rejects_negative_or_missing_accuracy() {
        assert_eq!(
            validate(-6.2, 106.8, -1.0),
            Err(ValidationError::InvalidAccuracy(-1.0))
        );
        assert!(matches!(
            validate(-6.2, 106.8, f64::NAN),
            Err(ValidationError::InvalidAccuracy(a)) if a.is_nan()
        ));
        assert_eq!(validate(-6.2, 106.8, 0.0), Ok(()));
    }

    #[test]
    fn test_rejects_sentinels() {
        assert_eq!(validate(0.0, 0.0, 5.0), Err(ValidationError::NullIsland));
        assert_eq!(
            validate(89.5, 10.0, 5.0),
            Err(ValidationError::PolarLatitude(89.5))
        );
        assert_eq!(
            validate(-90.0, 10.0, 5.0),
            Err(ValidationError::PolarLatitude(-90.0))
        );
        // Zero on a single axis is a real place.
        assert_eq!(validate(0.0, 32.5, 5.0), Ok(()));
    }

    #[test]
    fn test_report_speed_and_heading() {
        let mut r = report(-6.2, 106.8, 5.0);
        assert_eq!(validate_report(&r), Ok(()));

        r.speed = Some(-1.0);
        assert_eq!(validate_report(&r), Err(ValidationError::InvalidSpeed(-1.0)));

        r.speed = None;
        r.heading = Some(361.0);
        assert_eq!(
            validate_report(&r),
            Err(ValidationError::InvalidHeading(361.0))
        );
    }

    #[test]
    fn test_report_altitude_and_battery() {
        let mut r = report(-6.2, 106.8, 5.0);
        r.altitude = Some(-28.0);
        r.battery_level = Some(100.0);
        assert_eq!(validate_report(&r), Ok(()));

        r.altitude = Some(f64::INFINITY);
        assert_eq!(
            validate_report(&r),
            Err(ValidationError::InvalidAltitude(f64::INFINITY))
        );
        r.altitude = Some(f64::NAN);
        assert!(matches!(
            validate_report(&r),
            Err(ValidationError::InvalidAltitude(_))
        ));

        r.altitude = None;
        r.battery_level = Some(f64::NAN);
        assert!(matches!(
            validate_report(&r),
            Err(ValidationError::InvalidBatteryLevel(_))
        ));
        r.battery_level = Some(120.0);
        assert_eq!(
            validate_report(&r),
            Err(ValidationError::InvalidBatteryLevel(120.0))
        );
        r.battery_level = Some(-5.0);
        assert_eq!(validate_report(&r).unwrap_err().reason(), "invalid_battery_level");
    }

    #[test]
    fn test_report_rejected_regardless_of_other_fields() {
        assert!(validate_report(&report(91.0, 106.8, 5.0)).is_err());
        assert!(validate_report(&report(-6.2, 106.8, 150.0)).is_err());
    }
}
