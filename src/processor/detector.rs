//! Driver behavior analysis over a short window of recent points.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::models::{DriverEvent, EventType, GpsPoint, Severity};

pub const SPEED_LIMIT_KMH: f64 = 80.0;
pub const HARSH_BRAKING_THRESHOLD: f64 = 3.5;
pub const RAPID_ACCELERATION_THRESHOLD: f64 = 2.5;

/// How far back the history window reaches.
pub fn history_window() -> Duration {
    Duration::minutes(5)
}

fn speed_severity(speed: f64) -> Severity {
    if speed > 150.0 {
        Severity::Critical
    } else if speed > 100.0 {
        Severity::High
    } else if speed > 90.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn braking_severity(rate: f64) -> Severity {
    if rate > 5.0 {
        Severity::Critical
    } else if rate > 4.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn acceleration_severity(rate: f64) -> Severity {
    if rate > 3.5 {
        Severity::Critical
    } else if rate > 3.0 {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn event_for(
    point: &GpsPoint,
    event_type: EventType,
    severity: Severity,
    description: String,
) -> DriverEvent {
    DriverEvent {
        id: Uuid::new_v4(),
        driver_id: point.driver_id,
        vehicle_id: point.vehicle_id,
        event_type,
        severity,
        latitude: point.latitude,
        longitude: point.longitude,
        speed: point.speed,
        description,
        geofence_id: None,
        created_at: Utc::now(),
    }
}

/// Emits behavior events for `current` given the driver's recent points, newest first.
///
/// `history` may already contain `current` (it is persisted before analysis); it is
/// skipped by id. Rates are the speed delta per second of capture time between
/// `current` and the newest remaining point.
pub fn detect(current: &GpsPoint, history: &[GpsPoint]) -> Vec<DriverEvent> {
    let mut events = Vec::new();

    if current.speed > SPEED_LIMIT_KMH {
        events.push(event_for(
            current,
            EventType::SpeedViolation,
            speed_severity(current.speed),
            format!(
                "Speed {:.1} km/h exceeds limit of {:.0} km/h",
                current.speed, SPEED_LIMIT_KMH
            ),
        ));
    }

    let previous = match history.iter().find(|p| p.id != current.id) {
        Some(p) => p,
        None => return events,
    };

    let dt = (current.captured_at - previous.captured_at).num_milliseconds() as f64 / 1000.0;
    if dt <= 0.0 {
        // Duplicate or out-of-order capture time.
        return events;
    }

    let deceleration = (previous.speed - current.speed) / dt;
    if deceleration > HARSH_BRAKING_THRESHOLD {
        events.push(event_for(
            current,
            EventType::HarshBraking,
            braking_severity(deceleration),
            format!(
                "Harsh braking: {:.1} -> {:.1} km/h in {:.1}s ({:.2}/s)",
                previous.speed, current.speed, dt, deceleration
            ),
        ));
    }

    let acceleration = (current.speed - previous.speed) / dt;
    if acceleration > RAPID_ACCELERATION_THRESHOLD {
        events.push(event_for(
            current,
            EventType::RapidAcceleration,
            acceleration_severity(acceleration),
            format!(
                "Rapid acceleration: {:.1} -> {:.1} km/h in {:.1}s ({:.2}/s)",
                previous.speed, current.speed, dt, acceleration
            ),
        ));
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn point(id: i64, speed: f64, captured_at: DateTime<Utc>) -> GpsPoint {
        GpsPoint {
            id,
            vehicle_id: Uuid::nil(),
            driver_id: Uuid::nil(),
            latitude: -6.2,
            longitude: 106.8,
            altitude: 0.0,
            speed,
            heading: 0.0,
            horizontal_accuracy: 5.0,
            battery_level: None,
            network_type: None,
            captured_at,
            received_at: captured_at,
        }
    }

    fn of_type(events: &[DriverEvent], t: EventType) -> Vec<&DriverEvent> {
        events.iter().filter(|e| e.event_type == t).collect()
    }

    #[test]
    fn test_speed_violation_severities() {
        let cases = [
            (80.0, None),
            (85.0, Some(Severity::Low)),
            (95.0, Some(Severity::Medium)),
            (125.0, Some(Severity::High)),
            (155.0, Some(Severity::Critical)),
        ];
        for (speed, expected) in cases {
            let events = detect(&point(1, speed, at(0)), &[]);
            let speeding = of_type(&events, EventType::SpeedViolation);
            assert_eq!(speeding.first().map(|e| e.severity), expected, "speed {}", speed);
        }
    }

    #[test]
    fn test_harsh_braking_critical() {
        let prev = point(1, 80.0, at(0));
        let curr = point(2, 20.0, at(1));
        let events = detect(&curr, &[curr.clone(), prev]);

        let braking = of_type(&events, EventType::HarshBraking);
        assert_eq!(braking.len(), 1);
        assert_eq!(braking[0].severity, Severity::Critical);
        assert!(of_type(&events, EventType::RapidAcceleration).is_empty());
    }

    #[test]
    fn test_braking_bands() {
        // 10 s apart: rate = delta / 10
        let cases = [
            (30.0, None),
            (38.0, Some(Severity::Medium)),
            (45.0, Some(Severity::High)),
            (55.0, Some(Severity::Critical)),
        ];
        for (delta, expected) in cases {
            let prev = point(1, 60.0, at(0));
            let curr = point(2, 60.0 - delta, at(10));
            let events = detect(&curr, &[prev]);
            let braking = of_type(&events, EventType::HarshBraking);
            assert_eq!(braking.first().map(|e| e.severity), expected, "delta {}", delta);
        }
    }

    #[test]
    fn test_rapid_acceleration_bands() {
        let cases = [
            (20.0, None),
            (28.0, Some(Severity::Medium)),
            (32.0, Some(Severity::High)),
            (40.0, Some(Severity::Critical)),
        ];
        for (delta, expected) in cases {
            let prev = point(1, 10.0, at(0));
            let curr = point(2, 10.0 + delta, at(10));
            let events = detect(&curr, &[prev]);
            let accel = of_type(&events, EventType::RapidAcceleration);
            assert_eq!(accel.first().map(|e| e.severity), expected, "delta {}", delta);
        }
    }

    #[test]
    fn test_duplicate_timestamp_skips_rate_checks() {
        let prev = point(1, 80.0, at(5));
        let curr = point(2, 0.0, at(5));
        assert!(detect(&curr, &[prev]).is_empty());
    }

    #[test]
    fn test_out_of_order_history_skips_rate_checks() {
        let newer = point(1, 10.0, at(20));
        let curr = point(2, 70.0, at(10));
        assert!(detect(&curr, &[newer]).is_empty());
    }

    #[test]
    fn test_no_history_only_speeding() {
        let curr = point(7, 130.0, at(0));
        let events = detect(&curr, &[curr.clone()]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::SpeedViolation);
        assert_eq!(events[0].speed, 130.0);
    }

    #[test]
    fn test_speeding_and_acceleration_together() {
        let prev = point(1, 60.0, at(0));
        let curr = point(2, 95.0, at(2));
        let events = detect(&curr, &[prev]);
        assert_eq!(of_type(&events, EventType::SpeedViolation).len(), 1);
        assert_eq!(
            of_type(&events, EventType::RapidAcceleration)[0].severity,
            Severity::Critical
        );
    }
}
