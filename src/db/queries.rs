pub const SELECT_VEHICLE: &str = r#"
SELECT id, company_id, is_active, assigned_driver_id FROM vehicles WHERE id = $1;
"#;

pub const SELECT_DRIVER: &str = r#"
SELECT id, company_id, is_active FROM drivers WHERE id = $1;
"#;

pub const INSERT_GPS_POINT: &str = r#"
INSERT INTO gps_points (
    vehicle_id, driver_id, latitude, longitude, altitude, speed, heading,
    horizontal_accuracy, battery_level, network_type, captured_at, received_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
RETURNING id;
"#;

pub const UPDATE_VEHICLE_LAST_LOCATION: &str = r#"
UPDATE vehicles
SET last_latitude = $2,
    last_longitude = $3,
    last_speed = $4,
    last_location_at = $5,
    updated_at = NOW()
WHERE id = $1;
"#;

const POINT_COLUMNS: &str = "id, vehicle_id, driver_id, latitude, longitude, altitude, speed, heading, \
     horizontal_accuracy, battery_level, network_type, captured_at, received_at";

pub fn select_recent_points() -> String {
    format!(
        "SELECT {} FROM gps_points \
         WHERE driver_id = $1 AND captured_at >= $2 AND captured_at <= $3 \
         ORDER BY captured_at DESC, id DESC LIMIT $4",
        POINT_COLUMNS
    )
}

pub fn select_latest_point() -> String {
    format!(
        "SELECT {} FROM gps_points WHERE vehicle_id = $1 \
         ORDER BY captured_at DESC, id DESC LIMIT 1",
        POINT_COLUMNS
    )
}

pub fn select_points_between() -> String {
    format!(
        "SELECT {} FROM gps_points \
         WHERE vehicle_id = $1 AND driver_id = $2 AND captured_at >= $3 AND captured_at <= $4 \
         ORDER BY captured_at ASC, id ASC",
        POINT_COLUMNS
    )
}

/// Optional filters are passed as NULL and short-circuit in SQL.
const HISTORY_FILTER: &str = "vehicle_id = $1 \
     AND ($2::uuid IS NULL OR driver_id = $2) \
     AND ($3::timestamptz IS NULL OR captured_at >= $3) \
     AND ($4::timestamptz IS NULL OR captured_at <= $4) \
     AND ($5::float8 IS NULL OR horizontal_accuracy <= $5) \
     AND ($6::float8 IS NULL OR speed <= $6)";

/// `column` and `direction` come from closed enums, never from user text.
pub fn select_history_page(column: &str, direction: &str) -> String {
    format!(
        "SELECT {} FROM gps_points WHERE {} ORDER BY {} {}, id {} LIMIT $7 OFFSET $8",
        POINT_COLUMNS, HISTORY_FILTER, column, direction, direction
    )
}

pub fn count_history() -> String {
    format!("SELECT COUNT(*) FROM gps_points WHERE {}", HISTORY_FILTER)
}

pub const INSERT_DRIVER_EVENT: &str = r#"
INSERT INTO driver_events (
    id, driver_id, vehicle_id, event_type, severity, latitude, longitude, speed,
    description, geofence_id, created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11);
"#;

const TRIP_COLUMNS: &str = "id, company_id, vehicle_id, driver_id, status, start_time, end_time, \
     start_lat, start_lng, end_lat, end_lng, start_odometer, end_odometer, \
     total_distance, average_speed, max_speed, total_duration";

pub fn select_active_trip() -> String {
    format!(
        "SELECT {} FROM trips WHERE vehicle_id = $1 AND driver_id = $2 AND status = $3 \
         ORDER BY start_time DESC LIMIT 1",
        TRIP_COLUMNS
    )
}

pub const INSERT_TRIP: &str = r#"
INSERT INTO trips (
    id, company_id, vehicle_id, driver_id, status, start_time, start_lat, start_lng,
    start_odometer, total_distance, average_speed, max_speed, total_duration
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 0, 0, 0);
"#;

pub const UPDATE_TRIP_END: &str = r#"
UPDATE trips
SET status = $10,
    end_time = $2,
    end_lat = $3,
    end_lng = $4,
    end_odometer = $5,
    total_distance = $6,
    average_speed = $7,
    max_speed = $8,
    total_duration = $9
WHERE id = $1 AND status = $11;
"#;

const GEOFENCE_COLUMNS: &str = "id, company_id, name, geofence_type, center_latitude, center_longitude, \
     radius_meters, alert_on_enter, alert_on_exit, is_active, created_at, updated_at";

pub fn select_company_geofences() -> String {
    format!(
        "SELECT {} FROM geofences WHERE company_id = $1 AND ($2::bool = false OR is_active) \
         ORDER BY name, id",
        GEOFENCE_COLUMNS
    )
}

pub fn select_geofence() -> String {
    format!(
        "SELECT {} FROM geofences WHERE company_id = $1 AND id = $2",
        GEOFENCE_COLUMNS
    )
}

pub const INSERT_GEOFENCE: &str = r#"
INSERT INTO geofences (
    id, company_id, name, geofence_type, center_latitude, center_longitude, radius_meters,
    alert_on_enter, alert_on_exit, is_active, created_at, updated_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12);
"#;

pub const UPDATE_GEOFENCE: &str = r#"
UPDATE geofences
SET name = $3,
    geofence_type = $4,
    center_latitude = $5,
    center_longitude = $6,
    radius_meters = $7,
    alert_on_enter = $8,
    alert_on_exit = $9,
    is_active = $10,
    updated_at = $11
WHERE company_id = $1 AND id = $2;
"#;

pub const DELETE_GEOFENCE: &str = r#"
DELETE FROM geofences WHERE company_id = $1 AND id = $2;
"#;
