//! Great-circle geometry on a spherical Earth.

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two lat/lon pairs given in degrees.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}
