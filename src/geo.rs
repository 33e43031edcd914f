//! Great-circle distance on a spherical Earth.
//!
//! Accuracy is well under 0.5% for check-in radii, which is all the
//! geofence needs; no ellipsoid correction is applied.

use std::f64::consts::PI;

const DEG: f64 = PI / 180.0;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two points given in degrees.
///
/// The result is unrounded; callers round once before comparing against a
/// radius.
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1 * DEG;
    let phi2 = lat2 * DEG;
    let d_phi = (lat2 - lat1) * DEG;
    let d_lambda = (lon2 - lon1) * DEG;

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Round a distance to whole meters, the unit radii are expressed in.
pub fn round_meters(distance: f64) -> u64 {
    distance.round().max(0.0) as u64
}
