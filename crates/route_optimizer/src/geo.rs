//! Great-circle distance helpers.

use common::GeoPoint;

/// Mean Earth radius in km.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in km.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Total length of a polyline through `waypoints`, in km.
pub fn path_km(waypoints: &[GeoPoint]) -> f64 {
    waypoints
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}
