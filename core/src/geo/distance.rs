use crate::prelude::Point3D;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between the 2-D footprints of two points, in meters.
pub fn haversine_distance(a: &Point3D, b: &Point3D) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Linear interpolation of longitude, latitude and altitude.
pub fn interpolate(a: &Point3D, b: &Point3D, t: f64) -> Point3D {
    Point3D::new(
        a.lon + (b.lon - a.lon) * t,
        a.lat + (b.lat - a.lat) * t,
        a.alt + (b.alt - a.alt) * t,
    )
}

/// Planar length of a polyline, ignoring altitude.
pub fn line_length(coords: &[Point3D]) -> f64 {
    coords
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}
