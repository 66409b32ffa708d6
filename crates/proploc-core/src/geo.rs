//! Small-scale geodesy helpers.
//!
//! All zones handled by the engine are a few kilometres across at most, so an
//! equirectangular approximation (longitude degrees shrink with the cosine of
//! latitude) is accurate to well under a metre at these distances. Haversine
//! is kept for distance checks in tests and the exclusion rules.

use crate::model::GeoPoint;

/// Metres per degree of latitude (WGS84 mean).
pub const METERS_PER_LAT_DEGREE: f64 = 111_320.0;

/// Mean Earth radius in metres, for haversine.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Convert a north-south distance in metres to degrees of latitude.
#[must_use]
pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    meters / METERS_PER_LAT_DEGREE
}

/// Convert an east-west distance in metres to degrees of longitude at `lat`.
///
/// The longitude step widens toward the poles; latitudes within 0.1° of a
/// pole are clamped to avoid division by ~zero.
#[must_use]
pub fn meters_to_lng_degrees(meters: f64, lat: f64) -> f64 {
    let clamped = lat.clamp(-89.9, 89.9);
    meters / (METERS_PER_LAT_DEGREE * clamped.to_radians().cos())
}

/// Displace `origin` by `north_m` metres north and `east_m` metres east.
#[must_use]
pub fn offset(origin: GeoPoint, north_m: f64, east_m: f64) -> GeoPoint {
    GeoPoint {
        lat: origin.lat + meters_to_lat_degrees(north_m),
        lng: origin.lng + meters_to_lng_degrees(east_m, origin.lat),
    }
}

/// Great-circle distance between two points in metres.
#[must_use]
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: GeoPoint = GeoPoint {
        lat: 48.8566,
        lng: 2.3522,
    };

    #[test]
    fn haversine_of_identical_points_is_zero() {
        assert!(haversine_m(PARIS, PARIS) < 1e-9);
    }

    #[test]
    fn offset_north_moves_the_expected_distance() {
        let moved = offset(PARIS, 500.0, 0.0);
        let d = haversine_m(PARIS, moved);
        assert!((d - 500.0).abs() < 1.0, "expected ~500 m, got {d}");
    }

    #[test]
    fn offset_east_moves_the_expected_distance() {
        let moved = offset(PARIS, 0.0, 500.0);
        let d = haversine_m(PARIS, moved);
        assert!((d - 500.0).abs() < 1.0, "expected ~500 m, got {d}");
    }

    #[test]
    fn lng_degrees_widen_with_latitude() {
        let at_equator = meters_to_lng_degrees(100.0, 0.0);
        let at_paris = meters_to_lng_degrees(100.0, 48.8566);
        assert!(at_paris > at_equator);
    }

    #[test]
    fn near_polar_latitudes_are_clamped() {
        let d = meters_to_lng_degrees(100.0, 90.0);
        assert!(d.is_finite());
    }
}
