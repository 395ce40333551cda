// Geographic math - distance and bearing between position fixes
//
// Pure functions over latitude/longitude in degrees. Distances assume a
// spherical Earth; accuracy is well within GPS noise at the ranges this
// server cares about (metres, not kilometres).

use std::f64::consts::PI;

/// Degrees to radians conversion factor
const DTOR: f64 = PI / 180.0;

/// Radians to degrees conversion factor
const RTOD: f64 = 180.0 / PI;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Returns the great-circle distance in meters between two points
///
/// Uses the haversine formula, which stays numerically stable for the
/// very small separations (a few metres) this server evaluates.
///
/// # Arguments
/// * `lat0`, `lon0` - First point (latitude, longitude) in degrees
/// * `lat1`, `lon1` - Second point (latitude, longitude) in degrees
///
/// NaN inputs propagate; callers must not invoke this with missing fixes.
pub fn distance(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    let phi0 = lat0 * DTOR;
    let phi1 = lat1 * DTOR;
    let dphi = (lat1 - lat0) * DTOR;
    let dlambda = (lon1 - lon0) * DTOR;

    let a = (dphi / 2.0).sin().powi(2)
        + phi0.cos() * phi1.cos() * (dlambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Returns the rhumb-line initial bearing in degrees from `(lat0, lon0)`
/// toward `(lat1, lon1)`, normalized to [0, 360)
///
/// 0 is North, 90 is East. Undefined when the two points coincide;
/// callers must special-case zero distance before calling this.
pub fn bearing(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> f64 {
    let phi0 = lat0 * DTOR;
    let phi1 = lat1 * DTOR;

    let mut dlambda = (lon1 - lon0) * DTOR;
    // Take the short way around the antimeridian
    if dlambda.abs() > PI {
        dlambda = if dlambda > 0.0 {
            dlambda - 2.0 * PI
        } else {
            dlambda + 2.0 * PI
        };
    }

    let dpsi = ((PI / 4.0 + phi1 / 2.0).tan() / (PI / 4.0 + phi0 / 2.0).tan()).ln();

    (dlambda.atan2(dpsi) * RTOD).rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    #[test]
    fn test_distance_same_point() {
        let d = distance(40.7128, -74.0060, 40.7128, -74.0060);
        assert!(d.abs() < EPSILON);
    }

    #[test]
    fn test_distance_symmetry() {
        let points = [
            (40.7128, -74.0060, 40.7138, -74.0050),
            (51.5074, -0.1278, 48.8566, 2.3522),
            (-33.9, 18.4, -33.91, 18.41),
        ];

        for (lat0, lon0, lat1, lon1) in points {
            let ab = distance(lat0, lon0, lat1, lon1);
            let ba = distance(lat1, lon1, lat0, lon0);
            assert!((ab - ba).abs() < EPSILON, "asymmetric: {} vs {}", ab, ba);
        }
    }

    #[test]
    fn test_distance_london_paris() {
        // Roughly 344 km
        let d = distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 344_000.0).abs() < 5_000.0, "distance: {} m", d);
    }

    #[test]
    fn test_distance_small_separation() {
        // ~2.6 m separation in lower Manhattan, the kind of range
        // the collision thresholds operate at
        let d = distance(40.71280, -74.00600, 40.712817, -74.005978);
        assert!(d > 2.3 && d < 3.0, "distance: {} m", d);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        // Due north
        let b = bearing(40.0, -74.0, 40.001, -74.0);
        assert!(b.abs() < 0.01 || (b - 360.0).abs() < 0.01, "north: {}", b);

        // Due east
        let b = bearing(40.0, -74.0, 40.0, -73.999);
        assert!((b - 90.0).abs() < 0.01, "east: {}", b);

        // Due south
        let b = bearing(40.0, -74.0, 39.999, -74.0);
        assert!((b - 180.0).abs() < 0.01, "south: {}", b);

        // Due west
        let b = bearing(40.0, -74.0, 40.0, -74.001);
        assert!((b - 270.0).abs() < 0.01, "west: {}", b);
    }

    #[test]
    fn test_bearing_northeast() {
        let b = bearing(40.71280, -74.00600, 40.712817, -74.005978);
        assert!(b > 30.0 && b < 60.0, "bearing: {}", b);
    }

    #[test]
    fn test_bearing_range() {
        let cases = [
            (40.0, -74.0, 40.1, -74.1),
            (40.0, -74.0, 39.9, -73.9),
            (0.0, 179.9, 0.1, -179.9),
            (-10.0, 10.0, -10.1, 9.9),
        ];

        for (lat0, lon0, lat1, lon1) in cases {
            let b = bearing(lat0, lon0, lat1, lon1);
            assert!((0.0..360.0).contains(&b), "out of range: {}", b);
        }
    }

    #[test]
    fn test_bearing_antimeridian() {
        // Crossing 180 degrees longitude should go the short way (east)
        let b = bearing(0.0, 179.9, 0.0, -179.9);
        assert!((b - 90.0).abs() < 0.01, "antimeridian east: {}", b);
    }
}
