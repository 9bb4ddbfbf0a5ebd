//! Geodesy utilities.
//!
//! Pure great-circle math over WGS84 coordinates: haversine distance,
//! initial bearing, nearest-vertex search and segment interpolation. These
//! functions feed a live UI loop, so malformed input degrades to safe
//! defaults (zero distance, zero bearing) with a log line instead of
//! panicking.
//!
//! Linear interpolation between segment endpoints is an accepted
//! approximation: route segments are short enough that geodesic
//! interpolation would change nothing visible.

mod types;

pub use types::{Coordinate, PositionSample, Route, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Result of a nearest-vertex search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    /// Index of the closest vertex.
    pub index: usize,
    /// Distance to that vertex in meters.
    pub distance_m: f64,
}

/// Great-circle distance between two coordinates in meters (haversine).
///
/// Returns `0.0` for non-finite input rather than propagating NaN.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        tracing::warn!(from = %a, to = %b, "Non-finite coordinate in distance calculation");
        return 0.0;
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial bearing from `a` toward `b` in degrees, normalized to `[0, 360)`.
///
/// Coincident or degenerate points yield `0.0`.
pub fn bearing(a: Coordinate, b: Coordinate) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        tracing::warn!(from = %a, to = %b, "Non-finite coordinate in bearing calculation");
        return 0.0;
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    if y == 0.0 && x == 0.0 {
        return 0.0;
    }

    let deg = y.atan2(x).to_degrees();
    (deg + 360.0) % 360.0
}

/// Index of the route vertex closest to `position`, with its distance.
///
/// Linear scan; route lengths are in the hundreds to low thousands of
/// points, so O(n) per call is fine. An empty slice degrades to index 0
/// at distance 0 with a logged warning.
pub fn nearest_point_index(position: Coordinate, points: &[Coordinate]) -> NearestPoint {
    if points.is_empty() {
        tracing::warn!("Nearest-point search on empty geometry");
        return NearestPoint {
            index: 0,
            distance_m: 0.0,
        };
    }

    let mut best = NearestPoint {
        index: 0,
        distance_m: f64::MAX,
    };
    for (i, point) in points.iter().enumerate() {
        let d = distance(position, *point);
        if d < best.distance_m {
            best = NearestPoint {
                index: i,
                distance_m: d,
            };
        }
    }
    best
}

/// Linear interpolation between two coordinates.
///
/// `fraction` is clamped to `[0, 1]`: 0 yields `a`, 1 yields `b`.
pub fn interpolate(a: Coordinate, b: Coordinate, fraction: f64) -> Coordinate {
    let f = fraction.clamp(0.0, 1.0);
    Coordinate::new(a.lon + (b.lon - a.lon) * f, a.lat + (b.lat - a.lat) * f)
}

/// Projection parameter of `p` onto the segment from `a` to `b`.
///
/// Returns the raw (unclamped) fraction along the segment: 0 at `a`, 1 at
/// `b`, negative behind `a`, above 1 past `b`. Uses a local equirectangular
/// approximation, which is accurate over segment lengths. A zero-length
/// segment yields `0.0`.
pub fn along_track_fraction(a: Coordinate, b: Coordinate, p: Coordinate) -> f64 {
    if !a.is_finite() || !b.is_finite() || !p.is_finite() {
        tracing::warn!("Non-finite coordinate in along-track projection");
        return 0.0;
    }

    let lat_scale = a.lat.to_radians().cos();
    let abx = (b.lon - a.lon) * lat_scale;
    let aby = b.lat - a.lat;
    let apx = (p.lon - a.lon) * lat_scale;
    let apy = p.lat - a.lat;

    let len_sq = abx * abx + aby * aby;
    if len_sq == 0.0 {
        return 0.0;
    }
    (apx * abx + apy * aby) / len_sq
}
