//! Geographic type definitions.

use std::fmt;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Valid latitude range in degrees.
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range in degrees.
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// A WGS84 geographic coordinate.
///
/// Longitude comes first, matching the GeoJSON `[lon, lat]` convention used
/// at every serialization boundary. The named fields keep call sites honest
/// about the ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Longitude in degrees (-180 to 180).
    pub lon: f64,
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
}

impl Coordinate {
    /// Create a coordinate from longitude and latitude, in that order.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lon, self.lat)
    }
}

// Serialized form is the GeoJSON position array `[lon, lat]`.
impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.lon)?;
        seq.serialize_element(&self.lat)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoordinateVisitor;

        impl<'de> Visitor<'de> for CoordinateVisitor {
            type Value = Coordinate;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [lon, lat] array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Coordinate, A::Error> {
                let lon = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let lat = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                // Tolerate (and discard) a trailing altitude component.
                let _altitude: Option<f64> = seq.next_element()?;
                Ok(Coordinate { lon, lat })
            }
        }

        deserializer.deserialize_seq(CoordinateVisitor)
    }
}

/// A position fix from a location sensor or the simulator.
///
/// Ephemeral - only the latest sample matters; each one supersedes the
/// previous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    /// Where the vehicle is.
    pub coordinate: Coordinate,

    /// Direction of travel in degrees (0-360), if known.
    pub heading: Option<f64>,

    /// Ground speed in meters per second, if known.
    pub speed: Option<f64>,

    /// Unix timestamp in milliseconds.
    pub timestamp_ms: i64,
}

impl PositionSample {
    /// Create a sample stamped with the current wall-clock time.
    pub fn new(coordinate: Coordinate, heading: Option<f64>, speed: Option<f64>) -> Self {
        Self {
            coordinate,
            heading,
            speed,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// An immutable planned route: an ordered polyline of coordinates.
///
/// Cumulative distances along the polyline are computed once at construction
/// so per-sample progress math never rescans the whole geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<Coordinate>,
    /// `cumulative[i]` = distance in meters from the start to vertex `i`.
    cumulative: Vec<f64>,
}

impl Route {
    /// Build a route from an ordered coordinate sequence.
    ///
    /// Consecutive duplicate points are permitted; their segments simply
    /// contribute zero distance.
    pub fn new(points: Vec<Coordinate>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for i in 0..points.len() {
            if i > 0 {
                total += super::distance(points[i - 1], points[i]);
            }
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    /// The route's vertices, in order.
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the route has no vertices.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total polyline length in meters.
    pub fn total_distance(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Distance in meters from the route start to vertex `index`.
    ///
    /// Indices past the end clamp to the total distance.
    pub fn cumulative(&self, index: usize) -> f64 {
        match self.cumulative.get(index) {
            Some(d) => *d,
            None => self.total_distance(),
        }
    }

    /// Vertex at `index`, if in range.
    pub fn point(&self, index: usize) -> Option<Coordinate> {
        self.points.get(index).copied()
    }
}
