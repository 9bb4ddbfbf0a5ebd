//! Route progress engine.
//!
//! Maps a raw position stream onto a planned route: tracks the current
//! segment index, derives traveled/remaining distance and the traveled/
//! remaining sub-geometries, and signals arrival exactly once.
//!
//! The engine owns all progress state. Samples must be applied in arrival
//! order, and the segment index only moves forward within a session: once
//! advanced, earlier vertices are never searched again, so a noisy fix or a
//! self-intersecting route cannot make the index oscillate. Resuming from a
//! different point is the simulator's explicit seek, which constructs a
//! fresh engine.

use crate::geo::{self, Coordinate, PositionSample, Route};

/// Default arrival epsilon: remaining distance below this counts as arrived.
pub const DEFAULT_ARRIVAL_EPSILON_M: f64 = 20.0;

/// Tunables for the progress engine.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Remaining distance (meters) under which the final segment counts as
    /// arrived.
    pub arrival_epsilon_m: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            arrival_epsilon_m: DEFAULT_ARRIVAL_EPSILON_M,
        }
    }
}

/// Derived progress along the route, recomputed on every sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    /// Index of the route vertex the vehicle is currently at or past.
    pub current_segment_index: usize,

    /// Distance traveled from the route start, in meters.
    pub traveled_m: f64,

    /// Distance left to the route end, in meters (never negative).
    pub remaining_m: f64,

    /// Prefix of the route up to the current vertex, with the live position
    /// appended.
    pub traveled_geometry: Vec<Coordinate>,

    /// Live position followed by the remaining route suffix.
    pub remaining_geometry: Vec<Coordinate>,
}

impl ProgressState {
    fn empty() -> Self {
        Self {
            current_segment_index: 0,
            traveled_m: 0.0,
            remaining_m: 0.0,
            traveled_geometry: Vec::new(),
            remaining_geometry: Vec::new(),
        }
    }
}

/// Result of applying one position sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub state: ProgressState,

    /// True exactly once, on the sample that first satisfies the arrival
    /// condition.
    pub arrived: bool,
}

/// Stateful progress tracker for one navigation session.
#[derive(Debug)]
pub struct RouteProgress {
    route: Route,
    config: ProgressConfig,
    last_index: usize,
    arrival_signaled: bool,
}

impl RouteProgress {
    /// Create a tracker at the start of `route`.
    pub fn new(route: Route) -> Self {
        Self::with_config(route, ProgressConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(route: Route, config: ProgressConfig) -> Self {
        Self {
            route,
            config,
            last_index: 0,
            arrival_signaled: false,
        }
    }

    /// The route being tracked.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Current segment index (monotonically non-decreasing).
    pub fn current_index(&self) -> usize {
        self.last_index
    }

    /// Apply the next position sample and recompute progress.
    ///
    /// Degenerate routes (fewer than 2 points) yield an all-zero state and
    /// never arrive.
    pub fn update(&mut self, sample: &PositionSample) -> ProgressUpdate {
        if self.route.len() < 2 {
            return ProgressUpdate {
                state: ProgressState::empty(),
                arrived: false,
            };
        }

        let position = sample.coordinate;
        let points = self.route.points();

        // Search only at or after the last known index.
        let nearest = geo::nearest_point_index(position, &points[self.last_index..]);
        let index = self.last_index + nearest.index;
        self.last_index = index;

        let total = self.route.total_distance();

        // The matched vertex says which segment the sample lies on: the one
        // it starts, unless the sample projects behind it (a nearest-vertex
        // match snaps forward up to half a segment early). Keeping the
        // along-track projection on the right segment is what makes traveled
        // distance non-decreasing on a forward walk.
        let segment = if index + 1 < points.len() {
            let t = geo::along_track_fraction(points[index], points[index + 1], position);
            if t <= 0.0 && index > 0 {
                index - 1
            } else {
                index
            }
        } else {
            index - 1
        };

        let segment_len = self.route.cumulative(segment + 1) - self.route.cumulative(segment);
        let fraction = geo::along_track_fraction(points[segment], points[segment + 1], position)
            .clamp(0.0, 1.0);
        let traveled = self.route.cumulative(segment) + fraction * segment_len;
        let remaining = (total - traveled).max(0.0);

        let mut traveled_geometry: Vec<Coordinate> = points[..=index].to_vec();
        traveled_geometry.push(position);

        let mut remaining_geometry = Vec::with_capacity(points.len() - index + 1);
        remaining_geometry.push(position);
        remaining_geometry.extend_from_slice(&points[index + 1..]);

        let on_final_segment = index >= self.route.len() - 1;
        let arrived = on_final_segment
            && remaining < self.config.arrival_epsilon_m
            && !self.arrival_signaled;
        if arrived {
            self.arrival_signaled = true;
            tracing::info!(
                traveled_m = format!("{traveled:.0}"),
                "Route completed, arrival signaled"
            );
        }

        ProgressUpdate {
            state: ProgressState {
                current_segment_index: index,
                traveled_m: traveled,
                remaining_m: remaining,
                traveled_geometry,
                remaining_geometry,
            },
            arrived,
        }
    }
}
