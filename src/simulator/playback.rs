//! Pure route playback clock.
//!
//! Walks a synthetic position along a route by traveled distance. No timers
//! and no wall clock: advancing is a pure function of the durations fed in,
//! so two playbacks with the same route, speed and tick sequence emit
//! identical coordinates.

use std::time::Duration;

use crate::geo::{self, Coordinate, Route};

/// One step of playback output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStep {
    /// Interpolated position along the route (not snapped to a vertex).
    pub position: Coordinate,

    /// Bearing of the current segment in degrees, if the route has one.
    pub heading: Option<f64>,

    /// True once the end of the route has been reached. Latched: every
    /// subsequent step reports it too.
    pub completed: bool,
}

/// Distance-walk state for one simulation run.
#[derive(Debug, Clone)]
pub struct RoutePlayback {
    route: Route,
    speed_mps: f64,
    /// Last route vertex consumed by the walk.
    index: usize,
    /// Distance traveled from the route start, in meters.
    traveled_m: f64,
    completed: bool,
}

impl RoutePlayback {
    /// Start playback at `start_index`, seeding traveled distance from the
    /// route prefix so a mid-route resume does not reset progress.
    ///
    /// The caller guarantees `start_index < route.len()`.
    pub fn new(route: Route, speed_mps: f64, start_index: usize) -> Self {
        let traveled_m = route.cumulative(start_index);
        let completed = route.len() < 2 || start_index >= route.len() - 1;
        Self {
            route,
            speed_mps,
            index: start_index,
            traveled_m,
            completed,
        }
    }

    /// Current vertex index (the last vertex at or behind the position).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Distance traveled from the route start, in meters.
    pub fn traveled_m(&self) -> f64 {
        self.traveled_m
    }

    /// Whether the end of the route has been reached.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Configured playback speed in meters per second.
    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    /// The position for the current traveled distance, without advancing.
    pub fn current_step(&self) -> PlaybackStep {
        self.step_at_current()
    }

    /// Advance the clock by `dt` and return the new interpolated position.
    ///
    /// Consumes whole segments until the remaining increment fits within the
    /// current one. Once completed, further calls are no-ops that keep
    /// reporting the final vertex.
    pub fn advance(&mut self, dt: Duration) -> PlaybackStep {
        if self.completed {
            return self.step_at_current();
        }

        self.traveled_m += self.speed_mps * dt.as_secs_f64();

        // Walk the index forward over every segment the increment covers.
        // Zero-length segments (duplicate vertices) are consumed for free.
        while self.index + 1 < self.route.len()
            && self.route.cumulative(self.index + 1) <= self.traveled_m
        {
            self.index += 1;
        }

        if self.index >= self.route.len() - 1 || self.traveled_m >= self.route.total_distance() {
            self.traveled_m = self.route.total_distance();
            self.index = self.route.len() - 1;
            self.completed = true;
        }

        self.step_at_current()
    }

    fn step_at_current(&self) -> PlaybackStep {
        let points = self.route.points();
        if points.is_empty() {
            return PlaybackStep {
                position: Coordinate::new(0.0, 0.0),
                heading: None,
                completed: true,
            };
        }

        if self.completed || self.index + 1 >= points.len() {
            let last = points[points.len() - 1];
            let heading = if points.len() >= 2 {
                Some(geo::bearing(points[points.len() - 2], last))
            } else {
                None
            };
            return PlaybackStep {
                position: last,
                heading,
                completed: self.completed,
            };
        }

        let from = points[self.index];
        let to = points[self.index + 1];
        let segment_len = self.route.cumulative(self.index + 1) - self.route.cumulative(self.index);
        let into_segment = self.traveled_m - self.route.cumulative(self.index);
        let fraction = if segment_len > 0.0 {
            into_segment / segment_len
        } else {
            0.0
        };

        PlaybackStep {
            position: geo::interpolate(from, to, fraction),
            heading: Some(geo::bearing(from, to)),
            completed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_route() -> Route {
        // ~2224 m total: three points going north at the equator
        Route::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.01),
            Coordinate::new(0.0, 0.02),
        ])
    }

    #[test]
    fn playback_is_deterministic() {
        let mut a = RoutePlayback::new(straight_route(), 10.0, 0);
        let mut b = RoutePlayback::new(straight_route(), 10.0, 0);

        for _ in 0..50 {
            let step_a = a.advance(Duration::from_secs(1));
            let step_b = b.advance(Duration::from_secs(1));
            assert_eq!(step_a, step_b);
        }
    }

    #[test]
    fn positions_are_interpolated_not_snapped() {
        let mut playback = RoutePlayback::new(straight_route(), 10.0, 0);

        // 10 m/s for 1 s = 10 m north, well inside the first segment
        let step = playback.advance(Duration::from_secs(1));
        assert!(!step.completed);
        assert!(step.position.lat > 0.0);
        assert!(step.position.lat < 0.0001 * 1.5);
        assert_eq!(step.position.lon, 0.0);
        // Heading north along the first segment
        let heading = step.heading.unwrap();
        assert!(heading < 1.0 || heading > 359.0);
    }

    #[test]
    fn advance_consumes_whole_segments() {
        let mut playback = RoutePlayback::new(straight_route(), 10.0, 0);

        // 120 s at 10 m/s = 1200 m, past the first vertex (~1112 m)
        let step = playback.advance(Duration::from_secs(120));
        assert_eq!(playback.index(), 1);
        assert!(!step.completed);
        assert!(step.position.lat > 0.01);
    }

    #[test]
    fn mid_route_start_seeds_traveled_distance() {
        let playback = RoutePlayback::new(straight_route(), 10.0, 1);
        assert!((playback.traveled_m() - 1112.0).abs() < 5.0);
        assert!(!playback.is_completed());
    }

    #[test]
    fn completes_at_route_end_and_latches() {
        let mut playback = RoutePlayback::new(straight_route(), 10.0, 0);

        let mut completed_at = None;
        for tick in 1..=300 {
            let step = playback.advance(Duration::from_secs(1));
            if step.completed {
                completed_at = Some(tick);
                break;
            }
        }

        // ~2224 m at 10 m/s completes in ~222 ticks
        let tick = completed_at.expect("playback should complete");
        assert!((218..=226).contains(&tick), "completed at tick {tick}");

        // Latched: position pinned to the final vertex, still completed
        let step = playback.advance(Duration::from_secs(1));
        assert!(step.completed);
        assert_eq!(step.position, Coordinate::new(0.0, 0.02));
        assert_eq!(playback.traveled_m(), playback.route.total_distance());
    }

    #[test]
    fn start_at_final_vertex_is_already_completed() {
        let playback = RoutePlayback::new(straight_route(), 10.0, 2);
        assert!(playback.is_completed());
    }

    #[test]
    fn duplicate_vertices_are_walked_through() {
        let route = Route::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.01),
            Coordinate::new(0.0, 0.01),
            Coordinate::new(0.0, 0.02),
        ]);
        let mut playback = RoutePlayback::new(route, 10.0, 0);

        // Jump past the duplicated vertex
        playback.advance(Duration::from_secs(120));
        assert_eq!(playback.index(), 2);
    }

    #[test]
    fn single_point_route_is_degenerate() {
        let route = Route::new(vec![Coordinate::new(1.0, 2.0)]);
        let mut playback = RoutePlayback::new(route, 10.0, 0);
        assert!(playback.is_completed());
        let step = playback.advance(Duration::from_secs(1));
        assert!(step.completed);
        assert_eq!(step.position, Coordinate::new(1.0, 2.0));
    }
}
