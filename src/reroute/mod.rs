//! Dynamic rerouting evaluation.
//!
//! Periodically asks the routing provider for an alternative path from the
//! live position to the destination and recommends switching when the
//! projected saving clears an absolute threshold. Evaluation is throttled
//! and failure-proof: a provider outage is just "no suggestion" until the
//! next window, and the tracking loop never notices.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::geo::{self, Coordinate, Route};
use crate::routing::{RoutePlan, RoutingProvider};

/// Default minimum interval between evaluations.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(120);

/// Default minimum projected saving for a suggestion, in seconds.
///
/// Below this the alternative is ignored even if technically faster, to
/// avoid route flapping.
pub const DEFAULT_MIN_TIME_SAVED_S: f64 = 300.0;

/// Default assumed cruising speed for remaining-time estimates (~50 km/h).
pub const DEFAULT_AVERAGE_SPEED_MPS: f64 = 13.9;

/// Rerouting tunables.
#[derive(Debug, Clone)]
pub struct RerouteConfig {
    /// Minimum interval between provider queries.
    pub check_interval: Duration,

    /// Minimum projected time saving before a switch is suggested.
    pub min_time_saved_s: f64,

    /// Assumed average speed for the current route's remaining time.
    pub average_speed_mps: f64,
}

impl Default for RerouteConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            min_time_saved_s: DEFAULT_MIN_TIME_SAVED_S,
            average_speed_mps: DEFAULT_AVERAGE_SPEED_MPS,
        }
    }
}

/// Why a route switch is being recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerouteReason {
    /// The alternative is materially faster than staying on course.
    FasterRoute,
}

impl std::fmt::Display for RerouteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FasterRoute => write!(f, "FasterRoute"),
        }
    }
}

/// A recommended route switch.
///
/// Transient: offered once per throttle window and discarded if not
/// accepted before the next evaluation.
#[derive(Debug, Clone)]
pub struct RerouteSuggestion {
    /// The proposed replacement route.
    pub alternative: RoutePlan,

    /// Projected saving versus staying on the current route, in seconds.
    pub time_saved_s: f64,

    /// Length difference versus the current route's remainder, in meters.
    pub distance_delta_m: f64,

    pub reason: RerouteReason,
}

/// Throttled evaluator of alternative routes.
pub struct RerouteEvaluator<P: RoutingProvider> {
    provider: P,
    config: RerouteConfig,
    route: Option<Route>,
    destination: Option<Coordinate>,
    last_check: Option<Instant>,
}

impl<P: RoutingProvider> RerouteEvaluator<P> {
    pub fn new(provider: P, config: RerouteConfig) -> Self {
        Self {
            provider,
            config,
            route: None,
            destination: None,
            last_check: None,
        }
    }

    /// Replace the current route (also called after an accepted reroute).
    pub fn set_route(&mut self, route: Route) {
        self.route = Some(route);
    }

    /// Set the trip destination.
    pub fn set_destination(&mut self, destination: Coordinate) {
        self.destination = Some(destination);
    }

    /// Evaluate whether a better route exists from `position`.
    ///
    /// Returns `None` without querying the provider when prerequisites are
    /// missing or the throttle window has not elapsed. Provider failures are
    /// swallowed and retried on the next window.
    pub async fn check_for_better_route(
        &mut self,
        position: Coordinate,
    ) -> Option<RerouteSuggestion> {
        let (route, destination) = match (&self.route, self.destination) {
            (Some(route), Some(destination)) => (route, destination),
            _ => {
                trace!("Reroute check skipped: route or destination not set");
                return None;
            }
        };

        if let Some(last) = self.last_check {
            if last.elapsed() < self.config.check_interval {
                trace!("Reroute check throttled");
                return None;
            }
        }
        self.last_check = Some(Instant::now());

        // Remaining time on the current route at the assumed cruising speed.
        let nearest = geo::nearest_point_index(position, route.points());
        let remaining_m = (route.total_distance() - route.cumulative(nearest.index)).max(0.0);
        let current_eta_s = remaining_m / self.config.average_speed_mps;

        let alternative = match self.provider.fetch_route(position, destination).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Reroute evaluation failed, keeping current route");
                return None;
            }
        };

        let time_saved_s = current_eta_s - alternative.time_s;
        if time_saved_s < self.config.min_time_saved_s {
            debug!(
                time_saved_s = format!("{time_saved_s:.0}"),
                threshold_s = self.config.min_time_saved_s,
                "Alternative route not worth switching"
            );
            return None;
        }

        let distance_delta_m = alternative.distance_m - remaining_m;
        debug!(
            time_saved_s = format!("{time_saved_s:.0}"),
            distance_delta_m = format!("{distance_delta_m:.0}"),
            "Suggesting reroute"
        );

        Some(RerouteSuggestion {
            alternative,
            time_saved_s,
            distance_delta_m,
            reason: RerouteReason::FasterRoute,
        })
    }
}
