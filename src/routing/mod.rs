//! Routing provider interface.
//!
//! The crate never computes road routes itself: it asks an external routing
//! service for a path from an origin to a destination and consumes the
//! returned geometry, distance, duration and turn instructions. Failures
//! must always be catchable so that rerouting and simulation degrade
//! gracefully when the provider is down.

mod http;

pub use http::{HttpRoutingClient, HttpRoutingConfig};

use std::future::Future;

use thiserror::Error;

use crate::announce::ManeuverSign;
use crate::geo::{Coordinate, Route};

/// Errors from a routing provider.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The request could not be sent or the response not read.
    #[error("Routing request failed: {0}")]
    RequestFailed(String),

    /// The response body could not be parsed.
    #[error("Failed to parse routing response: {0}")]
    ParseError(String),

    /// The provider returned no path between the points.
    #[error("No route found")]
    NoRouteFound,
}

/// One turn instruction within a planned route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    /// Turn sign for this maneuver.
    pub sign: ManeuverSign,

    /// Name of the street the maneuver leads onto. Empty when unnamed.
    pub street_name: String,

    /// Length of this step in meters.
    pub distance_m: f64,

    /// Index into the route geometry where this step begins.
    pub geometry_index: usize,
}

/// A planned route returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    /// Ordered route geometry.
    pub route: Route,

    /// Total length in meters, as reported by the provider.
    pub distance_m: f64,

    /// Total travel time in seconds, as reported by the provider.
    pub time_s: f64,

    /// Turn instructions, in route order.
    pub steps: Vec<RouteStep>,
}

/// A service that plans routes between two coordinates.
pub trait RoutingProvider: Send + Sync {
    /// Plan a route from `origin` to `destination`.
    fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> impl Future<Output = Result<RoutePlan, RoutingError>> + Send;
}
