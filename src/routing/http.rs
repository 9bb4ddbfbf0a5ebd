//! HTTP routing client.
//!
//! Fetches routes from a GraphHopper-style routing endpoint: GeoJSON
//! `[lon, lat]` point arrays, distances in meters, times in milliseconds and
//! integer turn signs on the instruction list. Response types here are our
//! own; only the fields the tracking core consumes are deserialized.

use std::time::Duration;

use serde::Deserialize;

use super::{RoutePlan, RouteStep, RoutingError, RoutingProvider};
use crate::announce::ManeuverSign;
use crate::geo::{Coordinate, Route};

/// Default HTTP timeout for routing requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the HTTP routing client.
#[derive(Debug, Clone)]
pub struct HttpRoutingConfig {
    /// Base URL of the routing endpoint.
    pub base_url: String,

    /// Routing profile, e.g. `"car"`.
    pub profile: String,

    /// API key appended to each request, if the service requires one.
    pub api_key: Option<String>,
}

impl HttpRoutingConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            profile: "car".to_string(),
            api_key: None,
        }
    }
}

/// Top-level routing response. Only the `paths` array is of interest.
#[derive(Deserialize)]
struct RoutingResponse {
    #[serde(default)]
    paths: Vec<PathResponse>,
}

#[derive(Deserialize)]
struct PathResponse {
    distance: f64,
    /// Travel time in milliseconds.
    time: f64,
    points: PointsResponse,
    #[serde(default)]
    instructions: Vec<InstructionResponse>,
}

#[derive(Deserialize)]
struct PointsResponse {
    coordinates: Vec<Coordinate>,
}

#[derive(Deserialize)]
struct InstructionResponse {
    sign: i32,
    #[serde(default)]
    street_name: String,
    distance: f64,
    /// `[first, last]` indices into the point array covered by this step.
    #[serde(default)]
    interval: Vec<usize>,
}

/// Routing client using direct HTTP requests.
///
/// Uses a reusable `reqwest::Client` with connection pooling and timeouts.
pub struct HttpRoutingClient {
    config: HttpRoutingConfig,
    http: reqwest::Client,
}

impl HttpRoutingClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: HttpRoutingConfig) -> Result<Self, RoutingError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| RoutingError::RequestFailed(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn request_url(&self, origin: Coordinate, destination: Coordinate) -> String {
        let mut url = format!(
            "{}/route?profile={}&points_encoded=false&point={},{}&point={},{}",
            self.config.base_url,
            self.config.profile,
            origin.lat,
            origin.lon,
            destination.lat,
            destination.lon,
        );
        if let Some(key) = &self.config.api_key {
            url.push_str("&key=");
            url.push_str(key);
        }
        url
    }
}

impl RoutingProvider for HttpRoutingClient {
    async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RoutePlan, RoutingError> {
        let url = self.request_url(origin, destination);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RoutingError::RequestFailed(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RoutingError::RequestFailed(e.to_string()))?;

        let parsed: RoutingResponse =
            serde_json::from_slice(&bytes).map_err(|e| RoutingError::ParseError(e.to_string()))?;

        let plan = convert_response(parsed)?;
        tracing::debug!(
            distance_m = format!("{:.0}", plan.distance_m),
            time_s = format!("{:.0}", plan.time_s),
            points = plan.route.len(),
            steps = plan.steps.len(),
            "Route fetched"
        );
        Ok(plan)
    }
}

/// Convert the provider response into a [`RoutePlan`].
fn convert_response(response: RoutingResponse) -> Result<RoutePlan, RoutingError> {
    let path = response
        .paths
        .into_iter()
        .next()
        .ok_or(RoutingError::NoRouteFound)?;

    if path.points.coordinates.is_empty() {
        return Err(RoutingError::NoRouteFound);
    }

    let steps = path
        .instructions
        .iter()
        .map(|instruction| RouteStep {
            sign: ManeuverSign::from_code(instruction.sign),
            street_name: instruction.street_name.clone(),
            distance_m: instruction.distance,
            geometry_index: instruction.interval.first().copied().unwrap_or(0),
        })
        .collect();

    Ok(RoutePlan {
        route: Route::new(path.points.coordinates),
        distance_m: path.distance,
        time_s: path.time / 1000.0,
        steps,
    })
}
