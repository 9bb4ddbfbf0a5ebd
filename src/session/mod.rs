//! Navigation session facade.
//!
//! Wires one trip's sample stream through the core components: each
//! position sample updates route progress, redraws the map overlay,
//! publishes the position to the tracking channel, schedules turn
//! announcements and (throttled) evaluates rerouting. The session owns
//! teardown ordering so no timers or sockets outlive the trip.
//!
//! The sample source is external (a device location stream or a
//! [`crate::simulator::GpsSimulator`]) and samples must be fed in arrival
//! order.

use std::sync::Arc;

use tracing::{debug, info};

use crate::announce::{announcement_text, AnnouncementEvent, AnnouncementScheduler};
use crate::channel::{LocationUpdate, TrackingChannel, TripTransport};
use crate::geo::{Coordinate, PositionSample};
use crate::progress::{ProgressState, RouteProgress};
use crate::reroute::{RerouteEvaluator, RerouteSuggestion};
use crate::routing::{RoutePlan, RouteStep, RoutingProvider};
use crate::sinks::{MapSink, Marker, MarkerKind, RouteOverlay, SpeechSink};

/// Default speech locale.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Session-level configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Driver name attached to outbound location updates.
    pub driver_name: Option<String>,

    /// Locale tag for spoken announcements.
    pub locale: String,

    pub progress: crate::progress::ProgressConfig,
    pub announce: crate::announce::AnnouncementConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver_name: None,
            locale: DEFAULT_LOCALE.to_string(),
            progress: Default::default(),
            announce: Default::default(),
        }
    }
}

/// Everything derived from one position sample.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub progress: ProgressState,

    /// True exactly once, when the destination is reached.
    pub arrived: bool,

    /// A reroute recommendation, at most one per throttle window.
    pub reroute: Option<RerouteSuggestion>,

    /// The announcement spoken for this sample, if any.
    pub announcement: Option<AnnouncementEvent>,
}

/// One trip's navigation state and its collaborators.
pub struct NavigationSession<T: TripTransport, P: RoutingProvider> {
    trip_id: String,
    progress: RouteProgress,
    steps: Vec<RouteStep>,
    channel: Arc<TrackingChannel<T>>,
    reroute: RerouteEvaluator<P>,
    announcer: AnnouncementScheduler,
    map: Arc<dyn MapSink>,
    speech: Arc<dyn SpeechSink>,
    config: SessionConfig,
}

impl<T: TripTransport, P: RoutingProvider> NavigationSession<T, P> {
    /// Build a session for `trip_id` following `plan`.
    ///
    /// The channel is injected, not constructed: one logical connection per
    /// process, shared by whoever needs it.
    pub fn new(
        trip_id: impl Into<String>,
        plan: RoutePlan,
        channel: Arc<TrackingChannel<T>>,
        provider: P,
        map: Arc<dyn MapSink>,
        speech: Arc<dyn SpeechSink>,
        config: SessionConfig,
        reroute_config: crate::reroute::RerouteConfig,
    ) -> Self {
        let mut reroute = RerouteEvaluator::new(provider, reroute_config);
        reroute.set_route(plan.route.clone());
        if let Some(destination) = plan.route.points().last() {
            reroute.set_destination(*destination);
        }

        Self {
            trip_id: trip_id.into(),
            progress: RouteProgress::with_config(plan.route.clone(), config.progress.clone()),
            steps: plan.steps,
            channel,
            reroute,
            announcer: AnnouncementScheduler::new(config.announce.clone()),
            map,
            speech,
            config,
        }
    }

    /// The trip this session tracks.
    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    /// Connect the channel and join the trip's broadcast group.
    pub fn start(&self) {
        info!(trip_id = %self.trip_id, "Navigation session starting");
        self.channel.connect();
        self.channel.join_trip(&self.trip_id);
        self.render_overlay(None);
    }

    /// Apply one position sample in arrival order.
    pub async fn handle_sample(&mut self, sample: PositionSample) -> SessionUpdate {
        let update = self.progress.update(&sample);

        self.map
            .update_user_location(sample.coordinate.lon, sample.coordinate.lat);
        self.render_progress(&update.state, sample.coordinate);

        self.channel.send_location(LocationUpdate::from_sample(
            &sample,
            self.config.driver_name.clone(),
        ));

        let announcement = self.check_announcement(&update.state);
        let reroute = self.reroute.check_for_better_route(sample.coordinate).await;

        if update.arrived {
            info!(trip_id = %self.trip_id, "Destination reached");
        }

        SessionUpdate {
            progress: update.state,
            arrived: update.arrived,
            reroute,
            announcement,
        }
    }

    /// Render an inbound peer position (remote viewer side).
    pub fn render_peer_location(&self, update: &LocationUpdate) {
        self.map.update_user_location(update.lng, update.lat);
    }

    /// Replace the route after an accepted reroute suggestion.
    ///
    /// Progress restarts on the new geometry and the announcement history is
    /// cleared so the new route's steps can speak.
    pub fn apply_reroute(&mut self, plan: RoutePlan) {
        info!(
            trip_id = %self.trip_id,
            distance_m = format!("{:.0}", plan.distance_m),
            "Applying rerouted path"
        );
        self.reroute.set_route(plan.route.clone());
        if let Some(destination) = plan.route.points().last() {
            self.reroute.set_destination(*destination);
        }
        self.progress =
            RouteProgress::with_config(plan.route.clone(), self.config.progress.clone());
        self.steps = plan.steps;
        self.announcer.reset_last_spoken_step();
        self.render_overlay(None);
    }

    /// Leave the trip group, tear the channel down and silence speech.
    ///
    /// Must be called when the trip ends or the tracking view unmounts.
    pub fn shutdown(&self) {
        info!(trip_id = %self.trip_id, "Navigation session shutting down");
        self.channel.leave_trip(&self.trip_id);
        self.channel.disconnect();
        self.speech.stop();
    }

    /// Speak the upcoming maneuver if a distance threshold was crossed.
    fn check_announcement(&mut self, state: &ProgressState) -> Option<AnnouncementEvent> {
        let route = self.progress.route();

        // The next maneuver is the first step starting past the current
        // vertex.
        let (step_index, step) = self
            .steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.geometry_index > state.current_segment_index)?;

        let distance_to_maneuver =
            (route.cumulative(step.geometry_index) - state.traveled_m).max(0.0);

        if !self
            .announcer
            .should_announce(distance_to_maneuver, step_index)
        {
            return None;
        }

        let bucket = self
            .announcer
            .matched_threshold(distance_to_maneuver)
            .unwrap_or(distance_to_maneuver) as u32;
        let text = announcement_text(step.sign, bucket, &step.street_name);
        debug!(text = %text, "Speaking turn instruction");
        self.speech.speak(&text, &self.config.locale);

        Some(AnnouncementEvent {
            sign: step.sign,
            street_name: step.street_name.clone(),
            distance_m: distance_to_maneuver,
            step_index,
        })
    }

    fn render_progress(&self, state: &ProgressState, live: Coordinate) {
        let overlay = RouteOverlay {
            full: self.progress.route().points().to_vec(),
            traveled: state.traveled_geometry.clone(),
            remaining: state.remaining_geometry.clone(),
        };
        let mut markers = self.route_markers();
        markers.push(Marker {
            coordinate: live,
            kind: MarkerKind::User,
        });
        self.map.render_overlay(&overlay, &markers);
    }

    fn render_overlay(&self, live: Option<Coordinate>) {
        let overlay = RouteOverlay {
            full: self.progress.route().points().to_vec(),
            traveled: Vec::new(),
            remaining: self.progress.route().points().to_vec(),
        };
        let mut markers = self.route_markers();
        if let Some(coordinate) = live {
            markers.push(Marker {
                coordinate,
                kind: MarkerKind::User,
            });
        }
        self.map.render_overlay(&overlay, &markers);
    }

    fn route_markers(&self) -> Vec<Marker> {
        let points = self.progress.route().points();
        let mut markers = Vec::with_capacity(3);
        if let Some(first) = points.first() {
            markers.push(Marker {
                coordinate: *first,
                kind: MarkerKind::Start,
            });
        }
        if let Some(last) = points.last() {
            markers.push(Marker {
                coordinate: *last,
                kind: MarkerKind::End,
            });
        }
        markers
    }
}
