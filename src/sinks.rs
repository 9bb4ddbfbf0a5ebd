//! Presentation sink traits.
//!
//! The map widget and the speech engine are external collaborators: the
//! core hands them geometry and text and never looks back. No-op
//! implementations are provided for tests and headless runs.

use crate::geo::Coordinate;

/// Semantic tag of a map marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Route origin.
    Start,
    /// Route destination.
    End,
    /// The device's own position.
    User,
    /// A live peer position (pulsing on the remote viewer's map).
    Pulse,
}

/// A tagged marker coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub coordinate: Coordinate,
    pub kind: MarkerKind,
}

/// Route geometry handed to the map: the full planned line plus the
/// traveled/remaining split around the live position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteOverlay {
    pub full: Vec<Coordinate>,
    pub traveled: Vec<Coordinate>,
    pub remaining: Vec<Coordinate>,
}

/// Map rendering sink.
pub trait MapSink: Send + Sync {
    /// Redraw the route overlay and its markers.
    fn render_overlay(&self, overlay: &RouteOverlay, markers: &[Marker]);

    /// Move the live position indicator. Longitude first.
    fn update_user_location(&self, lon: f64, lat: f64);
}

/// Speech output sink.
///
/// Implementations fire their own completion/error callbacks; the core only
/// needs `stop()` to be able to silence an utterance mid-way.
pub trait SpeechSink: Send + Sync {
    /// Speak a locale-tagged utterance.
    fn speak(&self, text: &str, locale: &str);

    /// Silence any in-flight utterance.
    fn stop(&self);
}

/// Map sink that draws nothing.
#[derive(Debug, Default)]
pub struct NoopMapSink;

impl MapSink for NoopMapSink {
    fn render_overlay(&self, _overlay: &RouteOverlay, _markers: &[Marker]) {}
    fn update_user_location(&self, _lon: f64, _lat: f64) {}
}

/// Speech sink that stays silent.
#[derive(Debug, Default)]
pub struct NoopSpeechSink;

impl SpeechSink for NoopSpeechSink {
    fn speak(&self, _text: &str, _locale: &str) {}
    fn stop(&self) {}
}
