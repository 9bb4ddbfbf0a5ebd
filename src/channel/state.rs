//! Core state types for the tracking channel.

use serde::{Deserialize, Serialize};

use crate::geo::PositionSample;

/// Connection lifecycle of the tracking channel.
///
/// One explicit enum instead of `is_connecting`/`is_connected` flags:
/// impossible combinations cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    #[default]
    Disconnected,
    /// First connection attempt in flight.
    Connecting,
    /// Live connection; sends and inbound broadcasts flow.
    Connected,
    /// Connection lost; the supervisor is retrying with backoff.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

/// Snapshot of one trip-tracking session.
///
/// Owned exclusively by the channel; consumers read clones.
#[derive(Debug, Clone, Default)]
pub struct TrackingSession {
    /// Last-joined trip group, re-joined automatically after reconnects.
    pub trip_id: Option<String>,

    /// Current connection state.
    pub state: ConnectionState,

    /// Consecutive failed reconnect attempts since the last live connection.
    pub reconnect_attempts: u32,
}

/// Position payload exchanged over the tracking channel.
///
/// Field names are fixed by the wire contract (camelCase, `lat`/`lng`
/// spelling). `updated_at` is an ISO 8601 wall-clock timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub lat: f64,
    pub lng: f64,
    pub bearing: f64,
    pub speed: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl LocationUpdate {
    /// Build a wire payload from a position sample.
    ///
    /// Missing heading/speed degrade to `0.0`; the wire contract has no
    /// notion of "unknown" for them.
    pub fn from_sample(sample: &PositionSample, driver_name: Option<String>) -> Self {
        Self {
            lat: sample.coordinate.lat,
            lng: sample.coordinate.lon,
            bearing: sample.heading.unwrap_or(0.0),
            speed: sample.speed.unwrap_or(0.0),
            driver_name,
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// Typed events delivered to channel subscribers.
#[derive(Debug, Clone)]
pub enum TrackingEvent {
    /// Another participant in the trip group broadcast their position.
    PeerLocation {
        trip_id: String,
        update: LocationUpdate,
    },

    /// The connection state machine transitioned.
    StateChanged(ConnectionState),
}
