//! Waytrack - real-time vehicle tracking and navigation core.
//!
//! Keeps a remote viewer (dispatcher, customer) and the driver's own map
//! view synchronized while a vehicle moves along a planned route, and can
//! simulate GPS motion when no physical device location is available.
//!
//! # Architecture
//!
//! Position samples flow from a device sensor or the [`simulator`] into the
//! [`progress`] engine, which maps them onto the planned route. Derived
//! progress then fans out to the [`channel`] (live broadcast to trip
//! participants), the [`reroute`] evaluator (periodic better-route checks)
//! and the [`announce`] scheduler (turn instructions), ending at the map
//! and speech sinks in [`sinks`]. The [`session`] module wires one trip's
//! instance of that pipeline together.
//!
//! ```text
//! simulator / GPS ──> progress ──┬──> channel ──> trip participants
//!                                ├──> reroute ──> routing provider
//!                                ├──> announce ─> speech sink
//!                                └──> map sink
//! ```
//!
//! # Example
//!
//! ```ignore
//! use waytrack::channel::{ChannelConfig, TcpTransport, TrackingChannel};
//! use waytrack::routing::{HttpRoutingClient, HttpRoutingConfig, RoutingProvider};
//!
//! let provider = HttpRoutingClient::new(HttpRoutingConfig::new("https://router.example.com"))?;
//! let plan = provider.fetch_route(origin, destination).await?;
//!
//! let channel = TrackingChannel::new(TcpTransport::new("tracker:7300"), ChannelConfig::default());
//! let session = NavigationSession::new("trip-42", plan, channel.into(), /* ... */);
//! session.start();
//! ```

pub mod announce;
pub mod channel;
pub mod geo;
pub mod logging;
pub mod progress;
pub mod reroute;
pub mod routing;
pub mod session;
pub mod simulator;
pub mod sinks;

/// Version of the Waytrack library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
