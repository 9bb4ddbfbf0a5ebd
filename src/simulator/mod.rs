//! GPS motion simulator.
//!
//! Advances a synthetic position along a route at a configured speed and
//! tick interval, for demos, backend QA and testing without a physical
//! device location. The distance walk itself lives in [`RoutePlayback`]
//! (pure, deterministic); this module wraps it in a tokio interval daemon
//! with an explicit state machine:
//!
//! ```text
//! Stopped --start(i)--> Running --pause()--> Paused --start(i)--> Running
//! Running --route end--> Stopped   (terminal Completed event, exactly once)
//! ```
//!
//! Samples and the completion signal are delivered as [`SimulatorEvent`]s
//! over an mpsc channel. A closed receiver stops the tick task.
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = mpsc::channel(16);
//! let simulator = GpsSimulator::new(route, SimulatorConfig::default(), tx);
//! simulator.start(0)?;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         SimulatorEvent::Position(sample) => { /* feed progress engine */ }
//!         SimulatorEvent::Completed => break,
//!     }
//! }
//! ```

mod playback;

pub use playback::{PlaybackStep, RoutePlayback};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geo::{self, Coordinate, PositionSample, Route};

/// Default playback speed: 10 m/s (36 km/h).
pub const DEFAULT_SPEED_MPS: f64 = 10.0;

/// Default tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Simulator configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Playback speed in meters per second.
    pub speed_mps: f64,

    /// Interval between emitted samples.
    pub tick_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            speed_mps: DEFAULT_SPEED_MPS,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Simulator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulatorState {
    /// Not running; no playback position held.
    #[default]
    Stopped,
    /// Tick task active, samples being emitted.
    Running,
    /// Tick task stopped, playback position retained for resume.
    Paused,
}

impl std::fmt::Display for SimulatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Running => write!(f, "Running"),
            Self::Paused => write!(f, "Paused"),
        }
    }
}

/// Events emitted by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulatorEvent {
    /// A new synthetic position fix.
    Position(PositionSample),
    /// The route end was reached. Terminal; sent exactly once per run.
    Completed,
}

/// Errors from simulator control calls.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// `start` was called with an index outside the route.
    #[error("Start index {index} out of range for route of {route_len} points")]
    InvalidStartIndex { index: usize, route_len: usize },
}

struct SimulatorInner {
    state: SimulatorState,
    playback: Option<RoutePlayback>,
    cancel: Option<CancellationToken>,
}

/// Interval-driven GPS simulator over a fixed route.
///
/// One instance owns at most one tick task at a time; `start` and `pause`
/// are safe to call from any thread.
pub struct GpsSimulator {
    route: Route,
    config: SimulatorConfig,
    event_tx: mpsc::Sender<SimulatorEvent>,
    inner: Arc<Mutex<SimulatorInner>>,
}

impl GpsSimulator {
    /// Create a simulator for `route`, emitting events on `event_tx`.
    pub fn new(route: Route, config: SimulatorConfig, event_tx: mpsc::Sender<SimulatorEvent>) -> Self {
        Self {
            route,
            config,
            event_tx,
            inner: Arc::new(Mutex::new(SimulatorInner {
                state: SimulatorState::Stopped,
                playback: None,
                cancel: None,
            })),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SimulatorState {
        self.inner.lock().unwrap().state
    }

    /// Current playback index, if a run has started.
    pub fn current_index(&self) -> Option<usize> {
        self.inner.lock().unwrap().playback.as_ref().map(|p| p.index())
    }

    /// Index of the route vertex closest to `position`.
    ///
    /// The only sanctioned way to move the playback index backward: an
    /// explicit seek before `start`, never from the tick loop.
    pub fn find_nearest_index(&self, position: Coordinate) -> usize {
        geo::nearest_point_index(position, self.route.points()).index
    }

    /// Start (or resume) playback from `from_index`.
    ///
    /// Seeds traveled distance from the route prefix, emits the starting
    /// sample immediately, then ticks at the configured interval. Calling
    /// while already running is a logged no-op.
    pub fn start(&self, from_index: usize) -> Result<(), SimulatorError> {
        if from_index >= self.route.len() {
            warn!(
                index = from_index,
                route_len = self.route.len(),
                "Rejected simulator start: index out of range"
            );
            return Err(SimulatorError::InvalidStartIndex {
                index: from_index,
                route_len: self.route.len(),
            });
        }

        let cancel = CancellationToken::new();
        let starting_step;
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == SimulatorState::Running {
                debug!("Simulator already running, start ignored");
                return Ok(());
            }

            let playback =
                RoutePlayback::new(self.route.clone(), self.config.speed_mps, from_index);
            starting_step = playback.current_step();
            inner.playback = Some(playback);
            inner.state = SimulatorState::Running;
            inner.cancel = Some(cancel.clone());
        }

        info!(
            from_index,
            speed_mps = self.config.speed_mps,
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "Simulator started"
        );

        // Starting sample goes out before the first tick.
        let _ = self
            .event_tx
            .try_send(SimulatorEvent::Position(self.make_sample(&starting_step)));

        let inner = Arc::clone(&self.inner);
        let event_tx = self.event_tx.clone();
        let tick_interval = self.config.tick_interval;
        let speed = self.config.speed_mps;
        tokio::spawn(async move {
            Self::run_ticks(inner, event_tx, tick_interval, speed, cancel).await;
        });

        Ok(())
    }

    /// Pause playback and return the current index so a caller can persist
    /// it for a later resume. Safe to call in any state.
    pub fn pause(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
        if inner.state == SimulatorState::Running {
            inner.state = SimulatorState::Paused;
            debug!("Simulator paused");
        }
        inner.playback.as_ref().map(|p| p.index()).unwrap_or(0)
    }

    fn make_sample(&self, step: &PlaybackStep) -> PositionSample {
        PositionSample::new(step.position, step.heading, Some(self.config.speed_mps))
    }

    async fn run_ticks(
        inner: Arc<Mutex<SimulatorInner>>,
        event_tx: mpsc::Sender<SimulatorEvent>,
        tick_interval: Duration,
        speed_mps: f64,
        cancel: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(tick_interval);
        // The starting sample was already emitted; skip the immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Simulator tick task cancelled");
                    break;
                }

                _ = interval.tick() => {
                    // Advance under the lock, send outside it.
                    let (step, completed) = {
                        let mut guard = inner.lock().unwrap();
                        // A pause that raced this tick must win: a resumed
                        // run may already own the playback.
                        if cancel.is_cancelled() || guard.state != SimulatorState::Running {
                            break;
                        }
                        let Some(playback) = guard.playback.as_mut() else {
                            break;
                        };
                        let step = playback.advance(tick_interval);
                        if step.completed {
                            guard.state = SimulatorState::Stopped;
                            guard.cancel = None;
                        }
                        (step, step.completed)
                    };

                    let sample = PositionSample::new(step.position, step.heading, Some(speed_mps));
                    if event_tx.send(SimulatorEvent::Position(sample)).await.is_err() {
                        debug!("Simulator event channel closed, stopping");
                        break;
                    }

                    if completed {
                        info!("Simulator reached route end");
                        let _ = event_tx.send(SimulatorEvent::Completed).await;
                        break;
                    }
                }
            }
        }
    }
}
