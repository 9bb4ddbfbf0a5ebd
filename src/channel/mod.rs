//! Real-time tracking channel.
//!
//! One persistent connection per tracking session, multiplexing trip-group
//! membership, outbound location updates and inbound peer broadcasts. A
//! single supervisor task owns the connection and drives the state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!                      ^            |
//!                      |       connection lost
//!                      |            v
//!                  (backoff) <- Reconnecting -> Connected
//! ```
//!
//! Reconnection is automatic with a bounded backoff schedule and unlimited
//! attempts; an independent backup timer forces an attempt if the backoff
//! layer has not restored the connection by the time it fires. The
//! last-joined trip group is re-joined after every reconnect without caller
//! intervention.
//!
//! Delivery semantics: inbound peer locations reach every subscriber that
//! keeps up with the broadcast channel; outbound sends are fire-and-forget
//! and silently dropped unless `Connected`, since the next periodic sample
//! supersedes anything lost.
//!
//! One `TrackingChannel` value is one logical connection. Inject it where
//! it is needed instead of constructing several for the same process.
//!
//! # Example
//!
//! ```ignore
//! let channel = TrackingChannel::new(TcpTransport::new("tracker:7300"), ChannelConfig::default());
//! let mut events = channel.subscribe();
//! channel.connect();
//! channel.join_trip("trip-42");
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         TrackingEvent::PeerLocation { update, .. } => { /* move marker */ }
//!         TrackingEvent::StateChanged(state) => { /* HUD indicator */ }
//!     }
//! }
//! ```

mod reconnect;
mod state;
mod tcp;
mod transport;

pub use reconnect::{ReconnectPolicy, DEFAULT_BACKOFF_SCHEDULE_SECS, DEFAULT_BACKUP_INTERVAL};
pub use state::{ConnectionState, LocationUpdate, TrackingEvent, TrackingSession};
pub use tcp::{TcpConnection, TcpTransport};
pub use transport::{InboundMessage, TransportError, TripConnection, TripTransport};

use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Default capacity of the subscriber event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Tracking channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Reconnect backoff schedule and backup-timer period.
    pub reconnect: ReconnectPolicy,

    /// Capacity of the broadcast channel delivering [`TrackingEvent`]s.
    pub event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Commands from the public API to the supervisor task.
enum Command {
    Join(String),
    Leave(String),
    Send(LocationUpdate),
}

struct SupervisorHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

/// Persistent tracking connection for one session.
pub struct TrackingChannel<T: TripTransport> {
    transport: Arc<T>,
    config: ChannelConfig,
    session: Arc<RwLock<TrackingSession>>,
    event_tx: broadcast::Sender<TrackingEvent>,
    supervisor: Mutex<Option<SupervisorHandle>>,
}

impl<T: TripTransport> TrackingChannel<T> {
    /// Create a channel over `transport`. No connection is made until
    /// [`connect`](Self::connect).
    pub fn new(transport: T, config: ChannelConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            transport: Arc::new(transport),
            config,
            session: Arc::new(RwLock::new(TrackingSession::default())),
            event_tx,
            supervisor: Mutex::new(None),
        }
    }

    /// Subscribe to peer locations and connection-state transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> TrackingSession {
        self.session.read().unwrap().clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.session.read().unwrap().state
    }

    /// Start the connection supervisor.
    ///
    /// Idempotent: while a supervisor is already running this does nothing,
    /// so overlapping view mount cycles cannot open duplicate connections.
    pub fn connect(&self) {
        let mut guard = self.supervisor.lock().unwrap();
        if let Some(handle) = guard.as_ref() {
            if !handle.cancel.is_cancelled() {
                debug!("Tracking channel already active, connect ignored");
                return;
            }
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        *guard = Some(SupervisorHandle {
            cmd_tx,
            cancel: cancel.clone(),
        });
        drop(guard);

        set_state(&self.session, &self.event_tx, ConnectionState::Connecting);

        let transport = Arc::clone(&self.transport);
        let session = Arc::clone(&self.session);
        let event_tx = self.event_tx.clone();
        let policy = self.config.reconnect.clone();
        tokio::spawn(async move {
            run_supervisor(transport, session, event_tx, cmd_rx, policy, cancel).await;
        });
    }

    /// Join a trip's broadcast group.
    ///
    /// Remembered as the session's trip id: joined now if connected, and
    /// re-joined automatically after every reconnect. Idempotent.
    pub fn join_trip(&self, trip_id: &str) {
        self.session.write().unwrap().trip_id = Some(trip_id.to_string());
        self.send_command(Command::Join(trip_id.to_string()));
    }

    /// Leave a trip's broadcast group and forget it.
    pub fn leave_trip(&self, trip_id: &str) {
        {
            let mut session = self.session.write().unwrap();
            if session.trip_id.as_deref() == Some(trip_id) {
                session.trip_id = None;
            }
        }
        self.send_command(Command::Leave(trip_id.to_string()));
    }

    /// Publish a location update to the joined trip group.
    ///
    /// Fire-and-forget: silently dropped unless currently `Connected`.
    /// Never errors and never queues: live tracking tolerates lost samples
    /// because the next tick supersedes them.
    pub fn send_location(&self, update: LocationUpdate) {
        if self.state() != ConnectionState::Connected {
            trace!("Location update dropped: channel not connected");
            return;
        }
        self.send_command(Command::Send(update));
    }

    /// Tear down the connection, cancel all timers and forget the trip id.
    ///
    /// Must be called on session teardown; safe to call at any time,
    /// including mid-reconnect.
    pub fn disconnect(&self) {
        let handle = self.supervisor.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            info!("Tracking channel disconnect requested");
        }

        {
            let mut session = self.session.write().unwrap();
            session.trip_id = None;
            session.reconnect_attempts = 0;
        }
        set_state(&self.session, &self.event_tx, ConnectionState::Disconnected);
    }

    fn send_command(&self, command: Command) {
        let guard = self.supervisor.lock().unwrap();
        if let Some(handle) = guard.as_ref() {
            let _ = handle.cmd_tx.send(command);
        }
    }
}

impl<T: TripTransport> Drop for TrackingChannel<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.lock().unwrap().take() {
            handle.cancel.cancel();
        }
    }
}

/// Record a state transition and broadcast it if it changed anything.
fn set_state(
    session: &Arc<RwLock<TrackingSession>>,
    event_tx: &broadcast::Sender<TrackingEvent>,
    new_state: ConnectionState,
) {
    let changed = {
        let mut session = session.write().unwrap();
        if session.state == new_state {
            false
        } else {
            session.state = new_state;
            true
        }
    };
    if changed {
        debug!(state = %new_state, "Connection state changed");
        let _ = event_tx.send(TrackingEvent::StateChanged(new_state));
    }
}

/// The connection supervisor: the only task that touches the transport.
///
/// Being single means there is never more than one reconnect attempt in
/// flight and commands are applied in order.
async fn run_supervisor<T: TripTransport>(
    transport: Arc<T>,
    session: Arc<RwLock<TrackingSession>>,
    event_tx: broadcast::Sender<TrackingEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
) {
    let mut backup = tokio::time::interval(policy.backup_interval);
    backup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    backup.tick().await; // consume the immediate tick

    let mut attempts: u32 = 0;
    let mut first_connect = true;

    'outer: loop {
        if cancel.is_cancelled() {
            break;
        }

        set_state(
            &session,
            &event_tx,
            if first_connect {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            },
        );

        match transport.connect().await {
            Ok(mut conn) => {
                first_connect = false;
                attempts = 0;
                session.write().unwrap().reconnect_attempts = 0;

                // Re-issue the remembered trip membership before reporting
                // Connected so subscribers never observe a joined-less
                // Connected window after a reconnect.
                let desired = session.read().unwrap().trip_id.clone();
                let mut joined: Option<String> = None;
                if let Some(trip_id) = desired {
                    match conn.join(&trip_id).await {
                        Ok(()) => {
                            info!(trip_id = %trip_id, "Trip group joined");
                            joined = Some(trip_id);
                        }
                        Err(e) => {
                            warn!(error = %e, "Join after connect failed, reconnecting");
                            continue 'outer;
                        }
                    }
                }

                set_state(&session, &event_tx, ConnectionState::Connected);
                info!("Tracking channel connected");

                // Connected phase: pump commands and inbound broadcasts
                // until the connection dies or we are cancelled.
                loop {
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => break 'outer,

                        cmd = cmd_rx.recv() => {
                            let Some(cmd) = cmd else { break 'outer };
                            match cmd {
                                Command::Join(trip_id) => {
                                    if joined.as_deref() == Some(trip_id.as_str()) {
                                        trace!(trip_id = %trip_id, "Already joined, skipping");
                                    } else if let Err(e) = conn.join(&trip_id).await {
                                        warn!(error = %e, "Join failed, reconnecting");
                                        break;
                                    } else {
                                        info!(trip_id = %trip_id, "Trip group joined");
                                        joined = Some(trip_id);
                                    }
                                }
                                Command::Leave(trip_id) => {
                                    if joined.as_deref() == Some(trip_id.as_str()) {
                                        if let Err(e) = conn.leave(&trip_id).await {
                                            warn!(error = %e, "Leave failed, reconnecting");
                                            break;
                                        }
                                        info!(trip_id = %trip_id, "Trip group left");
                                        joined = None;
                                    }
                                }
                                Command::Send(update) => match joined.as_deref() {
                                    Some(trip_id) => {
                                        if let Err(e) = conn.send_location(trip_id, &update).await {
                                            debug!(error = %e, "Send failed, reconnecting");
                                            break;
                                        }
                                    }
                                    None => trace!("Location update dropped: no trip joined"),
                                },
                            }
                        }

                        inbound = conn.recv() => match inbound {
                            Ok(InboundMessage::PeerLocation { trip_id, update }) => {
                                let _ = event_tx.send(TrackingEvent::PeerLocation { trip_id, update });
                            }
                            Err(e) => {
                                debug!(error = %e, "Connection lost");
                                break;
                            }
                        },

                        _ = backup.tick() => {
                            // Connected: nothing to force.
                        }
                    }
                }
                // Fell out of the connected phase: retry immediately.
            }
            Err(e) => {
                attempts += 1;
                session.write().unwrap().reconnect_attempts = attempts;
                let delay = policy.delay_for_attempt(attempts);
                warn!(
                    error = %e,
                    attempt = attempts,
                    delay_secs = delay.as_secs(),
                    "Connect failed, backing off"
                );

                let sleep = tokio::time::sleep(delay);
                tokio::pin!(sleep);
                loop {
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => break 'outer,

                        _ = &mut sleep => break,

                        _ = backup.tick() => {
                            debug!("Backup timer forcing reconnect attempt");
                            break;
                        }

                        cmd = cmd_rx.recv() => {
                            let Some(cmd) = cmd else { break 'outer };
                            match cmd {
                                // Membership intent already lives in the
                                // session; it is applied on the next connect.
                                Command::Join(_) | Command::Leave(_) => {}
                                Command::Send(_) => {
                                    trace!("Location update dropped while disconnected");
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    // State is reset by `disconnect()` itself; doing it here too could stomp
    // a newer supervisor started right after the old one was cancelled.
    info!("Tracking channel supervisor stopped");
}
