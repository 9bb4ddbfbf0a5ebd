//! Integration tests for the real-time tracking channel.
//!
//! A scripted transport fails on cue so the reconnect machinery can be
//! observed end to end: backoff pacing, the backup reconnect timer, and
//! automatic trip-group rejoin. All tests run under paused tokio time, so
//! the recorded attempt timestamps are exact.
//!
//! Run with: `cargo test --test tracking_channel_integration`

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use waytrack::channel::{
    ChannelConfig, ConnectionState, InboundMessage, LocationUpdate, ReconnectPolicy,
    TrackingChannel, TrackingEvent, TransportError, TripConnection, TripTransport,
};

// ============================================================================
// Scripted transport
// ============================================================================

/// Shared handle for scripting and observing a [`FlakyTransport`].
#[derive(Clone, Default)]
struct TransportProbe {
    /// Upcoming connect outcomes; exhausted entries mean success.
    outcomes: Arc<Mutex<VecDeque<bool>>>,
    /// Timestamp of every connect attempt.
    attempts: Arc<Mutex<Vec<Instant>>>,
    /// Every wire operation, in order.
    log: Arc<Mutex<Vec<String>>>,
    /// Sender feeding the currently live connection's inbound stream.
    inbound: Arc<Mutex<Option<mpsc::UnboundedSender<InboundMessage>>>>,
}

impl TransportProbe {
    fn script_outcomes(&self, outcomes: &[bool]) {
        self.outcomes.lock().unwrap().extend(outcomes.iter().copied());
    }

    fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    fn join_count(&self, trip_id: &str) -> usize {
        let needle = format!("join:{trip_id}");
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| **entry == needle)
            .count()
    }

    /// Drop the live connection's inbound stream, killing the connection.
    fn kill_connection(&self) {
        self.inbound.lock().unwrap().take();
    }

    fn push_inbound(&self, message: InboundMessage) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(message);
        }
    }
}

struct FlakyTransport {
    probe: TransportProbe,
}

impl FlakyTransport {
    fn new() -> (Self, TransportProbe) {
        let probe = TransportProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl TripTransport for FlakyTransport {
    type Conn = FlakyConnection;

    async fn connect(&self) -> Result<FlakyConnection, TransportError> {
        self.probe.attempts.lock().unwrap().push(Instant::now());
        let ok = self
            .probe
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(true);
        if !ok {
            return Err(TransportError::ConnectFailed("scripted failure".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.probe.inbound.lock().unwrap() = Some(tx);
        Ok(FlakyConnection {
            log: Arc::clone(&self.probe.log),
            inbound_rx: rx,
        })
    }
}

struct FlakyConnection {
    log: Arc<Mutex<Vec<String>>>,
    inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl TripConnection for FlakyConnection {
    async fn join(&mut self, trip_id: &str) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(format!("join:{trip_id}"));
        Ok(())
    }

    async fn leave(&mut self, trip_id: &str) -> Result<(), TransportError> {
        self.log.lock().unwrap().push(format!("leave:{trip_id}"));
        Ok(())
    }

    async fn send_location(
        &mut self,
        trip_id: &str,
        update: &LocationUpdate,
    ) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("send:{trip_id}:{:.3}", update.lat));
        Ok(())
    }

    async fn recv(&mut self) -> Result<InboundMessage, TransportError> {
        self.inbound_rx
            .recv()
            .await
            .ok_or(TransportError::ConnectionClosed)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn test_config() -> ChannelConfig {
    ChannelConfig {
        reconnect: ReconnectPolicy::default(),
        event_capacity: 256,
    }
}

async fn wait_for_state<T: TripTransport>(channel: &TrackingChannel<T>, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(600), async {
        while channel.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("channel never reached {state}"));
}

async fn wait_for_attempts(probe: &TransportProbe, count: usize) {
    tokio::time::timeout(Duration::from_secs(600), async {
        while probe.attempt_count() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never saw {count} connect attempts"));
}

// ============================================================================
// Reconnect behavior
// ============================================================================

/// Three consecutive connect failures: backoff delays follow the schedule,
/// never decrease and never exceed the ceiling.
#[tokio::test(start_paused = true)]
async fn backoff_delays_are_non_decreasing_and_bounded() {
    let (transport, probe) = FlakyTransport::new();
    probe.script_outcomes(&[false, false, false, true]);

    let channel = TrackingChannel::new(transport, test_config());
    channel.connect();
    wait_for_state(&channel, ConnectionState::Connected).await;

    let times = probe.attempt_times();
    assert_eq!(times.len(), 4);

    let policy = ReconnectPolicy::default();
    let mut previous = Duration::ZERO;
    for (i, window) in times.windows(2).enumerate() {
        let delay = window[1] - window[0];
        assert!(
            delay >= previous,
            "delay shrank between attempts {} and {}",
            i + 1,
            i + 2
        );
        assert!(delay <= policy.ceiling(), "delay exceeded the ceiling");
        previous = delay;
    }

    // Exact pacing under paused time: 2 s, then 4 s, then 8 s
    assert_eq!(times[1] - times[0], Duration::from_secs(2));
    assert_eq!(times[2] - times[1], Duration::from_secs(4));
    assert_eq!(times[3] - times[2], Duration::from_secs(8));

    channel.disconnect();
}

/// After a mid-session connection loss and reconnect, the previously joined
/// trip is rejoined exactly once, without caller intervention.
#[tokio::test(start_paused = true)]
async fn trip_group_rejoined_exactly_once_after_reconnect() {
    let (transport, probe) = FlakyTransport::new();

    let channel = TrackingChannel::new(transport, test_config());
    channel.connect();
    channel.join_trip("trip-42");
    wait_for_state(&channel, ConnectionState::Connected).await;
    wait_for_attempts(&probe, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.join_count("trip-42"), 1);

    // Kill the live connection; the supervisor reconnects and rejoins
    probe.kill_connection();
    wait_for_attempts(&probe, 2).await;
    wait_for_state(&channel, ConnectionState::Connected).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        probe.join_count("trip-42"),
        2,
        "rejoin must happen exactly once per reconnect"
    );

    channel.disconnect();
}

/// The connection state machine walks Disconnected -> Connecting ->
/// Connected -> Reconnecting -> Connected across a connection loss.
#[tokio::test(start_paused = true)]
async fn state_transitions_across_connection_loss() {
    let (transport, probe) = FlakyTransport::new();
    // Reconnect after the kill fails once so Reconnecting is observable
    probe.script_outcomes(&[true, false, true]);

    let channel = TrackingChannel::new(transport, test_config());
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    let mut events = channel.subscribe();
    channel.connect();
    wait_for_state(&channel, ConnectionState::Connected).await;

    probe.kill_connection();
    wait_for_state(&channel, ConnectionState::Connected).await;
    channel.disconnect();

    let mut observed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TrackingEvent::StateChanged(state) = event {
            observed.push(state);
        }
    }

    assert_eq!(
        observed,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );
}

/// With a stalled backoff schedule, the 30 s backup timer still forces
/// reconnect attempts.
#[tokio::test(start_paused = true)]
async fn backup_timer_forces_attempts() {
    let (transport, probe) = FlakyTransport::new();
    probe.script_outcomes(&[false, false, false, true]);

    let config = ChannelConfig {
        reconnect: ReconnectPolicy {
            // Pathological schedule: the automatic layer would wait 10 min
            schedule: vec![Duration::from_secs(600)],
            backup_interval: Duration::from_secs(30),
        },
        event_capacity: 64,
    };
    let channel = TrackingChannel::new(transport, config);
    channel.connect();
    wait_for_state(&channel, ConnectionState::Connected).await;

    let times = probe.attempt_times();
    assert_eq!(times.len(), 4);
    for window in times.windows(2) {
        let delay = window[1] - window[0];
        assert!(
            delay <= Duration::from_secs(31),
            "backup timer should cap the wait at ~30 s, got {delay:?}"
        );
    }

    channel.disconnect();
}

// ============================================================================
// Data flow
// ============================================================================

/// Outbound sends reach the wire while connected and are dropped while the
/// channel is down, without erroring or queueing.
#[tokio::test(start_paused = true)]
async fn sends_flow_when_connected_and_drop_when_down() {
    let (transport, probe) = FlakyTransport::new();
    // After the kill, every reconnect fails
    probe.script_outcomes(&[true, false, false, false, false, false, false]);

    let channel = TrackingChannel::new(transport, test_config());
    channel.connect();
    channel.join_trip("trip-42");
    wait_for_state(&channel, ConnectionState::Connected).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    channel.send_location(update_at(53.5));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(send_count(&probe), 1);

    // Bring the connection down and keep it down
    probe.kill_connection();
    wait_for_state(&channel, ConnectionState::Reconnecting).await;

    channel.send_location(update_at(53.6));
    channel.send_location(update_at(53.7));
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Dropped, not queued
    assert_eq!(send_count(&probe), 1);

    channel.disconnect();
}

/// Inbound peer broadcasts reach subscribers as typed events.
#[tokio::test(start_paused = true)]
async fn peer_locations_reach_subscribers() {
    let (transport, probe) = FlakyTransport::new();

    let channel = TrackingChannel::new(transport, test_config());
    let mut events = channel.subscribe();
    channel.connect();
    channel.join_trip("trip-42");
    wait_for_state(&channel, ConnectionState::Connected).await;

    probe.push_inbound(InboundMessage::PeerLocation {
        trip_id: "trip-42".to_string(),
        update: update_at(48.1),
    });

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.unwrap() {
                TrackingEvent::PeerLocation { trip_id, update } => break (trip_id, update),
                TrackingEvent::StateChanged(_) => continue,
            }
        }
    })
    .await
    .expect("peer location should be delivered");

    assert_eq!(received.0, "trip-42");
    assert!((received.1.lat - 48.1).abs() < 1e-9);

    channel.disconnect();
}

fn update_at(lat: f64) -> LocationUpdate {
    LocationUpdate {
        lat,
        lng: 9.99,
        bearing: 0.0,
        speed: 10.0,
        driver_name: Some("A. Driver".to_string()),
        updated_at: None,
    }
}

fn send_count(probe: &TransportProbe) -> usize {
    probe
        .log
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.starts_with("send:"))
        .count()
}
