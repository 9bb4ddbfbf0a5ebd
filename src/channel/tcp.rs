//! TCP transport speaking newline-delimited JSON frames.
//!
//! Each line is one JSON object tagged by `type`:
//!
//! ```text
//! {"type":"join","tripId":"trip-42"}
//! {"type":"leave","tripId":"trip-42"}
//! {"type":"location","tripId":"trip-42","payload":{"lat":53.6,"lng":9.9,...}}
//! ```
//!
//! Inbound `location` frames become [`InboundMessage::PeerLocation`];
//! unparseable lines are logged and skipped so one bad frame cannot kill a
//! live connection.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::state::LocationUpdate;
use super::transport::{InboundMessage, TransportError, TripConnection, TripTransport};

/// Wire frame exchanged with the tracking service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Frame {
    #[serde(rename_all = "camelCase")]
    Join { trip_id: String },

    #[serde(rename_all = "camelCase")]
    Leave { trip_id: String },

    #[serde(rename_all = "camelCase")]
    Location {
        trip_id: String,
        payload: LocationUpdate,
    },
}

/// Transport connecting to a tracking service over TCP.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    /// Create a transport for `addr` (e.g. `"tracker.example.com:7300"`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// The configured service address.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl TripTransport for TcpTransport {
    type Conn = TcpConnection;

    async fn connect(&self) -> Result<TcpConnection, TransportError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        debug!(addr = %self.addr, "Tracking transport connected");

        let (read_half, write_half) = stream.into_split();
        Ok(TcpConnection {
            reader: BufReader::new(read_half).lines(),
            writer: write_half,
        })
    }
}

/// One live TCP connection.
pub struct TcpConnection {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TcpConnection {
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let mut line = serde_json::to_string(frame)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

impl TripConnection for TcpConnection {
    async fn join(&mut self, trip_id: &str) -> Result<(), TransportError> {
        self.write_frame(&Frame::Join {
            trip_id: trip_id.to_string(),
        })
        .await
    }

    async fn leave(&mut self, trip_id: &str) -> Result<(), TransportError> {
        self.write_frame(&Frame::Leave {
            trip_id: trip_id.to_string(),
        })
        .await
    }

    async fn send_location(
        &mut self,
        trip_id: &str,
        update: &LocationUpdate,
    ) -> Result<(), TransportError> {
        self.write_frame(&Frame::Location {
            trip_id: trip_id.to_string(),
            payload: update.clone(),
        })
        .await
    }

    async fn recv(&mut self) -> Result<InboundMessage, TransportError> {
        loop {
            let line = self
                .reader
                .next_line()
                .await
                .map_err(|e| TransportError::RecvFailed(e.to_string()))?
                .ok_or(TransportError::ConnectionClosed)?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Frame>(&line) {
                Ok(Frame::Location { trip_id, payload }) => {
                    return Ok(InboundMessage::PeerLocation {
                        trip_id,
                        update: payload,
                    });
                }
                Ok(other) => {
                    // Membership acks are not interesting to the supervisor.
                    debug!(frame = ?other, "Ignoring non-location inbound frame");
                }
                Err(e) => {
                    let preview: String = line.chars().take(80).collect();
                    warn!(error = %e, preview = %preview, "Skipping malformed frame");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn frame_serialization_shapes() {
        let frame = Frame::Join {
            trip_id: "trip-42".to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "join");
        assert_eq!(json["tripId"], "trip-42");

        let frame = Frame::Location {
            trip_id: "trip-42".to_string(),
            payload: LocationUpdate {
                lat: 53.63,
                lng: 9.99,
                bearing: 90.0,
                speed: 10.0,
                driver_name: None,
                updated_at: None,
            },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "location");
        assert_eq!(json["payload"]["lat"], 53.63);
    }

    #[test]
    fn frame_deserializes_from_wire_shape() {
        let json = r#"{"type":"location","tripId":"t1","payload":{"lat":1.0,"lng":2.0,"bearing":0.0,"speed":0.0}}"#;
        let frame: Frame = serde_json::from_str(json).unwrap();
        match frame {
            Frame::Location { trip_id, payload } => {
                assert_eq!(trip_id, "t1");
                assert_eq!(payload.lat, 1.0);
                assert_eq!(payload.lng, 2.0);
            }
            other => panic!("expected location frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn loopback_join_and_receive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            // Expect the join frame
            let line = lines.next_line().await.unwrap().unwrap();
            let frame: Frame = serde_json::from_str(&line).unwrap();
            assert!(matches!(frame, Frame::Join { .. }));

            // Then a garbage line (must be skipped) and a location broadcast
            write_half.write_all(b"not json\n").await.unwrap();
            let broadcast = r#"{"type":"location","tripId":"t1","payload":{"lat":53.0,"lng":10.0,"bearing":0.0,"speed":5.0}}"#;
            write_half
                .write_all(format!("{broadcast}\n").as_bytes())
                .await
                .unwrap();
        });

        let transport = TcpTransport::new(addr.to_string());
        let mut conn = transport.connect().await.unwrap();
        conn.join("t1").await.unwrap();

        let message = conn.recv().await.unwrap();
        match message {
            InboundMessage::PeerLocation { trip_id, update } => {
                assert_eq!(trip_id, "t1");
                assert_eq!(update.lat, 53.0);
            }
        }

        server.await.unwrap();
    }

    #[tokio::test]
    async fn recv_reports_closed_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let transport = TcpTransport::new(addr.to_string());
        let mut conn = transport.connect().await.unwrap();
        let result = conn.recv().await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));

        server.await.unwrap();
    }
}
