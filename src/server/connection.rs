//! Per-connection subscriber handler
//!
//! One handler per accepted connection, running as its own task:
//!
//! ```text
//! Connecting ──subscribe line──► Registered ──► Draining ──► Closed
//!     │                              │              │
//!     └───── timeout / peer gone ────┴──────────────┘ (always reaches Closed)
//! ```
//!
//! While draining, the handler blocks on its frame queue, decodes each frame,
//! and writes the JSON record to the socket. Decode failures drop that frame
//! and keep the connection; write failures close this connection only. Every
//! exit path deregisters from the registry exactly once.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{BridgeError, Result};
use crate::protocol::{self, Protocol};
use crate::registry::SubscriberRegistry;

/// Connection handler lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerPhase {
    /// Accepted, waiting for the subscribe line
    Connecting,
    /// Subscribed, delivery channel registered
    Registered,
    /// Receive loop running
    Draining,
    /// Deregistered and finished
    Closed,
}

/// Observable state of one connection handler
#[derive(Debug)]
pub struct ConnectionState {
    /// Session id assigned at accept
    pub session_id: u64,

    /// Current phase
    pub phase: HandlerPhase,

    /// JSON records written to the connection
    pub packets_sent: u64,

    /// Frames skipped because decode failed
    pub decode_failures: u64,
}

impl ConnectionState {
    /// Create state for a freshly accepted connection
    pub fn new(session_id: u64) -> Self {
        Self {
            session_id,
            phase: HandlerPhase::Connecting,
            packets_sent: 0,
            decode_failures: 0,
        }
    }

    /// Subscribe line received, delivery channel registered
    pub fn on_registered(&mut self) {
        if self.phase == HandlerPhase::Connecting {
            self.phase = HandlerPhase::Registered;
        }
    }

    /// Receive loop entered
    pub fn on_draining(&mut self) {
        if self.phase == HandlerPhase::Registered {
            self.phase = HandlerPhase::Draining;
        }
    }

    /// Handler finished; reachable from every phase
    pub fn on_closed(&mut self) {
        self.phase = HandlerPhase::Closed;
    }

    /// Check whether the handler has finished
    pub fn is_closed(&self) -> bool {
        self.phase == HandlerPhase::Closed
    }
}

/// Handler for one subscriber connection
pub struct ConnectionHandler<S> {
    stream: S,
    state: ConnectionState,
    protocol: Protocol,
    registry: Arc<SubscriberRegistry>,
    handshake_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ConnectionHandler<S> {
    /// Create a handler for an accepted connection
    pub fn new(
        session_id: u64,
        stream: S,
        protocol: Protocol,
        registry: Arc<SubscriberRegistry>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            stream,
            state: ConnectionState::new(session_id),
            protocol,
            registry,
            handshake_timeout,
        }
    }

    /// Run the handler to completion
    ///
    /// Returns `Ok` on an orderly close (peer disconnect or bridge shutdown)
    /// and `Err(BridgeError::Connection)` on an I/O fault. Either way the
    /// subscriber is deregistered before returning.
    pub async fn run(mut self) -> Result<()> {
        let session_id = self.state.session_id;
        let (read_half, mut write_half) = tokio::io::split(self.stream);
        let mut reader = BufReader::new(read_half);

        // Connecting: the peer announces itself with one line; content is
        // up to the client and ignored here.
        let mut subscribe_line = String::new();
        match tokio::time::timeout(self.handshake_timeout, reader.read_line(&mut subscribe_line))
            .await
        {
            Ok(Ok(0)) => {
                tracing::debug!(session_id, "Peer closed before subscribing");
                self.state.on_closed();
                return Ok(());
            }
            Ok(Ok(_)) => {
                tracing::debug!(
                    session_id,
                    request = subscribe_line.trim(),
                    "Subscribe request received"
                );
            }
            Ok(Err(e)) => {
                self.state.on_closed();
                return Err(BridgeError::Connection(e));
            }
            Err(_) => {
                tracing::warn!(session_id, "Subscribe handshake timed out");
                self.state.on_closed();
                return Err(BridgeError::Connection(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "subscribe handshake timed out",
                )));
            }
        }

        let (handle, mut rx) = self.registry.add().await;
        self.state.on_registered();
        self.state.on_draining();

        let stats = Arc::clone(self.registry.stats());
        let mut probe = [0u8; 64];

        let result: Result<()> = loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(frame) => match protocol::decode(self.protocol, frame) {
                        Ok(packet) => {
                            let mut payload = match packet.to_json() {
                                Ok(payload) => payload,
                                Err(e) => {
                                    break Err(BridgeError::Connection(io::Error::new(
                                        io::ErrorKind::InvalidData,
                                        e,
                                    )));
                                }
                            };
                            payload.push(b'\n');

                            if let Err(e) = write_half.write_all(&payload).await {
                                break Err(BridgeError::Connection(e));
                            }
                            self.state.packets_sent += 1;
                        }
                        Err(e) => {
                            // Per-frame failure: skip the frame, keep the
                            // connection, leave a classifiable trace.
                            stats.record_decode_error(&e);
                            self.state.decode_failures += 1;
                            tracing::debug!(
                                session_id,
                                protocol = %self.protocol,
                                error = %e,
                                "Frame dropped: decode failed"
                            );
                        }
                    },
                    None => {
                        tracing::debug!(session_id, "Delivery channel closed by bridge");
                        break Ok(());
                    }
                },
                read = reader.read(&mut probe) => match read {
                    Ok(0) => {
                        tracing::debug!(session_id, "Peer closed connection");
                        break Ok(());
                    }
                    Ok(_) => {
                        // Post-subscribe input carries no meaning; ignore it.
                    }
                    Err(e) => break Err(BridgeError::Connection(e)),
                },
            }
        };

        self.registry.remove(handle).await;
        self.state.on_closed();

        tracing::debug!(
            session_id,
            packets_sent = self.state.packets_sent,
            decode_failures = self.state.decode_failures,
            "Connection handler closed"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::DuplexStream;

    async fn wait_for_subscribers(registry: &SubscriberRegistry, count: usize) {
        for _ in 0..200 {
            if registry.subscriber_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("subscriber count never reached {count}");
    }

    fn spawn_handler(
        protocol: Protocol,
        registry: &Arc<SubscriberRegistry>,
    ) -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = tokio::io::duplex(4096);
        let handler = ConnectionHandler::new(
            1,
            server,
            protocol,
            Arc::clone(registry),
            Duration::from_secs(5),
        );
        (client, tokio::spawn(handler.run()))
    }

    /// Beacon frame with mac ae:99:f3:4f:43:e5 (reversed), rssi -62, name "a"
    fn beacon_frame() -> Bytes {
        Bytes::from(vec![
            0x60, 0x00, 0x00, 0xe5, 0x43, 0x4f, 0xf3, 0x99, 0xae, 0xc2, 0x00, // header
            0x02, 0x09, b'a', // name TLV
        ])
    }

    fn mesh_frame(type_code: u8) -> Bytes {
        let mut frame = vec![0u8; 59];
        frame[58] = type_code;
        Bytes::from(frame)
    }

    #[tokio::test]
    async fn test_end_to_end_beacon_json() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (client, task) = spawn_handler(Protocol::Beacon, &registry);

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"subscribe\n").await.unwrap();
        wait_for_subscribers(&registry, 1).await;

        registry.fanout(beacon_frame()).await;

        let mut lines = BufReader::new(client_read);
        let mut line = String::new();
        lines.read_line(&mut line).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["mac"], "ae:99:f3:4f:43:e5");
        assert_eq!(json["rssi"], -62);
        assert_eq!(json["name"], "a");
        assert_eq!(json["data"], "020961");

        drop(client_write);
        drop(lines);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_end_to_end_mesh_known_and_unknown_type() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (client, _task) = spawn_handler(Protocol::Mesh, &registry);

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"subscribe\n").await.unwrap();
        wait_for_subscribers(&registry, 1).await;

        // Unknown type first: must be dropped without closing the connection
        registry.fanout(mesh_frame(9)).await;
        // Known type: the first (and only) line the client sees
        registry.fanout(mesh_frame(3)).await;

        let mut lines = BufReader::new(client_read);
        let mut line = String::new();
        lines.read_line(&mut line).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["name"], "Impulse");

        // The bad frame left a classifiable diagnostic
        assert_eq!(registry.stats().snapshot().decode_unknown_type, 1);
    }

    #[tokio::test]
    async fn test_truncated_frame_skipped_connection_survives() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (client, _task) = spawn_handler(Protocol::Beacon, &registry);

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"subscribe\n").await.unwrap();
        wait_for_subscribers(&registry, 1).await;

        registry.fanout(Bytes::from_static(&[0x01, 0x02])).await; // too short
        registry.fanout(beacon_frame()).await;

        let mut lines = BufReader::new(client_read);
        let mut line = String::new();
        lines.read_line(&mut line).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["mac"], "ae:99:f3:4f:43:e5");
        assert_eq!(registry.stats().snapshot().decode_truncated, 1);
    }

    #[tokio::test]
    async fn test_peer_close_deregisters() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (client, task) = spawn_handler(Protocol::Beacon, &registry);

        let (_client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"subscribe\n").await.unwrap();
        wait_for_subscribers(&registry, 1).await;

        drop(client_write);
        drop(_client_read);

        assert!(task.await.unwrap().is_ok());
        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_bridge_shutdown_closes_handler() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (client, task) = spawn_handler(Protocol::Mesh, &registry);

        let (_client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"subscribe\n").await.unwrap();
        wait_for_subscribers(&registry, 1).await;

        registry.close_all().await;

        assert!(task.await.unwrap().is_ok());
        assert_eq!(registry.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_handshake_timeout_is_connection_error() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (client, server) = tokio::io::duplex(64);
        let handler = ConnectionHandler::new(
            1,
            server,
            Protocol::Beacon,
            Arc::clone(&registry),
            Duration::from_millis(20),
        );
        let task = tokio::spawn(handler.run());

        // Never send the subscribe line
        let result = task.await.unwrap();
        assert!(matches!(result, Err(BridgeError::Connection(_))));
        assert_eq!(registry.subscriber_count().await, 0);
        drop(client);
    }

    #[test]
    fn test_state_machine_transitions() {
        let mut state = ConnectionState::new(7);
        assert_eq!(state.phase, HandlerPhase::Connecting);

        state.on_registered();
        assert_eq!(state.phase, HandlerPhase::Registered);

        state.on_draining();
        assert_eq!(state.phase, HandlerPhase::Draining);

        state.on_closed();
        assert!(state.is_closed());
    }

    #[test]
    fn test_closed_reachable_from_connecting() {
        let mut state = ConnectionState::new(8);
        state.on_closed();
        assert!(state.is_closed());

        // Late transitions have no effect once closed
        state.on_registered();
        assert!(state.is_closed());
    }
}
