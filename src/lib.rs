//! radio-portal: fan-out bridge from radio advertisement receivers to
//! network subscribers.
//!
//! A single [`FanoutReader`] owns the raw device handle (BLE sniffer
//! character device or 6LoWPAN capture pipe) and copies every frame it reads
//! to each connected subscriber through the [`SubscriberRegistry`]. Each
//! subscriber's [`ConnectionHandler`](server::ConnectionHandler) drains its
//! own queue, decodes frames with the pure [`protocol`] layer, and streams
//! one JSON record per frame over its TCP connection.
//!
//! ```text
//! device ──► FanoutReader ──► SubscriberRegistry ──► queue ──► handler ──► JSON ──► TCP
//!                                   │                  queue ──► handler ──► JSON ──► TCP
//!                                   └─ one bounded queue per subscriber
//! ```
//!
//! Failure model: malformed frames are dropped per subscriber and counted
//! ([`BridgeStats`]); a subscriber's connection fault tears down only that
//! handler; a device fault tears down the whole bridge and closes every
//! subscriber channel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use radio_portal::{FanoutReader, PortalServer, Protocol, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> radio_portal::Result<()> {
//!     let server = PortalServer::new(ServerConfig::default(), Protocol::Beacon);
//!     let registry = Arc::clone(server.registry());
//!
//!     let device = tokio::fs::File::open("/dev/nrf51822_1")
//!         .await
//!         .map_err(radio_portal::BridgeError::Device)?;
//!     let reader = FanoutReader::new(device, Protocol::Beacon, registry);
//!
//!     tokio::select! {
//!         result = server.run() => result,
//!         result = reader.run() => result,
//!     }
//! }
//! ```

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use bridge::FanoutReader;
pub use error::{BridgeError, DecodeError, Result};
pub use protocol::{decode, BeaconAdvertisement, MeshDataFrame, ParsedPacket, Protocol};
pub use registry::{RegistryConfig, SubscriberHandle, SubscriberRegistry};
pub use server::{PortalServer, ServerConfig};
pub use stats::{BridgeStats, StatsSnapshot};
