//! Network-side half of the bridge
//!
//! A thin TCP server standing in for the generic connection layer: accept,
//! read one subscribe line, then stream decoded JSON records until either
//! side goes away. One [`ConnectionHandler`] task per accepted connection.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::{ConnectionHandler, ConnectionState, HandlerPhase};
pub use listener::PortalServer;
