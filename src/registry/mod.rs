//! Subscriber registry for frame fan-out
//!
//! The registry is the only shared mutable state in the bridge. The fan-out
//! reader pushes each raw frame through it; every registered subscriber gets
//! its own copy on its own bounded queue.
//!
//! ```text
//!                       Arc<SubscriberRegistry>
//!                  ┌────────────────────────────┐
//!                  │ subscribers: HashMap<id,   │
//!                  │   SubscriberEntry {        │
//!                  │     tx: mpsc::Sender,      │
//!                  │     degraded, counters     │
//!                  │   }                        │
//!                  │ >                          │
//!                  └─────────────┬──────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!       [FanoutReader]     [Subscriber]        [Subscriber]
//!       registry.fanout()  rx.recv()           rx.recv()
//!            │                   │                   │
//!            └──► try_send ──────┴──► decode ──► JSON ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames are `bytes::Bytes`; the per-subscriber "copy" is a refcount bump,
//! so no subscriber can mutate bytes seen by another and fan-out cost does
//! not scale with frame size.

pub mod config;
pub mod store;
pub mod subscriber;

pub use config::RegistryConfig;
pub use store::SubscriberRegistry;
pub use subscriber::{SubscriberHandle, SubscriberStats};
