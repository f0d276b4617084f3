//! Per-subscriber entry types
//!
//! Each connected client owns a [`SubscriberHandle`] and the receiving half
//! of a bounded frame queue. The registry keeps the sending half plus the
//! counters fan-out updates through atomics, so delivery needs no per-entry
//! lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Opaque handle identifying one registered subscriber
///
/// Returned by [`SubscriberRegistry::add`](super::SubscriberRegistry::add);
/// the only way to deregister. Handles are never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(pub(super) u64);

impl SubscriberHandle {
    /// Numeric id, for log correlation with the session id
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Outcome of one enqueue attempt during fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EnqueueOutcome {
    /// Frame queued for delivery
    Delivered,
    /// Queue full; frame dropped for this subscriber only
    Dropped,
    /// Receiver gone; entry should be pruned
    Closed,
}

/// Registry-side state for one subscriber
pub(super) struct SubscriberEntry {
    /// Sending half of the subscriber's frame queue
    tx: mpsc::Sender<Bytes>,

    /// Set on the first overflow drop, never cleared
    degraded: AtomicBool,

    /// Frames enqueued for this subscriber
    delivered: AtomicU64,

    /// Frames dropped by the overflow policy
    dropped: AtomicU64,

    /// When the subscriber registered
    registered_at: Instant,
}

impl SubscriberEntry {
    pub(super) fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            degraded: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            registered_at: Instant::now(),
        }
    }

    /// Non-blocking enqueue; the overflow policy drops the new frame
    pub(super) fn enqueue(&self, frame: Bytes) -> EnqueueOutcome {
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                EnqueueOutcome::Delivered
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                self.degraded.store(true, Ordering::Relaxed);
                EnqueueOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    pub(super) fn stats(&self) -> SubscriberStats {
        SubscriberStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            registered_at: self.registered_at,
        }
    }
}

/// Point-in-time statistics for one subscriber
#[derive(Debug, Clone)]
pub struct SubscriberStats {
    /// Frames enqueued for delivery
    pub delivered: u64,
    /// Frames dropped by the overflow policy
    pub dropped: u64,
    /// Whether this subscriber has ever overflowed
    pub degraded: bool,
    /// When the subscriber registered
    pub registered_at: Instant,
}
