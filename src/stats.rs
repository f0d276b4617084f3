//! Bridge-wide counters
//!
//! Every failure class the bridge tolerates silently at the frame level
//! (truncated frames, unknown device types, overflow drops) is counted here
//! so it stays observable. Shared as an `Arc` between the reader, the
//! registry, and every connection handler.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared bridge statistics
#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Frames read from the device
    pub frames_read: AtomicU64,
    /// Frame copies enqueued to subscribers
    pub frames_delivered: AtomicU64,
    /// Frame copies dropped by the overflow policy
    pub frames_dropped: AtomicU64,
    /// Frames that failed decode as truncated
    pub decode_truncated: AtomicU64,
    /// Frames that failed decode with an unknown device type
    pub decode_unknown_type: AtomicU64,
    /// Subscribers ever registered
    pub total_subscribers: AtomicU64,
    /// Currently registered subscribers
    pub active_subscribers: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_read: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub decode_truncated: u64,
    pub decode_unknown_type: u64,
    pub total_subscribers: u64,
    pub active_subscribers: u64,
}

impl BridgeStats {
    /// Create a zeroed stats block
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            decode_truncated: self.decode_truncated.load(Ordering::Relaxed),
            decode_unknown_type: self.decode_unknown_type.load(Ordering::Relaxed),
            total_subscribers: self.total_subscribers.load(Ordering::Relaxed),
            active_subscribers: self.active_subscribers.load(Ordering::Relaxed),
        }
    }

    /// Record a decode failure by kind
    pub fn record_decode_error(&self, err: &crate::error::DecodeError) {
        match err {
            crate::error::DecodeError::Truncated { .. } => {
                self.decode_truncated.fetch_add(1, Ordering::Relaxed);
            }
            crate::error::DecodeError::UnknownType(_) => {
                self.decode_unknown_type.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn test_snapshot_zeroed() {
        let stats = BridgeStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_decode_errors_classified_separately() {
        let stats = BridgeStats::new();

        stats.record_decode_error(&DecodeError::Truncated { needed: 11, got: 3 });
        stats.record_decode_error(&DecodeError::UnknownType(9));
        stats.record_decode_error(&DecodeError::UnknownType(12));

        let snap = stats.snapshot();
        assert_eq!(snap.decode_truncated, 1);
        assert_eq!(snap.decode_unknown_type, 2);
    }
}
