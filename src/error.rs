//! Bridge error types
//!
//! Two layers: `DecodeError` for per-frame failures that drop the offending
//! frame and nothing else, and `BridgeError` for faults that terminate a
//! connection handler (`Connection`) or the whole bridge (`Device`).

use thiserror::Error;

/// Per-frame decode failure
///
/// Never fatal to the bridge. The offending frame is skipped, the failure is
/// counted in [`BridgeStats`](crate::stats::BridgeStats), and processing
/// continues with the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame shorter than its protocol requires, or a TLV record's declared
    /// length runs past the end of the buffer
    #[error("truncated frame: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    /// Device-type index outside the known enumeration table
    #[error("unknown device type index {0}")]
    UnknownType(u8),
}

/// Top-level bridge error
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Read from the hardware source failed (or hit EOF). The device is
    /// assumed gone; the bridge shuts down and closes every subscriber.
    #[error("device read failed: {0}")]
    Device(#[source] std::io::Error),

    /// Write/accept failure on one subscriber's connection. Terminates that
    /// connection handler only.
    #[error("subscriber connection failed: {0}")]
    Connection(#[source] std::io::Error),

    /// Frame decode failure, surfaced where a caller decodes directly
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BridgeError>;
