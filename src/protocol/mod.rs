//! Wire-format decoding for radio advertisement frames
//!
//! Two formats are supported, matching the two receiver front-ends:
//!
//! - [`Protocol::Beacon`]: short-range beacon advertisements (BLE-style),
//!   an 11-byte fixed header followed by a TLV advertisement payload.
//! - [`Protocol::Mesh`]: mesh-network data frames (802.15.4/6LoWPAN-style),
//!   carrying two 16-byte addresses and a device-type code.
//!
//! Decoding is pure: no I/O, deterministic, and allocation is bounded by the
//! input size. A malformed frame yields a [`DecodeError`] and nothing else;
//! the bridge drops that one frame and keeps running.

pub mod beacon;
pub mod mesh;
pub mod packet;

pub use beacon::BeaconAdvertisement;
pub use mesh::MeshDataFrame;
pub use packet::ParsedPacket;

use bytes::Bytes;

use crate::error::DecodeError;

/// Wire format spoken by the attached receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Short-range beacon advertisements
    Beacon,
    /// Mesh-network data frames
    Mesh,
}

impl Protocol {
    /// Maximum bytes produced by a single device read for this protocol
    ///
    /// The hardware emits exactly one frame per read; the reader sizes its
    /// buffer to this and never reassembles across reads.
    pub fn max_frame_size(&self) -> usize {
        match self {
            Protocol::Beacon => beacon::MAX_FRAME_SIZE,
            Protocol::Mesh => mesh::MAX_FRAME_SIZE,
        }
    }

    /// Minimum bytes a well-formed frame must carry
    pub fn min_frame_size(&self) -> usize {
        match self {
            Protocol::Beacon => beacon::HEADER_LEN,
            Protocol::Mesh => mesh::MIN_FRAME_SIZE,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Beacon => write!(f, "beacon"),
            Protocol::Mesh => write!(f, "mesh"),
        }
    }
}

/// Decode one raw frame according to `protocol`
pub fn decode(protocol: Protocol, raw: Bytes) -> Result<ParsedPacket, DecodeError> {
    match protocol {
        Protocol::Beacon => beacon::decode(raw).map(ParsedPacket::Beacon),
        Protocol::Mesh => mesh::decode(raw).map(ParsedPacket::Mesh),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_limits() {
        assert_eq!(Protocol::Beacon.max_frame_size(), 100);
        assert_eq!(Protocol::Mesh.max_frame_size(), 200);
        assert_eq!(Protocol::Beacon.min_frame_size(), 11);
        assert_eq!(Protocol::Mesh.min_frame_size(), 59);
    }

    #[test]
    fn test_decode_dispatch() {
        let err = decode(Protocol::Beacon, Bytes::new()).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { needed: 11, got: 0 });

        let err = decode(Protocol::Mesh, Bytes::new()).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { needed: 59, got: 0 });
    }
}
