//! Mesh data-frame decoding
//!
//! Frames arrive from the 6LoWPAN capture pipe. The slice of interest:
//!
//! ```text
//! bytes  8..24   source address (16 bytes, wire order)
//! bytes 24..40   destination address (16 bytes, wire order)
//! byte     58    device-type code, index into [`DEVICE_TYPES`]
//! ```
//!
//! The full raw frame is kept and delivered hex-encoded for passthrough
//! diagnostics.

use bytes::Bytes;
use serde::Serialize;

use super::packet::serialize_hex;
use crate::error::DecodeError;

/// Offset of the source address
const SRC_OFFSET: usize = 8;

/// Offset of the destination address
const DST_OFFSET: usize = 24;

/// Offset of the device-type code
const TYPE_OFFSET: usize = 58;

/// Shortest frame that carries the type byte
pub const MIN_FRAME_SIZE: usize = TYPE_OFFSET + 1;

/// Largest frame a single device read can produce
pub const MAX_FRAME_SIZE: usize = 200;

/// Known device types, indexed by the frame's type code
pub const DEVICE_TYPES: [&str; 8] = [
    "unused",
    "Coilcube",
    "sEHnsor",
    "Impulse",
    "Coilcube Splitcore",
    "Gecko + Impulse",
    "Buzz",
    "Hot Spring",
];

/// A decoded mesh data frame
///
/// Serializes to the delivery wire format:
/// `{"data": "<hex>", "src": "...", "dst": "...", "name": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeshDataFrame {
    /// Full raw frame, for passthrough diagnostics
    #[serde(serialize_with = "serialize_hex")]
    pub data: Bytes,

    /// Source address, eight colon-separated 2-byte hex groups
    pub src: String,

    /// Destination address, eight colon-separated 2-byte hex groups
    pub dst: String,

    /// Device type from [`DEVICE_TYPES`]
    pub name: &'static str,
}

/// Decode one mesh data frame
pub fn decode(raw: Bytes) -> Result<MeshDataFrame, DecodeError> {
    if raw.len() < MIN_FRAME_SIZE {
        return Err(DecodeError::Truncated {
            needed: MIN_FRAME_SIZE,
            got: raw.len(),
        });
    }

    let src = format_address(&raw[SRC_OFFSET..SRC_OFFSET + 16]);
    let dst = format_address(&raw[DST_OFFSET..DST_OFFSET + 16]);

    let code = raw[TYPE_OFFSET];
    let name = *DEVICE_TYPES
        .get(code as usize)
        .ok_or(DecodeError::UnknownType(code))?;

    Ok(MeshDataFrame {
        data: raw,
        src,
        dst,
        name,
    })
}

/// Format a 16-byte address as eight colon-separated 2-byte groups, wire order
fn format_address(bytes: &[u8]) -> String {
    debug_assert_eq!(bytes.len(), 16);

    let mut out = String::with_capacity(16 * 2 + 7);
    for (i, pair) in bytes.chunks(2).enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{:02x}{:02x}", pair[0], pair[1]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal frame with recognizable addresses and the given type code
    fn frame_with_type(code: u8) -> Bytes {
        let mut frame = vec![0u8; MIN_FRAME_SIZE];
        for (i, b) in frame[SRC_OFFSET..SRC_OFFSET + 16].iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in frame[DST_OFFSET..DST_OFFSET + 16].iter_mut().enumerate() {
            *b = 0xf0 + i as u8;
        }
        frame[TYPE_OFFSET] = code;
        Bytes::from(frame)
    }

    #[test]
    fn test_decode_addresses() {
        let pkt = decode(frame_with_type(1)).unwrap();

        assert_eq!(pkt.src, "0001:0203:0405:0607:0809:0a0b:0c0d:0e0f");
        assert_eq!(pkt.dst, "f0f1:f2f3:f4f5:f6f7:f8f9:fafb:fcfd:feff");
        assert_eq!(pkt.name, "Coilcube");
        assert_eq!(pkt.data.len(), MIN_FRAME_SIZE);
    }

    #[test]
    fn test_type_table_exhaustive() {
        let expected = [
            "unused",
            "Coilcube",
            "sEHnsor",
            "Impulse",
            "Coilcube Splitcore",
            "Gecko + Impulse",
            "Buzz",
            "Hot Spring",
        ];
        for (code, name) in expected.iter().enumerate() {
            let pkt = decode(frame_with_type(code as u8)).unwrap();
            assert_eq!(pkt.name, *name);
        }
    }

    #[test]
    fn test_out_of_range_type() {
        for code in [8u8, 9, 0x7f, 0xff] {
            let err = decode(frame_with_type(code)).unwrap_err();
            assert_eq!(err, DecodeError::UnknownType(code));
        }
    }

    #[test]
    fn test_truncated_below_minimum() {
        for len in 0..MIN_FRAME_SIZE {
            let err = decode(Bytes::from(vec![0u8; len])).unwrap_err();
            assert_eq!(
                err,
                DecodeError::Truncated {
                    needed: MIN_FRAME_SIZE,
                    got: len
                }
            );
        }
    }

    #[test]
    fn test_json_wire_format() {
        let pkt = decode(frame_with_type(3)).unwrap();
        let json = serde_json::to_value(&pkt).unwrap();

        assert_eq!(json["name"], "Impulse");
        assert_eq!(json["src"], "0001:0203:0405:0607:0809:0a0b:0c0d:0e0f");
        assert_eq!(json["dst"], "f0f1:f2f3:f4f5:f6f7:f8f9:fafb:fcfd:feff");
        assert_eq!(
            json["data"].as_str().unwrap().len(),
            MIN_FRAME_SIZE * 2 // hex doubles the length
        );
    }
}
