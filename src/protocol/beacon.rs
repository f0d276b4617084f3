//! Beacon advertisement decoding
//!
//! Frame layout as emitted by the receiver firmware:
//!
//! ```text
//! +--------+--------+-----------+------------+--------+--------+----------+
//! | Len(1) | Type(1)| AddrTy(1) | Address(6) | RSSI(1)| Misc(1)| Payload  |
//! +--------+--------+-----------+------------+--------+--------+----------+
//!                                 little-endian         signed    TLV list
//! ```
//!
//! The payload is a sequence of TLV records, `[length][type][length-1 bytes
//! of value]`. Record type `0x09` carries the advertised device name.

use bytes::Bytes;
use serde::Serialize;

use super::packet::serialize_hex;
use crate::error::DecodeError;

/// Fixed header length preceding the TLV payload
pub const HEADER_LEN: usize = 11;

/// Largest frame a single device read can produce
pub const MAX_FRAME_SIZE: usize = 100;

/// TLV record type carrying the device name
const TLV_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Name reported when no name TLV is present
const DEFAULT_NAME: &str = "unknown";

/// A decoded beacon advertisement
///
/// Serializes to the delivery wire format:
/// `{"mac": "...", "rssi": -62, "data": "<hex>", "name": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeaconAdvertisement {
    /// Advertiser address, wire bytes reversed, colon-separated hex octets
    pub mac: String,

    /// Received signal strength
    pub rssi: i8,

    /// Advertisement payload after the fixed header
    #[serde(serialize_with = "serialize_hex")]
    pub data: Bytes,

    /// Device name from the name TLV, or `"unknown"`
    pub name: String,
}

/// Decode one beacon advertisement frame
pub fn decode(raw: Bytes) -> Result<BeaconAdvertisement, DecodeError> {
    if raw.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN,
            got: raw.len(),
        });
    }

    // Address is stored little-endian on the wire; display order is reversed.
    let mut addr = [0u8; 6];
    addr.copy_from_slice(&raw[3..9]);
    addr.reverse();
    let mac = format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        addr[0], addr[1], addr[2], addr[3], addr[4], addr[5]
    );

    let rssi = raw[9] as i8;
    let data = raw.slice(HEADER_LEN..);
    let name = scan_name(&data)?.unwrap_or_else(|| DEFAULT_NAME.to_string());

    Ok(BeaconAdvertisement {
        mac,
        rssi,
        data,
        name,
    })
}

/// Scan the TLV list for a name record
///
/// Walks every record until fewer than 2 bytes remain. A declared length that
/// would run past the buffer end fails the whole frame as truncated.
fn scan_name(data: &[u8]) -> Result<Option<String>, DecodeError> {
    let mut name = None;
    let mut idx = 0;

    while data.len() - idx >= 2 {
        let len = data[idx] as usize;
        let ty = data[idx + 1];
        let end = idx + 1 + len;

        if end > data.len() {
            return Err(DecodeError::Truncated {
                needed: end,
                got: data.len(),
            });
        }

        // len counts the type byte, so a value exists only when len >= 1
        if ty == TLV_COMPLETE_LOCAL_NAME && len >= 1 {
            name = Some(String::from_utf8_lossy(&data[idx + 2..end]).into_owned());
        }

        idx += len + 1;
    }

    Ok(name)
}
