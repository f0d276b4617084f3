//! Parsed packet records delivered to subscribers

use bytes::Bytes;
use serde::{Serialize, Serializer};

use super::beacon::BeaconAdvertisement;
use super::mesh::MeshDataFrame;

/// One decoded frame, ready for delivery
///
/// Untagged: each variant serializes directly to its protocol's JSON object,
/// with no enclosing discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParsedPacket {
    Beacon(BeaconAdvertisement),
    Mesh(MeshDataFrame),
}

impl ParsedPacket {
    /// Serialize to the delivery wire format (one JSON object, no newline)
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Serialize a byte buffer as a lowercase hex string
pub(crate) fn serialize_hex<S: Serializer>(data: &Bytes, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_beacon_json() {
        let pkt = ParsedPacket::Beacon(BeaconAdvertisement {
            mac: "ae:99:f3:4f:43:e5".into(),
            rssi: -62,
            data: Bytes::from_static(&[0xde, 0xad]),
            name: "unknown".into(),
        });

        let json: serde_json::Value = serde_json::from_slice(&pkt.to_json().unwrap()).unwrap();
        assert_eq!(json["mac"], "ae:99:f3:4f:43:e5");
        assert_eq!(json["rssi"], -62);
        assert_eq!(json["data"], "dead");
        assert_eq!(json["name"], "unknown");
        assert!(json.get("Beacon").is_none());
    }
}
