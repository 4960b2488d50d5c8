//! Core peer types
//!
//! A peer is identified by its compressed node public key rendered as hex,
//! and advertises one reachable address. These types are shared by the
//! directory, the DNS dispatcher and the HTTP API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Length of a hex-encoded compressed public key (33 bytes)
pub const NODE_ID_LEN: usize = 66;

/// Leading character shared by every node id (compressed keys are 02.. or 03..)
pub const NODE_ID_PREFIX: char = '0';

/// Bit of the raw type field selecting the address family
const FAMILY_BIT: u8 = 0b0000_0001;

/// Errors raised while validating peer data
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("node id must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("node id must start with '{0}'")]
    InvalidPrefix(char),

    #[error("node id is not valid hex")]
    InvalidHex,

    #[error("declared {declared} family does not match address {address}")]
    FamilyMismatch {
        declared: AddressFamily,
        address: IpAddr,
    },
}

/// Hex-encoded node identifier
///
/// Always lowercase, [`NODE_ID_LEN`] characters long and starting with
/// [`NODE_ID_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Parse and normalize a node id
    pub fn parse(s: &str) -> Result<Self, PeerError> {
        if s.len() != NODE_ID_LEN {
            return Err(PeerError::InvalidLength {
                expected: NODE_ID_LEN,
                actual: s.len(),
            });
        }

        let id = s.to_ascii_lowercase();
        if !id.starts_with(NODE_ID_PREFIX) {
            return Err(PeerError::InvalidPrefix(NODE_ID_PREFIX));
        }

        // Even length is guaranteed above, so decode only fails on bad digits
        hex::decode(&id).map_err(|_| PeerError::InvalidHex)?;

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..16]
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = PeerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Address family a peer declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Family of a concrete address
    pub fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => f.write_str("ipv4"),
            AddressFamily::Ipv6 => f.write_str("ipv6"),
        }
    }
}

/// Decoded form of the directory's bit-flag type field
///
/// Only bit 0 has a known meaning. The other bits belong to the directory
/// and are kept as-is so [`PeerType::to_bits`] reproduces the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerType {
    pub family: AddressFamily,
    extra_bits: u8,
}

impl PeerType {
    pub fn from_bits(bits: u8) -> Self {
        let family = if bits & FAMILY_BIT == FAMILY_BIT {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        };

        Self {
            family,
            extra_bits: bits & !FAMILY_BIT,
        }
    }

    pub fn to_bits(self) -> u8 {
        let family = match self.family {
            AddressFamily::Ipv4 => 0,
            AddressFamily::Ipv6 => FAMILY_BIT,
        };
        self.extra_bits | family
    }

    /// Bits other than the address family, uninterpreted
    pub fn extra_bits(self) -> u8 {
        self.extra_bits
    }
}

/// A reachable network participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: NodeId,
    pub address: IpAddr,
    pub port: u16,
    pub kind: PeerType,
}

impl Peer {
    /// Build a peer, rejecting a declared family that contradicts the address
    pub fn new(id: NodeId, address: IpAddr, port: u16, kind: PeerType) -> Result<Self, PeerError> {
        if kind.family != AddressFamily::of(&address) {
            return Err(PeerError::FamilyMismatch {
                declared: kind.family,
                address,
            });
        }

        Ok(Self {
            id,
            address,
            port,
            kind,
        })
    }

    /// Declared address family
    pub fn family(&self) -> AddressFamily {
        self.kind.family
    }
}

/// Peer as stored in the peers file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: String,

    pub address: IpAddr,

    pub port: u16,

    /// Raw bit-flag type field
    #[serde(rename = "type", default)]
    pub kind: u8,

    /// Unix timestamp of the last time the directory saw this peer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
}

impl PeerRecord {
    /// Check whether the record is older than the timeout
    ///
    /// Records without a timestamp never go stale.
    pub fn is_stale(&self, now: u64, timeout_secs: u64) -> bool {
        match self.last_seen {
            Some(seen) => now.saturating_sub(seen) > timeout_secs,
            None => false,
        }
    }

    pub fn into_peer(self) -> Result<Peer, PeerError> {
        let id = NodeId::parse(&self.id)?;
        Peer::new(id, self.address, self.port, PeerType::from_bits(self.kind))
    }
}

impl From<&Peer> for PeerRecord {
    fn from(peer: &Peer) -> Self {
        Self {
            id: peer.id.to_string(),
            address: peer.address,
            port: peer.port,
            kind: peer.kind.to_bits(),
            last_seen: None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "02a5e38d5f4e1a6cbc4c9c83b30ac9b7b0f2c1d1c2d3e4f5a6b7c8d9e0f1a2b3c4";

    #[test]
    fn test_node_id_parse() {
        let id = NodeId::parse(ID).unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(id.short(), &ID[..16]);
    }

    #[test]
    fn test_node_id_normalizes_case() {
        let id = NodeId::parse(&ID.to_uppercase()).unwrap();
        assert_eq!(id.as_str(), ID);
    }

    #[test]
    fn test_node_id_rejects_bad_input() {
        assert_eq!(
            NodeId::parse("02ab"),
            Err(PeerError::InvalidLength { expected: NODE_ID_LEN, actual: 4 })
        );

        let wrong_prefix = format!("1{}", &ID[1..]);
        assert_eq!(NodeId::parse(&wrong_prefix), Err(PeerError::InvalidPrefix('0')));

        let not_hex = format!("{}zz", &ID[..64]);
        assert_eq!(NodeId::parse(&not_hex), Err(PeerError::InvalidHex));
    }

    #[test]
    fn test_peer_type_bits() {
        assert_eq!(PeerType::from_bits(0).family, AddressFamily::Ipv4);
        assert_eq!(PeerType::from_bits(1).family, AddressFamily::Ipv6);

        // Unknown bits survive a round trip untouched
        let kind = PeerType::from_bits(0b1010_0001);
        assert_eq!(kind.family, AddressFamily::Ipv6);
        assert_eq!(kind.extra_bits(), 0b1010_0000);
        assert_eq!(kind.to_bits(), 0b1010_0001);
    }

    #[test]
    fn test_peer_family_mismatch() {
        let id = NodeId::parse(ID).unwrap();
        let result = Peer::new(
            id,
            "192.0.2.1".parse().unwrap(),
            9735,
            PeerType::from_bits(1),
        );
        assert!(matches!(result, Err(PeerError::FamilyMismatch { .. })));
    }

    #[test]
    fn test_peer_record_json() {
        let json = format!(
            r#"{{"id": "{}", "address": "2001:db8::1", "port": 9735, "type": 1}}"#,
            ID
        );
        let record: PeerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.last_seen, None);

        let peer = record.into_peer().unwrap();
        assert_eq!(peer.family(), AddressFamily::Ipv6);
        assert_eq!(peer.port, 9735);
    }

    #[test]
    fn test_peer_record_stale_check() {
        let record = PeerRecord {
            id: ID.to_string(),
            address: "192.0.2.1".parse().unwrap(),
            port: 9735,
            kind: 0,
            last_seen: Some(1_000),
        };

        assert!(!record.is_stale(1_500, 600));
        assert!(record.is_stale(2_000, 600));

        let timeless = PeerRecord { last_seen: None, ..record };
        assert!(!timeless.is_stale(u64::MAX, 1));
    }
}
