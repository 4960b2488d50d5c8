//! Node id <-> DNS name codec
//!
//! A node id is 66 hex characters, longer than the 63 octet DNS label limit.
//! It is published as two labels under the apex domain:
//!
//! ```text
//! 02a5e3...c4d9 (66 chars)
//!  └───── label1: id[1..64] (63 chars) ─────┘└ label2: id[64..] (2 chars) ┘
//!
//! <label1>.<label2>.<apex>.
//! ```
//!
//! The leading `0` is dropped on encode and restored on decode.

use crate::types::{NodeId, PeerError, NODE_ID_LEN, NODE_ID_PREFIX};

/// Maximum length of a single DNS label
pub const MAX_LABEL_LEN: usize = 63;

/// Combined length of the two labels carrying a node id
pub const SPLIT_LEN: usize = NODE_ID_LEN - 1;

/// Reasons a name is not a per-peer name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("name is not under the apex domain")]
    OutsideZone,

    #[error("expected 2 labels before the apex, got {0}")]
    ComponentCount(usize),

    #[error("labels carry {0} characters, expected {}", SPLIT_LEN)]
    SplitLength(usize),

    #[error("labels do not form a node id: {0}")]
    InvalidId(#[from] PeerError),
}

/// Split a node id into its two DNS labels
pub fn encode(id: &NodeId) -> (&str, &str) {
    let body = &id.as_str()[NODE_ID_PREFIX.len_utf8()..];
    body.split_at(MAX_LABEL_LEN)
}

/// Fully qualified per-peer domain name
pub fn peer_domain(id: &NodeId, apex: &str) -> String {
    let (label1, label2) = encode(id);
    format!("{}.{}.{}.", label1, label2, normalize(apex))
}

/// Recover the node id from a per-peer domain name
///
/// Matching is case-insensitive and ignores a trailing dot.
pub fn decode(name: &str, apex: &str) -> Result<NodeId, DecodeError> {
    let name = normalize(name).to_ascii_lowercase();
    let apex = normalize(apex).to_ascii_lowercase();

    let labels = name
        .strip_suffix(apex.as_str())
        .and_then(|rest| rest.strip_suffix('.'))
        .ok_or(DecodeError::OutsideZone)?;

    let parts: Vec<&str> = labels.split('.').collect();
    let [label1, label2] = parts.as_slice() else {
        return Err(DecodeError::ComponentCount(parts.len()));
    };

    let carried = label1.len() + label2.len();
    if carried != SPLIT_LEN {
        return Err(DecodeError::SplitLength(carried));
    }

    let id = format!("{}{}{}", NODE_ID_PREFIX, label1, label2);
    Ok(NodeId::parse(&id)?)
}

/// Strip the trailing root dot
pub fn normalize(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::node_id;

    const APEX: &str = "lseed.bitcoinstats.com";

    #[test]
    fn test_encode_split() {
        let id = node_id(7);
        let (label1, label2) = encode(&id);

        assert_eq!(label1.len(), MAX_LABEL_LEN);
        assert_eq!(label2.len(), 2);
        assert_eq!(label1.len() + label2.len(), SPLIT_LEN);
        assert_eq!(format!("0{}{}", label1, label2), id.as_str());
    }

    #[test]
    fn test_split_length_is_constant() {
        for seed in [0u8, 1, 42, 200, 255] {
            let id = node_id(seed);
            let (label1, label2) = encode(&id);
            assert_eq!(label1.len() + label2.len(), SPLIT_LEN);
        }
    }

    #[test]
    fn test_round_trip() {
        for seed in 0..=255u8 {
            let id = node_id(seed);
            let name = peer_domain(&id, APEX);
            assert_eq!(decode(&name, APEX), Ok(id));
        }
    }

    #[test]
    fn test_peer_domain_format() {
        let id = node_id(1);
        let name = peer_domain(&id, "lseed.bitcoinstats.com.");
        assert!(name.ends_with(".lseed.bitcoinstats.com."));
        assert_eq!(name.split('.').count(), 6);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let id = node_id(9);
        let name = peer_domain(&id, APEX).to_uppercase();
        assert_eq!(decode(&name, APEX), Ok(id));
    }

    #[test]
    fn test_decode_accepts_uneven_split() {
        // Only the combined length is checked, not where the cut falls
        let id = node_id(3);
        let body = &id.as_str()[1..];
        let name = format!("{}.{}.{}", &body[..60], &body[60..], APEX);
        assert_eq!(decode(&name, APEX), Ok(id));
    }

    #[test]
    fn test_decode_rejects_wrong_component_count() {
        assert_eq!(
            decode(&format!("abc.{}", APEX), APEX),
            Err(DecodeError::ComponentCount(1))
        );
        assert_eq!(
            decode(&format!("a.b.c.{}", APEX), APEX),
            Err(DecodeError::ComponentCount(3))
        );
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(
            decode(&format!("abcd.ef.{}", APEX), APEX),
            Err(DecodeError::SplitLength(6))
        );
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        let label1 = "z".repeat(MAX_LABEL_LEN);
        let result = decode(&format!("{}.zz.{}", label1, APEX), APEX);
        assert!(matches!(result, Err(DecodeError::InvalidId(PeerError::InvalidHex))));
    }

    #[test]
    fn test_decode_rejects_outside_zone() {
        assert_eq!(decode("example.com.", APEX), Err(DecodeError::OutsideZone));
        // Suffix match must fall on a label boundary
        assert_eq!(
            decode("a.b.xlseed.bitcoinstats.com", APEX),
            Err(DecodeError::OutsideZone)
        );
        // The apex itself carries no labels
        assert_eq!(decode(APEX, APEX), Err(DecodeError::OutsideZone));
    }
}
