//! Peers file loader
//!
//! The peers file is a JSON array of [`PeerRecord`]s written by whatever
//! process tracks the network (a crawler, a node plugin, an operator).

use std::path::Path;
use tracing::{debug, warn};

use super::DirectoryError;
use crate::types::{Peer, PeerRecord};

/// Parse peer records from JSON text
pub fn parse(content: &str) -> Result<Vec<PeerRecord>, serde_json::Error> {
    serde_json::from_str(content)
}

/// Turn records into peers, dropping stale and invalid entries
///
/// A `timeout_secs` of zero disables staleness filtering.
pub fn select_live(records: Vec<PeerRecord>, now: u64, timeout_secs: u64) -> Vec<Peer> {
    let mut peers = Vec::with_capacity(records.len());
    let mut stale = 0usize;

    for record in records {
        if timeout_secs > 0 && record.is_stale(now, timeout_secs) {
            stale += 1;
            continue;
        }

        let id = record.id.clone();
        match record.into_peer() {
            Ok(peer) => peers.push(peer),
            Err(e) => warn!("Skipping peer {}: {}", id, e),
        }
    }

    if stale > 0 {
        debug!("Dropped {} stale peers", stale);
    }

    peers
}

/// Read the peers file and return the live peers it lists
pub fn load(path: &Path, now: u64, timeout_secs: u64) -> Result<Vec<Peer>, DirectoryError> {
    let content = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse(&content).map_err(|source| DirectoryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(select_live(records, now, timeout_secs))
}
