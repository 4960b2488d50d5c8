//! Peer Directory Module
//!
//! The DNS dispatcher only needs two things from the directory: a bounded
//! random sample and a lookup by node id. Both go through [`PeerDirectory`]
//! so the dispatcher can be driven by any source of peers.
//!
//! [`NetworkView`] is the in-process implementation. It is filled from a
//! JSON peers file (see [`peers_file`]) and swaps whole snapshots on reload.

pub mod peers_file;
mod view;

pub use view::NetworkView;

use std::path::PathBuf;
use std::sync::Arc;

use crate::types::{AddressFamily, NodeId, Peer};

/// Read access to the set of known peers
///
/// Implementations synchronise internally; callers share one instance
/// across all in-flight queries.
pub trait PeerDirectory: Send + Sync {
    /// At most `min(count, pool_size)` distinct peers chosen at random,
    /// restricted to `family` when given
    fn random_sample(
        &self,
        count: usize,
        pool_size: usize,
        family: Option<AddressFamily>,
    ) -> Vec<Arc<Peer>>;

    fn lookup(&self, id: &NodeId) -> Option<Arc<Peer>>;
}

/// Snapshot counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryStats {
    pub total_peers: usize,
    pub ipv4_peers: usize,
    pub ipv6_peers: usize,
}

/// Errors while loading peers into the directory
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read peers file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse peers file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
