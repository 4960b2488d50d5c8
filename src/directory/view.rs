//! Snapshot-based peer directory
//!
//! Readers load the current snapshot without locking; a reload builds a new
//! snapshot off to the side and publishes it with a single pointer swap.

use arc_swap::ArcSwap;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{DirectoryStats, PeerDirectory};
use crate::types::{AddressFamily, NodeId, Peer};

/// Immutable set of peers with per-family indexes
struct Snapshot {
    all: Vec<Arc<Peer>>,
    ipv4: Vec<Arc<Peer>>,
    ipv6: Vec<Arc<Peer>>,
    by_id: HashMap<NodeId, Arc<Peer>>,
}

impl Snapshot {
    fn build(peers: impl IntoIterator<Item = Peer>) -> Self {
        // Later entries replace earlier ones with the same id
        let mut by_id: HashMap<NodeId, Arc<Peer>> = HashMap::new();
        for peer in peers {
            by_id.insert(peer.id.clone(), Arc::new(peer));
        }

        let mut all: Vec<_> = by_id.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));

        let (ipv4, ipv6): (Vec<_>, Vec<_>) = all
            .iter()
            .cloned()
            .partition(|p| p.family() == AddressFamily::Ipv4);

        Self {
            all,
            ipv4,
            ipv6,
            by_id,
        }
    }

    fn candidates(&self, family: Option<AddressFamily>) -> &[Arc<Peer>] {
        match family {
            None => &self.all,
            Some(AddressFamily::Ipv4) => &self.ipv4,
            Some(AddressFamily::Ipv6) => &self.ipv6,
        }
    }
}

/// In-memory peer directory
pub struct NetworkView {
    snapshot: ArcSwap<Snapshot>,
}

impl NetworkView {
    pub fn from_peers(peers: impl IntoIterator<Item = Peer>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::build(peers)),
        }
    }

    /// Replace the whole peer set, returning the new peer count
    pub fn replace(&self, peers: impl IntoIterator<Item = Peer>) -> usize {
        let snapshot = Snapshot::build(peers);
        let count = snapshot.all.len();
        self.snapshot.store(Arc::new(snapshot));

        debug!("Directory snapshot replaced: {} peers", count);
        count
    }

    /// All peers, ordered by node id
    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.snapshot.load().all.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().all.len()
    }

    pub fn stats(&self) -> DirectoryStats {
        let snapshot = self.snapshot.load();
        DirectoryStats {
            total_peers: snapshot.all.len(),
            ipv4_peers: snapshot.ipv4.len(),
            ipv6_peers: snapshot.ipv6.len(),
        }
    }
}

impl PeerDirectory for NetworkView {
    fn random_sample(
        &self,
        count: usize,
        pool_size: usize,
        family: Option<AddressFamily>,
    ) -> Vec<Arc<Peer>> {
        let snapshot = self.snapshot.load();
        let mut rng = rand::thread_rng();

        // Draw the candidate pool first, then serve the sample from it
        let pool: Vec<&Arc<Peer>> = snapshot
            .candidates(family)
            .choose_multiple(&mut rng, pool_size)
            .collect();

        pool.into_iter().take(count).cloned().collect()
    }

    fn lookup(&self, id: &NodeId) -> Option<Arc<Peer>> {
        self.snapshot.load().by_id.get(id).cloned()
    }
}
