//! Metrics Collection
//!
//! Counters for the DNS responder and gauges mirroring the directory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::directory::DirectoryStats;

/// Metrics collector for the seed
#[derive(Default)]
pub struct Metrics {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// DNS queries answered
    pub dns_queries: AtomicU64,

    /// Queries for the apex domain
    pub apex_queries: AtomicU64,

    /// Queries for a per-peer name
    pub peer_queries: AtomicU64,

    /// Names under the apex that are not valid peer names
    pub malformed_queries: AtomicU64,

    /// Per-peer names whose node is unknown
    pub lookup_misses: AtomicU64,

    /// Names outside the apex zone
    pub refused_queries: AtomicU64,

    /// Datagrams that could not be decoded
    pub dropped_packets: AtomicU64,

    /// Replies trimmed to fit the client's payload limit
    pub trimmed_replies: AtomicU64,

    /// Resource records sent (all sections)
    pub records_served: AtomicU64,

    /// Successful peers file reloads
    pub directory_reloads: AtomicU64,

    /// Peers in the directory
    pub known_peers: AtomicU64,

    pub ipv4_peers: AtomicU64,

    pub ipv6_peers: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn inc_dns_queries(&self) {
        self.dns_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_apex_queries(&self) {
        self.apex_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_peer_queries(&self) {
        self.peer_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lookup_misses(&self) {
        self.lookup_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_refused(&self) {
        self.refused_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped_packets(&self) {
        self.dropped_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_trimmed_replies(&self) {
        self.trimmed_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_served(&self, count: u64) {
        self.records_served.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_directory_reloads(&self) {
        self.directory_reloads.fetch_add(1, Ordering::Relaxed);
    }

    /// Mirror directory counters into the gauges
    pub fn set_directory_stats(&self, stats: &DirectoryStats) {
        self.known_peers.store(stats.total_peers as u64, Ordering::Relaxed);
        self.ipv4_peers.store(stats.ipv4_peers as u64, Ordering::Relaxed);
        self.ipv6_peers.store(stats.ipv6_peers as u64, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let series: [(&str, &str, &str, u64); 14] = [
            ("uptime_seconds", "gauge", "Seed uptime in seconds", self.uptime_secs()),
            ("dns_queries_total", "counter", "DNS queries answered", load(&self.dns_queries)),
            ("apex_queries_total", "counter", "Queries for the apex domain", load(&self.apex_queries)),
            ("peer_queries_total", "counter", "Queries for per-peer names", load(&self.peer_queries)),
            ("malformed_queries_total", "counter", "Malformed names under the apex", load(&self.malformed_queries)),
            ("lookup_misses_total", "counter", "Per-peer queries for unknown nodes", load(&self.lookup_misses)),
            ("refused_queries_total", "counter", "Queries outside the apex zone", load(&self.refused_queries)),
            ("dropped_packets_total", "counter", "Undecodable datagrams", load(&self.dropped_packets)),
            ("trimmed_replies_total", "counter", "Replies trimmed to the payload limit", load(&self.trimmed_replies)),
            ("records_served_total", "counter", "Resource records sent", load(&self.records_served)),
            ("directory_reloads_total", "counter", "Successful peers file reloads", load(&self.directory_reloads)),
            ("known_peers", "gauge", "Peers in the directory", load(&self.known_peers)),
            ("ipv4_peers", "gauge", "IPv4 peers in the directory", load(&self.ipv4_peers)),
            ("ipv6_peers", "gauge", "IPv6 peers in the directory", load(&self.ipv6_peers)),
        ];

        let mut output = String::new();
        for (name, kind, help, value) in series {
            output.push_str(&format!(
                "# HELP lseed_{name} {help}\n\
                 # TYPE lseed_{name} {kind}\n\
                 lseed_{name} {value}\n\n"
            ));
        }

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "dns": {
                "queries": load(&self.dns_queries),
                "apex_queries": load(&self.apex_queries),
                "peer_queries": load(&self.peer_queries),
                "malformed": load(&self.malformed_queries),
                "lookup_misses": load(&self.lookup_misses),
                "refused": load(&self.refused_queries),
                "dropped_packets": load(&self.dropped_packets),
                "trimmed_replies": load(&self.trimmed_replies),
                "records_served": load(&self.records_served),
            },
            "directory": {
                "reloads": load(&self.directory_reloads),
                "known_peers": load(&self.known_peers),
                "ipv4_peers": load(&self.ipv4_peers),
                "ipv6_peers": load(&self.ipv6_peers),
            },
        })
    }
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.inc_dns_queries();
        metrics.inc_dns_queries();
        metrics.inc_malformed();
        metrics.add_records_served(4);

        assert_eq!(metrics.dns_queries.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.malformed_queries.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.records_served.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.set_directory_stats(&DirectoryStats {
            total_peers: 100,
            ipv4_peers: 60,
            ipv6_peers: 40,
        });

        let output = metrics.to_prometheus();

        assert!(output.contains("# TYPE lseed_known_peers gauge"));
        assert!(output.contains("lseed_known_peers 100"));
        assert!(output.contains("lseed_ipv6_peers 40"));
        assert!(output.contains("lseed_dns_queries_total 0"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.inc_lookup_misses();

        let json = metrics.to_json();

        assert_eq!(json["dns"]["lookup_misses"], 1);
        assert_eq!(json["directory"]["known_peers"], 0);
    }
}
