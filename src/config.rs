//! Seed Configuration
//!
//! Configurable parameters for the DNS seed service. Values come from a TOML
//! file and can be overridden on the command line.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Smallest UDP payload every DNS client accepts
pub const MIN_UDP_PAYLOAD: u16 = 512;

/// How many peers each query type hands out
///
/// Small samples spread discovery load across the network and keep any
/// single reply from revealing much of the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingPolicy {
    /// Peers per apex AAAA query
    pub aaaa_count: usize,

    /// Peers per apex A query
    pub a_count: usize,

    /// Peers per apex SRV query
    pub srv_count: usize,

    /// Size of the random candidate pool each sample is drawn from
    pub pool_size: usize,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            aaaa_count: 3,
            a_count: 2,
            srv_count: 255,
            pool_size: 25,
        }
    }
}

/// Main configuration for the seed service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    // === DNS ===

    /// Apex domain all discovery queries are issued under
    pub apex_domain: String,

    /// Service label prepended to the apex for SRV answers
    pub service_label: String,

    /// Address the DNS and HTTP listeners bind to
    pub listen_addr: IpAddr,

    /// UDP port for DNS
    pub dns_port: u16,

    /// Largest reply sent to clients advertising EDNS
    pub max_udp_payload: u16,

    pub sampling: SamplingPolicy,

    // === Directory ===

    /// JSON file listing known peers
    pub peers_file: Option<PathBuf>,

    /// Interval between peers file reloads (seconds)
    pub reload_interval_secs: u64,

    /// Drop peers not seen for this long (seconds, 0 disables)
    pub peer_timeout_secs: u64,

    // === HTTP API ===

    pub api_enabled: bool,

    /// Port for the HTTP API
    pub api_port: u16,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            apex_domain: "lseed.bitcoinstats.com".to_string(),
            service_label: "_lightning._tcp".to_string(),
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dns_port: 8053,
            max_udp_payload: 1232,
            sampling: SamplingPolicy::default(),

            peers_file: None,
            reload_interval_secs: 30,
            peer_timeout_secs: 0,

            api_enabled: true,
            api_port: 8080,
        }
    }
}

impl SeedConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    // Builder-style methods for CLI overrides

    pub fn with_dns_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.dns_port = port;
        }
        self
    }

    pub fn with_api_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.api_port = port;
        }
        self
    }

    pub fn with_apex_domain(mut self, apex: Option<String>) -> Self {
        if let Some(apex) = apex {
            self.apex_domain = apex;
        }
        self
    }

    pub fn with_peers_file(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.peers_file = path;
        }
        self
    }

    pub fn dns_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.dns_port)
    }

    pub fn api_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.api_port)
    }

    /// Apex domain without the trailing dot, lowercased
    pub fn apex(&self) -> String {
        self.apex_domain.trim_end_matches('.').to_ascii_lowercase()
    }

    /// Fully qualified owner name for SRV answers
    pub fn service_name(&self) -> anyhow::Result<Name> {
        let name = format!("{}.{}.", self.service_label.trim_end_matches('.'), self.apex());
        Ok(Name::from_ascii(&name)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.apex().is_empty() {
            anyhow::bail!("apex_domain must not be empty");
        }

        Name::from_ascii(&self.apex())
            .map_err(|e| anyhow::anyhow!("apex_domain ({}) is not a valid name: {}", self.apex_domain, e))?;

        self.service_name()
            .map_err(|e| anyhow::anyhow!("service_label ({}) is not a valid name: {}", self.service_label, e))?;

        let sampling = &self.sampling;
        if sampling.aaaa_count == 0 || sampling.a_count == 0 || sampling.srv_count == 0 {
            anyhow::bail!("sampling counts must be greater than zero");
        }

        if sampling.srv_count > 255 {
            anyhow::bail!("sampling.srv_count ({}) must not exceed 255", sampling.srv_count);
        }

        if sampling.pool_size == 0 {
            anyhow::bail!("sampling.pool_size must be greater than zero");
        }

        if self.max_udp_payload < MIN_UDP_PAYLOAD {
            anyhow::bail!(
                "max_udp_payload ({}) must be at least {}",
                self.max_udp_payload,
                MIN_UDP_PAYLOAD
            );
        }

        if self.reload_interval_secs == 0 {
            anyhow::bail!("reload_interval_secs must be greater than zero");
        }

        Ok(())
    }
}
