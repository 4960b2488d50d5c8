//! lseed - Lightning Network DNS Seed
//!
//! Answers DNS queries for a well-known apex domain with a small random
//! sample of known Lightning nodes, so new nodes can bootstrap their first
//! connections without a hardcoded peer list.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          LSEED                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  DNS Server (8053/udp)  ←── A / AAAA / SRV discovery        │
//! │  Network View           ←── Snapshot of known peers         │
//! │  Peers File Reloader    ←── Refreshes the snapshot          │
//! │  HTTP API (8080)        ←── Health, peers and metrics       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

mod api;
mod config;
mod directory;
mod dns;
mod types;

use api::Metrics;
use config::SeedConfig;
use directory::{peers_file, NetworkView};
use dns::SeedDnsHandler;

/// lseed - DNS seed for Lightning Network peer discovery
#[derive(Parser, Debug)]
#[command(name = "lseed")]
#[command(version)]
#[command(about = "DNS seed for Lightning Network peer discovery", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lseed.toml")]
    config: PathBuf,

    /// JSON file listing known peers
    #[arg(short, long)]
    peers_file: Option<PathBuf>,

    /// Apex domain to answer for
    #[arg(long)]
    apex_domain: Option<String>,

    /// DNS server port
    #[arg(long)]
    dns_port: Option<u16>,

    /// HTTP API port
    #[arg(long)]
    api_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Validate the configuration and peers file, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into())
        )
        .init();

    info!("🌐 lseed v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        SeedConfig::load(&args.config)
            .with_context(|| format!("failed to load config {:?}", args.config))?
    } else {
        warn!("Config file not found, using defaults");
        SeedConfig::default()
    };

    // Override config with CLI args
    let config = config
        .with_dns_port(args.dns_port)
        .with_api_port(args.api_port)
        .with_apex_domain(args.apex_domain)
        .with_peers_file(args.peers_file);

    config.validate()?;

    info!("⚙️  Configuration:");
    info!("   Apex domain: {}", config.apex());
    info!("   DNS: {}", config.dns_addr());
    info!("   Sampling: {:?}", config.sampling);
    match &config.peers_file {
        Some(path) => info!("   Peers file: {:?} (reload every {}s)", path, config.reload_interval_secs),
        None => warn!("   No peers file configured, the seed will answer with empty replies"),
    }

    // Initial directory load; a broken peers file at startup is fatal
    let peers = match &config.peers_file {
        Some(path) => {
            let peers = peers_file::load(path, unix_now(), config.peer_timeout_secs)?;
            info!("📦 Loaded {} peers from {:?}", peers.len(), path);
            peers
        }
        None => Vec::new(),
    };
    let directory = Arc::new(NetworkView::from_peers(peers));

    if args.check {
        let stats = directory.stats();
        info!(
            "✅ Configuration valid: {} peers ({} IPv4, {} IPv6)",
            stats.total_peers, stats.ipv4_peers, stats.ipv6_peers
        );
        return Ok(());
    }

    let shared_config = Arc::new(config);
    let metrics = Arc::new(Metrics::new());
    metrics.set_directory_stats(&directory.stats());

    let handler = Arc::new(SeedDnsHandler::new(
        directory.clone(),
        &shared_config,
        metrics.clone(),
    )?);

    // Start all services concurrently
    let dns_handle = tokio::spawn(dns::run_dns_server(
        shared_config.clone(),
        handler,
        metrics.clone(),
    ));

    let reload_handle = tokio::spawn(run_reloader(
        shared_config.clone(),
        directory.clone(),
        metrics.clone(),
    ));

    let api_handle = tokio::spawn(run_api(
        shared_config.clone(),
        directory.clone(),
        metrics.clone(),
    ));

    info!("✅ All services started");
    info!("   Press Ctrl+C to shutdown gracefully");

    // Wait for shutdown signal; any service exiting takes the seed down
    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
            Ok(())
        }
        result = dns_handle => service_exit("DNS server", result),
        result = reload_handle => service_exit("Peers file reloader", result),
        result = api_handle => service_exit("HTTP API", result),
    };

    info!("👋 lseed shutting down");
    outcome
}

/// Turn an exited service task into the process result
fn service_exit(
    name: &str,
    result: Result<anyhow::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    let err = match result {
        Ok(Ok(())) => anyhow::anyhow!("{} stopped unexpectedly", name),
        Ok(Err(e)) => e.context(format!("{} failed", name)),
        Err(e) => anyhow::Error::new(e).context(format!("{} panicked", name)),
    };
    error!("{:#}", err);
    Err(err)
}

async fn run_api(
    config: Arc<SeedConfig>,
    directory: Arc<NetworkView>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    if !config.api_enabled {
        info!("HTTP API disabled");
        return std::future::pending().await;
    }

    api::run_api_server(config, directory, metrics).await
}

/// Periodically reload the peers file into the directory
async fn run_reloader(
    config: Arc<SeedConfig>,
    directory: Arc<NetworkView>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let Some(path) = config.peers_file.clone() else {
        return std::future::pending().await;
    };

    let mut interval = tokio::time::interval(
        std::time::Duration::from_secs(config.reload_interval_secs)
    );
    // The first tick fires immediately and startup already loaded the file
    interval.tick().await;

    loop {
        interval.tick().await;
        reload(&path, &config, &directory, &metrics);
    }
}

fn reload(path: &Path, config: &SeedConfig, directory: &NetworkView, metrics: &Metrics) {
    match peers_file::load(path, unix_now(), config.peer_timeout_secs) {
        Ok(peers) => {
            let before = directory.len();
            let after = directory.replace(peers);
            metrics.inc_directory_reloads();
            metrics.set_directory_stats(&directory.stats());

            if before != after {
                info!("📦 Directory reloaded: {} -> {} peers", before, after);
            }
        }
        Err(e) => {
            warn!("Peers file reload failed, keeping {} peers: {}", directory.len(), e);
        }
    }
}

/// Get current Unix timestamp
fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::{ipv4_peer, node_id};
    use std::io::Write;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "lseed",
            "--peers-file",
            "/tmp/peers.json",
            "--dns-port",
            "5353",
        ]);

        assert_eq!(args.peers_file, Some(PathBuf::from("/tmp/peers.json")));
        assert_eq!(args.dns_port, Some(5353));
        assert_eq!(args.api_port, None);
        assert!(!args.check);
    }

    #[test]
    fn test_reload_replaces_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "{}", "address": "192.0.2.9", "port": 9735, "type": 0}}]"#,
            node_id(9)
        )
        .unwrap();

        let config = SeedConfig::default();
        let directory = NetworkView::from_peers(vec![ipv4_peer(1), ipv4_peer(2)]);
        let metrics = Metrics::new();

        reload(file.path(), &config, &directory, &metrics);

        assert_eq!(directory.len(), 1);
        assert_eq!(metrics.known_peers.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = SeedConfig::default();
        let directory = NetworkView::from_peers(vec![ipv4_peer(1), ipv4_peer(2)]);
        let metrics = Metrics::new();

        reload(&dir.path().join("missing.json"), &config, &directory, &metrics);

        assert_eq!(directory.len(), 2);
        assert_eq!(metrics.directory_reloads.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
