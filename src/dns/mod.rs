//! DNS Server Module
//!
//! Answers DNS queries with peer records drawn from the directory.
//!
//! ## DNS Records
//!
//! - A records: IPv4 addresses of sampled peers (apex) or of one peer
//! - AAAA records: IPv6 addresses, likewise
//! - SRV records: one per sampled peer, target is the per-peer name, with the
//!   address record in the Additional section

pub mod codec;
mod handler;
pub mod records;
mod server;

pub use handler::SeedDnsHandler;
pub use server::run_dns_server;
