//! Resource record construction
//!
//! Every record the seed emits is class IN with a one minute TTL, short
//! enough that clients come back for a fresh sample regularly.

use hickory_proto::rr::rdata::{A, AAAA, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use std::net::IpAddr;

use crate::types::Peer;

/// TTL for all records (seconds)
pub const RECORD_TTL: u32 = 60;

/// SRV priority advertised for every peer
pub const SRV_PRIORITY: u16 = 10;

/// SRV weight advertised for every peer
pub const SRV_WEIGHT: u16 = 10;

/// A or AAAA record for the peer's address, depending on its length
pub fn address_record(peer: &Peer, owner: &Name) -> Record {
    let rdata = match peer.address {
        IpAddr::V4(v4) => RData::A(A(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
    };

    let mut record = Record::from_rdata(owner.clone(), RECORD_TTL, rdata);
    record.set_dns_class(DNSClass::IN);
    record
}

/// Builds records that depend on the seed's own names
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    /// Owner name of SRV answers, e.g. `_lightning._tcp.<apex>.`
    service_name: Name,
}

impl RecordBuilder {
    pub fn new(service_name: Name) -> Self {
        Self { service_name }
    }

    /// SRV record pointing at the peer's per-peer domain name
    pub fn service_record(&self, peer: &Peer, target: &Name) -> Record {
        let srv = SRV::new(SRV_PRIORITY, SRV_WEIGHT, peer.port, target.clone());

        let mut record = Record::from_rdata(self.service_name.clone(), RECORD_TTL, RData::SRV(srv));
        record.set_dns_class(DNSClass::IN);
        record
    }
}
