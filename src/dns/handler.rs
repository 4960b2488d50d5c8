//! DNS Request Handler
//!
//! Turns one parsed DNS query into one reply. The handler is synchronous and
//! holds only shared read-only state, so any number of queries can run
//! through it concurrently.
//!
//! ## Names
//!
//! - `<apex>`: A / AAAA / SRV answered from a random sample of peers
//! - `<label1>.<label2>.<apex>`: address of one peer (see [`codec`])
//! - unknown peer: empty NOERROR reply
//! - anything else under the apex: NXDOMAIN
//! - names outside the apex: REFUSED

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::Metrics;
use crate::config::{SamplingPolicy, SeedConfig};
use crate::directory::PeerDirectory;
use crate::dns::codec::{self, DecodeError};
use crate::dns::records::{address_record, RecordBuilder};
use crate::types::{AddressFamily, NodeId};

/// Where a query name points
#[derive(Debug, PartialEq, Eq)]
enum QueryTarget {
    Apex,
    Peer(NodeId),
    Malformed(DecodeError),
    OutsideZone,
}

/// DNS handler for peer discovery
pub struct SeedDnsHandler {
    /// Peer directory
    directory: Arc<dyn PeerDirectory>,

    /// Builds SRV records under the service name
    records: RecordBuilder,

    /// Apex domain, lowercase without trailing dot
    apex: String,

    sampling: SamplingPolicy,

    metrics: Arc<Metrics>,
}

impl SeedDnsHandler {
    /// Create a new DNS handler
    pub fn new(
        directory: Arc<dyn PeerDirectory>,
        config: &SeedConfig,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            directory,
            records: RecordBuilder::new(config.service_name()?),
            apex: config.apex(),
            sampling: config.sampling.clone(),
            metrics,
        })
    }

    /// Get domain name
    pub fn apex(&self) -> &str {
        &self.apex
    }

    /// Build the reply for a request
    pub fn handle(&self, request: &Message) -> Message {
        self.metrics.inc_dns_queries();
        let mut response = reply_to(request);

        if request.op_code() != OpCode::Query {
            debug!("Unsupported opcode {:?}", request.op_code());
            response.set_response_code(ResponseCode::NotImp);
            return response;
        }

        let Some(query) = request.queries().first() else {
            debug!("Request carries no question");
            response.set_response_code(ResponseCode::FormErr);
            return response;
        };

        let name = query.name();
        let qtype = query.query_type();
        debug!(name = %name, qtype = %qtype, "Incoming request");

        match self.classify(name) {
            QueryTarget::Apex => {
                self.metrics.inc_apex_queries();
                self.answer_apex(&mut response, name, qtype);
            }
            QueryTarget::Peer(id) => {
                self.metrics.inc_peer_queries();
                self.answer_peer(&mut response, name, qtype, &id);
            }
            QueryTarget::Malformed(e) => {
                debug!("Subdomain does not appear to be a valid node id: {}", e);
                self.metrics.inc_malformed();
                response.set_response_code(ResponseCode::NXDomain);
            }
            QueryTarget::OutsideZone => {
                debug!("Refusing query outside {}", self.apex);
                self.metrics.inc_refused();
                response.set_response_code(ResponseCode::Refused);
            }
        }

        response
    }

    fn classify(&self, name: &Name) -> QueryTarget {
        let ascii = name.to_ascii();
        if codec::normalize(&ascii).eq_ignore_ascii_case(&self.apex) {
            return QueryTarget::Apex;
        }

        match codec::decode(&ascii, &self.apex) {
            Ok(id) => QueryTarget::Peer(id),
            Err(DecodeError::OutsideZone) => QueryTarget::OutsideZone,
            Err(e) => QueryTarget::Malformed(e),
        }
    }

    fn answer_apex(&self, response: &mut Message, name: &Name, qtype: RecordType) {
        match qtype {
            RecordType::AAAA => {
                self.answer_addresses(response, name, self.sampling.aaaa_count, AddressFamily::Ipv6)
            }
            RecordType::A => {
                self.answer_addresses(response, name, self.sampling.a_count, AddressFamily::Ipv4)
            }
            RecordType::SRV => self.answer_services(response),
            _ => debug!("No records of type {} at the apex", qtype),
        }
    }

    fn answer_addresses(
        &self,
        response: &mut Message,
        name: &Name,
        count: usize,
        family: AddressFamily,
    ) {
        let peers = self
            .directory
            .random_sample(count, self.sampling.pool_size, Some(family));

        for peer in peers {
            response.add_answer(address_record(&peer, name));
        }
    }

    /// SRV answers carry the per-peer name as target; the matching address
    /// record rides along in Additional so clients need no second lookup.
    fn answer_services(&self, response: &mut Message) {
        let peers = self
            .directory
            .random_sample(self.sampling.srv_count, self.sampling.pool_size, None);

        for peer in peers {
            let target = match Name::from_ascii(codec::peer_domain(&peer.id, &self.apex)) {
                Ok(target) => target,
                Err(e) => {
                    warn!("Cannot build target name for node {}: {}", peer.id.short(), e);
                    continue;
                }
            };

            response.add_answer(self.records.service_record(&peer, &target));
            response.add_additional(address_record(&peer, &target));
        }
    }

    fn answer_peer(&self, response: &mut Message, name: &Name, qtype: RecordType, id: &NodeId) {
        let Some(peer) = self.directory.lookup(id) else {
            debug!("Unable to find node with ID {}", id);
            self.metrics.inc_lookup_misses();
            return;
        };

        debug!("Found node matching ID {} at {}", id.short(), peer.address);

        let requested = match qtype {
            RecordType::A => AddressFamily::Ipv4,
            RecordType::AAAA => AddressFamily::Ipv6,
            _ => return,
        };

        // Never claim an answer of a type the peer does not have, but still
        // hand out the address it does have.
        let record = address_record(&peer, name);
        if peer.family() == requested {
            response.add_answer(record);
        } else {
            response.add_additional(record);
        }
    }
}

/// Empty response echoing the request's id, opcode, RD flag and question
fn reply_to(request: &Message) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired());

    if let Some(query) = request.queries().first() {
        response.add_query(query.clone());
    }

    response
}
