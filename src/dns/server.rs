//! UDP DNS Server
//!
//! Receives datagrams, decodes them with hickory-proto, runs each query
//! through the handler on its own task and sends back the encoded reply.

use anyhow::Context;
use hickory_proto::error::ProtoError;
use hickory_proto::op::{Edns, Message, MessageType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use crate::api::Metrics;
use crate::config::{SeedConfig, MIN_UDP_PAYLOAD};
use crate::dns::SeedDnsHandler;

/// Receive buffer size, large enough for any EDNS query
const MAX_DATAGRAM_SIZE: usize = 4096;

/// Pause after a failed receive so a broken socket does not spin the loop
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Bind the configured address and serve until the socket fails
pub async fn run_dns_server(
    config: Arc<SeedConfig>,
    handler: Arc<SeedDnsHandler>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let addr = config.dns_addr();
    let socket = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("failed to bind DNS socket on {}", addr))?;

    info!("🌐 DNS server listening on {} for {}", addr, handler.apex());

    serve(Arc::new(socket), handler, metrics, config.max_udp_payload).await
}

/// Answer queries arriving on an already bound socket
pub async fn serve(
    socket: Arc<UdpSocket>,
    handler: Arc<SeedDnsHandler>,
    metrics: Arc<Metrics>,
    max_payload: u16,
) -> anyhow::Result<()> {
    loop {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        match socket.recv_from(&mut buf).await {
            Ok((len, src)) => {
                buf.truncate(len);
                let socket = socket.clone();
                let handler = handler.clone();
                let metrics = metrics.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_dns_query(
                        socket.as_ref(),
                        src,
                        &buf,
                        &handler,
                        &metrics,
                        max_payload,
                    ).await {
                        debug!("DNS query error from {}: {}", src, e);
                    }
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
            Err(e) => {
                error!("DNS socket error: {}", e);
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
            }
        }
    }
}

/// Handle a single DNS datagram
async fn handle_dns_query(
    socket: &UdpSocket,
    src: SocketAddr,
    request: &[u8],
    handler: &SeedDnsHandler,
    metrics: &Metrics,
    max_payload: u16,
) -> anyhow::Result<()> {
    let request = match Message::from_vec(request) {
        Ok(message) => message,
        Err(e) => {
            metrics.inc_dropped_packets();
            debug!("Dropping undecodable datagram from {}: {}", src, e);
            return Ok(());
        }
    };

    if request.message_type() != MessageType::Query {
        metrics.inc_dropped_packets();
        return Ok(());
    }

    let mut response = handler.handle(&request);

    if request.extensions().is_some() {
        let mut edns = Edns::new();
        edns.set_max_payload(max_payload);
        response.set_edns(edns);
    }

    let limit = payload_limit(&request, max_payload);
    let records = response.answers().len() + response.additionals().len();
    let (bytes, dropped) = encode_within(response, limit)?;
    if dropped > 0 {
        metrics.inc_trimmed_replies();
        debug!("Reply to {} trimmed to {} bytes ({} records cut)", src, bytes.len(), dropped);
    }
    metrics.add_records_served((records - dropped) as u64);

    socket.send_to(&bytes, src).await?;

    Ok(())
}

/// Largest reply the client accepts
fn payload_limit(request: &Message, max_payload: u16) -> usize {
    match request.extensions() {
        Some(edns) => edns
            .max_payload()
            .clamp(MIN_UDP_PAYLOAD, max_payload.max(MIN_UDP_PAYLOAD)) as usize,
        None => MIN_UDP_PAYLOAD as usize,
    }
}

/// Encode the reply, dropping trailing records until it fits `limit`
///
/// Answer and Additional records are dropped pairwise so every remaining
/// SRV answer keeps its address record. Returns the number of records cut.
fn encode_within(mut response: Message, limit: usize) -> Result<(Vec<u8>, usize), ProtoError> {
    let bytes = response.to_vec()?;
    if bytes.len() <= limit {
        return Ok((bytes, 0));
    }

    let mut answers = response.take_answers();
    let mut additionals = response.take_additionals();
    let mut dropped = 0;

    loop {
        dropped += answers.pop().is_some() as usize;
        dropped += additionals.pop().is_some() as usize;

        let mut candidate = response.clone();
        candidate.insert_answers(answers.clone());
        candidate.insert_additionals(additionals.clone());

        let bytes = candidate.to_vec()?;
        if bytes.len() <= limit || (answers.is_empty() && additionals.is_empty()) {
            return Ok((bytes, dropped));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::handler::tests::{handler_with, request, APEX};
    use crate::types::test_support::{ipv4_peer, ipv6_peer};
    use hickory_proto::rr::RecordType;

    fn many_peers(n: u8) -> Vec<crate::types::Peer> {
        (0..n)
            .map(|i| if i % 2 == 0 { ipv4_peer(i) } else { ipv6_peer(i) })
            .collect()
    }

    #[test]
    fn test_payload_limit() {
        let plain = request(APEX, RecordType::A);
        assert_eq!(payload_limit(&plain, 1232), 512);

        let mut with_edns = request(APEX, RecordType::A);
        let mut edns = Edns::new();
        edns.set_max_payload(4096);
        with_edns.set_edns(edns);
        assert_eq!(payload_limit(&with_edns, 1232), 1232);

        let mut small_edns = request(APEX, RecordType::A);
        let mut edns = Edns::new();
        edns.set_max_payload(100);
        small_edns.set_edns(edns);
        assert_eq!(payload_limit(&small_edns, 1232), 512);
    }

    #[test]
    fn test_small_reply_untouched() {
        let handler = handler_with(many_peers(10));
        let response = handler.handle(&request(APEX, RecordType::A));

        let (bytes, dropped) = encode_within(response, 512).unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(Message::from_vec(&bytes).unwrap().answers().len(), 2);
    }

    #[test]
    fn test_large_srv_reply_trimmed_pairwise() {
        let handler = handler_with(many_peers(40));
        let response = handler.handle(&request(APEX, RecordType::SRV));
        assert_eq!(response.answers().len(), 25);

        let (bytes, dropped) = encode_within(response, 512).unwrap();
        assert!(bytes.len() <= 512);

        let decoded = Message::from_vec(&bytes).unwrap();
        assert!(!decoded.answers().is_empty());
        assert_eq!(decoded.answers().len(), decoded.additionals().len());
        assert_eq!(decoded.answers().len() + decoded.additionals().len() + dropped, 50);
    }

    async fn spawn_server(handler: SeedDnsHandler) -> (SocketAddr, Arc<Metrics>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let metrics = Arc::new(Metrics::new());

        tokio::spawn(serve(Arc::new(socket), Arc::new(handler), metrics.clone(), 1232));
        (addr, metrics)
    }

    async fn exchange(client: &UdpSocket, server: SocketAddr, message: &Message) -> Message {
        client.send_to(&message.to_vec().unwrap(), server).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("no reply from server")
            .unwrap();
        Message::from_vec(&buf[..len]).unwrap()
    }

    #[tokio::test]
    async fn test_udp_exchange() {
        let (server, _metrics) = spawn_server(handler_with(many_peers(10))).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = exchange(&client, server, &request(APEX, RecordType::AAAA)).await;
        assert_eq!(reply.id(), 0xbeef);
        assert_eq!(reply.message_type(), MessageType::Response);
        assert_eq!(reply.answers().len(), 3);
        assert!(reply
            .answers()
            .iter()
            .all(|r| r.record_type() == RecordType::AAAA && r.ttl() == 60));
    }

    #[tokio::test]
    async fn test_garbage_does_not_stop_server() {
        let (server, metrics) = spawn_server(handler_with(many_peers(4))).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client.send_to(&[0xde, 0xad, 0xbe], server).await.unwrap();

        let reply = exchange(&client, server, &request(APEX, RecordType::A)).await;
        assert_eq!(reply.answers().len(), 2);

        // The garbage datagram is handled on its own task
        for _ in 0..50 {
            if metrics.dropped_packets.load(std::sync::atomic::Ordering::Relaxed) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("garbage datagram was not counted");
    }

    #[tokio::test]
    async fn test_edns_reply_echoes_opt() {
        let (server, _metrics) = spawn_server(handler_with(many_peers(40))).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut message = request(APEX, RecordType::SRV);
        let mut edns = Edns::new();
        edns.set_max_payload(4096);
        message.set_edns(edns);

        let reply = exchange(&client, server, &message).await;
        assert_eq!(reply.extensions().as_ref().map(|e| e.max_payload()), Some(1232));
        assert!(!reply.answers().is_empty());
        assert_eq!(reply.answers().len(), reply.additionals().len());
    }

    #[tokio::test]
    async fn test_records_served_counts_trimmed_reply() {
        let (server, metrics) = spawn_server(handler_with(many_peers(40))).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let reply = exchange(&client, server, &request(APEX, RecordType::SRV)).await;
        let sent = (reply.answers().len() + reply.additionals().len()) as u64;
        assert!(sent < 50);

        // The counter is bumped right before send_to, so it is visible by now
        assert_eq!(metrics.records_served.load(std::sync::atomic::Ordering::Relaxed), sent);
        assert_eq!(metrics.trimmed_replies.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
