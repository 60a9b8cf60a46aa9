//! Integration tests for the DHT indexing node.
//!
//! Each test runs a real indexing node on an ephemeral loopback UDP socket
//! and talks KRPC to it from a plain socket playing the remote DHT node.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use torrust_dht_crawler::core::policy::AddressPolicy;
use torrust_dht_crawler::core::statistics::Metrics;
use torrust_dht_crawler::core::Observation;
use torrust_dht_crawler::servers::dht::compact::NodeEntry;
use torrust_dht_crawler::servers::dht::messages::{Message, MessageBody, Query, Response, TransactionId};
use torrust_dht_crawler::servers::dht::server::{IndexingNode, NodeSettings, RunningIndexingNode};
use torrust_dht_crawler::servers::dht::MAX_PACKET_SIZE;
use torrust_dht_crawler_primitives::info_hash::InfoHash;
use torrust_dht_crawler_primitives::node_id::NodeId;
use torrust_dht_crawler_primitives::IpFamily;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_node(
    denylist: &[&str],
    bootstrap_nodes: Vec<String>,
) -> (RunningIndexingNode, mpsc::Receiver<Observation>, Arc<Metrics>) {
    let denylist: Vec<String> = denylist.iter().map(ToString::to_string).collect();
    let policy = Arc::new(AddressPolicy::new(IpFamily::Both, &denylist).expect("denylist should parse"));
    let stats = Arc::new(Metrics::default());

    let (observations_tx, observations_rx) = mpsc::channel(16);

    let node = IndexingNode::new(
        "127.0.0.1:0".parse().unwrap(),
        NodeSettings {
            max_neighbours: 10,
            bootstrap_nodes,
        },
    )
    .start(policy, stats.clone(), observations_tx)
    .await
    .expect("the indexing node should start");

    (node, observations_rx, stats)
}

async fn recv_message(client: &UdpSocket) -> (Message, SocketAddr) {
    let mut buffer = [0u8; MAX_PACKET_SIZE];

    let (len, from) = tokio::time::timeout(RECV_TIMEOUT, client.recv_from(&mut buffer))
        .await
        .expect("expected a datagram before the timeout")
        .expect("the socket read should succeed");

    (Message::decode(&buffer[..len]).expect("the node should send well-formed KRPC"), from)
}

fn announce(info_hash: InfoHash, port: u16, implied_port: bool) -> Message {
    Message::query(
        TransactionId(b"aa".to_vec()),
        Query::AnnouncePeer {
            id: NodeId([0x42; 20]),
            info_hash,
            port,
            implied_port,
            token: b"x".to_vec(),
        },
    )
}

#[tokio::test]
async fn an_announce_is_harvested_with_its_explicit_port() {
    let (node, mut observations, _stats) = start_node(&[], Vec::new()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let info_hash = InfoHash([0xBB; 20]);
    client
        .send_to(&announce(info_hash, 6881, false).encode(), node.local_addr())
        .await
        .unwrap();

    let observation = tokio::time::timeout(RECV_TIMEOUT, observations.recv())
        .await
        .expect("expected an observation before the timeout")
        .unwrap();

    assert_eq!(observation.info_hash, info_hash);
    assert_eq!(
        observation.peer(),
        Some(SocketAddr::new(client.local_addr().unwrap().ip(), 6881))
    );

    node.stop().await.unwrap();
}

#[tokio::test]
async fn an_implied_port_announce_is_harvested_with_the_udp_source_port() {
    let (node, mut observations, _stats) = start_node(&[], Vec::new()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client
        .send_to(&announce(InfoHash([0xBB; 20]), 6881, true).encode(), node.local_addr())
        .await
        .unwrap();

    let observation = tokio::time::timeout(RECV_TIMEOUT, observations.recv())
        .await
        .expect("expected an observation before the timeout")
        .unwrap();

    assert_eq!(observation.peer(), Some(client.local_addr().unwrap()));

    node.stop().await.unwrap();
}

#[tokio::test]
async fn an_announce_is_acknowledged_with_a_forged_neighbour_id() {
    let (node, _observations, _stats) = start_node(&[], Vec::new()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client
        .send_to(&announce(InfoHash([0xBB; 20]), 6881, false).encode(), node.local_addr())
        .await
        .unwrap();

    let (reply, _) = recv_message(&client).await;

    assert_eq!(reply.transaction_id, TransactionId(b"aa".to_vec()));
    match reply.body {
        MessageBody::Response(response) => {
            // The announcer's id was 0x42 * 20; the ack must come from a
            // forged close neighbour of it.
            assert_eq!(response.id.bytes()[..15], [0x42; 15]);
        }
        other => panic!("expected a response, got {other:?}"),
    }

    node.stop().await.unwrap();
}

#[tokio::test]
async fn a_get_peers_earns_a_token_and_is_recorded_without_a_port() {
    let (node, mut observations, _stats) = start_node(&[], Vec::new()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let query = Message::query(
        TransactionId(b"gp".to_vec()),
        Query::GetPeers {
            id: NodeId([0x42; 20]),
            info_hash: InfoHash([0xCC; 20]),
        },
    );
    client.send_to(&query.encode(), node.local_addr()).await.unwrap();

    let observation = tokio::time::timeout(RECV_TIMEOUT, observations.recv())
        .await
        .expect("expected an observation before the timeout")
        .unwrap();
    assert_eq!(observation.info_hash, InfoHash([0xCC; 20]));
    assert_eq!(observation.announced_port, None);

    let (reply, _) = recv_message(&client).await;
    match reply.body {
        MessageBody::Response(response) => {
            assert!(!response.token.expect("a get_peers reply should carry a token").is_empty());
        }
        other => panic!("expected a response, got {other:?}"),
    }

    node.stop().await.unwrap();
}

#[tokio::test]
async fn outgoing_find_nodes_forge_a_neighbour_id_of_the_queried_node() {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client_addr = client.local_addr().unwrap();

    // The client plays the only bootstrap node of the indexing node.
    let (node, _observations, _stats) = start_node(&[], vec![client_addr.to_string()]).await;

    // The bootstrap burst: a find_node with a sender forged from a
    // placeholder id, since our real id is still unknown.
    let (query, node_addr) = recv_message(&client).await;
    let MessageBody::Query(Query::FindNode { .. }) = &query.body else {
        panic!("expected a find_node query, got {:?}", query.body);
    };

    // Answer with ourselves in the nodes payload, under a chosen id. The
    // node should harvest it and forge future senders from it.
    let mock_id = NodeId([
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x14,
    ]);
    let reply = Message::response(
        query.transaction_id,
        Response {
            id: mock_id,
            nodes: Some(vec![NodeEntry {
                id: mock_id,
                addr: client_addr,
            }]),
            ..Default::default()
        },
    );
    client.send_to(&reply.encode(), node_addr).await.unwrap();

    // One of the next storm bursts must address us with a forged neighbour
    // id sharing our first 15 bytes.
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        assert!(tokio::time::Instant::now() < deadline, "no forged find_node arrived in time");

        let (query, _) = recv_message(&client).await;
        if let MessageBody::Query(Query::FindNode { id, .. }) = query.body {
            if id.bytes()[..15] == mock_id.bytes()[..15] {
                break;
            }
        }
    }

    node.stop().await.unwrap();
}

#[tokio::test]
async fn an_announce_from_a_denylisted_source_is_dropped() {
    // Everything on loopback is denylisted, including our client.
    let (node, mut observations, stats) = start_node(&["127.0.0.0/8"], Vec::new()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client
        .send_to(&announce(InfoHash([0xDD; 20]), 6881, false).encode(), node.local_addr())
        .await
        .unwrap();

    let observation = tokio::time::timeout(Duration::from_millis(400), observations.recv()).await;
    assert!(observation.is_err(), "a denylisted announce must not become an observation");
    assert!(stats.snapshot().policy_drops >= 1);

    node.stop().await.unwrap();
}

#[tokio::test]
async fn a_malformed_datagram_is_counted_and_ignored() {
    let (node, mut observations, stats) = start_node(&[], Vec::new()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.send_to(b"definitely not bencode", node.local_addr()).await.unwrap();

    let observation = tokio::time::timeout(Duration::from_millis(400), observations.recv()).await;
    assert!(observation.is_err());
    assert_eq!(stats.snapshot().malformed_packets, 1);

    node.stop().await.unwrap();
}
