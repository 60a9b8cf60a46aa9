//! Handlers for inbound KRPC traffic.
//!
//! The handlers are pure: they take a decoded message and return what the
//! indexing node should do about it. Network I/O stays in
//! [`server`](crate::servers::dht::server).
//!
//! The crawler never answers with a stable identity. Every reply carries a
//! sender id forged from the querying node's own id
//! ([`NodeId::neighbour_of`]), which keeps the crawler inside everyone's
//! close-neighbour set and keeps the `get_peers`/`announce_peer` traffic
//! coming.
use std::net::SocketAddr;

use rand::Rng;
use torrust_dht_crawler_primitives::node_id::NodeId;

use crate::core::Observation;
use crate::servers::dht::compact::NodeEntry;
use crate::servers::dht::messages::{Message, MessageBody, Query, Response, TransactionId};
use crate::servers::dht::transactions::PendingQueries;
use crate::servers::dht::TOKEN_LENGTH;

/// What an inbound message amounts to.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Handled {
    /// The reply to send back, if the message was a query worth answering.
    pub reply: Option<Message>,
    /// The infohash sighting to report to the manager.
    pub observation: Option<Observation>,
    /// Nodes harvested from a reply, destined for the neighbour pool.
    pub harvested: Vec<NodeEntry>,
}

/// Dispatches one decoded message.
pub fn handle_message(message: Message, from: SocketAddr, pending: &mut PendingQueries) -> Handled {
    match message.body {
        MessageBody::Query(query) => handle_query(&message.transaction_id, &query, from),
        MessageBody::Response(response) => handle_response(&message.transaction_id, response, pending),
        MessageBody::Error { .. } => {
            // An error reply settles its transaction; nothing else to do.
            drop(pending.claim(&message.transaction_id));
            Handled::default()
        }
    }
}

fn handle_query(transaction_id: &TransactionId, query: &Query, from: SocketAddr) -> Handled {
    let forged_id = NodeId::neighbour_of(&query.sender_id());

    match query {
        Query::Ping { .. } => Handled {
            reply: Some(Message::response(
                transaction_id.clone(),
                Response {
                    id: forged_id,
                    ..Default::default()
                },
            )),
            ..Default::default()
        },

        // Serving lookups is not the goal; an empty nodes list is a legal
        // reply and costs nothing.
        Query::FindNode { .. } => Handled {
            reply: Some(Message::response(
                transaction_id.clone(),
                Response {
                    id: forged_id,
                    nodes: Some(Vec::new()),
                    ..Default::default()
                },
            )),
            ..Default::default()
        },

        Query::GetPeers { info_hash, .. } => Handled {
            reply: Some(Message::response(
                transaction_id.clone(),
                Response {
                    id: forged_id,
                    nodes: Some(Vec::new()),
                    values: Some(Vec::new()),
                    token: Some(random_token()),
                    ..Default::default()
                },
            )),
            observation: Some(Observation {
                info_hash: *info_hash,
                source: from,
                announced_port: None,
            }),
            ..Default::default()
        },

        Query::AnnouncePeer {
            info_hash,
            port,
            implied_port,
            token,
            ..
        } => {
            // Any non-empty token passes. The token round-trip only exists
            // to prove the announcer owns its source address, and a crawler
            // that never issued tokens could not validate one anyway.
            if token.is_empty() {
                return Handled::default();
            }

            let announced_port = if *implied_port { from.port() } else { *port };

            Handled {
                reply: Some(Message::response(
                    transaction_id.clone(),
                    Response {
                        id: forged_id,
                        ..Default::default()
                    },
                )),
                observation: Some(Observation {
                    info_hash: *info_hash,
                    source: from,
                    announced_port: Some(announced_port),
                }),
                ..Default::default()
            }
        }
    }
}

fn handle_response(transaction_id: &TransactionId, response: Response, pending: &mut PendingQueries) -> Handled {
    // Replies without a matching outstanding query are unsolicited noise.
    if pending.claim(transaction_id).is_none() {
        return Handled::default();
    }

    let mut harvested = response.nodes.unwrap_or_default();
    harvested.extend(response.nodes6.unwrap_or_default());

    Handled {
        harvested,
        ..Default::default()
    }
}

fn random_token() -> Vec<u8> {
    let mut token = vec![0u8; TOKEN_LENGTH];
    rand::thread_rng().fill(token.as_mut_slice());
    token
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use torrust_dht_crawler_primitives::info_hash::InfoHash;
    use torrust_dht_crawler_primitives::node_id::NodeId;

    use super::handle_message;
    use crate::servers::dht::compact::NodeEntry;
    use crate::servers::dht::messages::{Message, MessageBody, Query, Response, TransactionId};
    use crate::servers::dht::transactions::PendingQueries;

    fn tid() -> TransactionId {
        TransactionId(b"aa".to_vec())
    }

    fn from() -> SocketAddr {
        "203.0.113.7:40000".parse().unwrap()
    }

    fn reply_sender_id(reply: &Message) -> NodeId {
        match &reply.body {
            MessageBody::Response(response) => response.id,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[test]
    fn a_ping_is_answered_with_a_forged_neighbour_id() {
        let mut pending = PendingQueries::new();
        let remote_id = NodeId([0x42; 20]);

        let handled = handle_message(Message::query(tid(), Query::Ping { id: remote_id }), from(), &mut pending);

        let reply = handled.reply.unwrap();
        assert_eq!(reply.transaction_id, tid());
        assert_eq!(reply_sender_id(&reply).bytes()[..15], remote_id.bytes()[..15]);
        assert!(handled.observation.is_none());
    }

    #[test]
    fn a_find_node_is_answered_with_an_empty_nodes_list() {
        let mut pending = PendingQueries::new();

        let handled = handle_message(
            Message::query(
                tid(),
                Query::FindNode {
                    id: NodeId([1; 20]),
                    target: NodeId([2; 20]),
                },
            ),
            from(),
            &mut pending,
        );

        match handled.reply.unwrap().body {
            MessageBody::Response(response) => assert_eq!(response.nodes, Some(Vec::new())),
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[test]
    fn a_get_peers_discloses_its_infohash_and_earns_a_token() {
        let mut pending = PendingQueries::new();
        let info_hash = InfoHash([0xBB; 20]);

        let handled = handle_message(
            Message::query(
                tid(),
                Query::GetPeers {
                    id: NodeId([1; 20]),
                    info_hash,
                },
            ),
            from(),
            &mut pending,
        );

        let observation = handled.observation.unwrap();
        assert_eq!(observation.info_hash, info_hash);
        assert_eq!(observation.source, from());
        assert_eq!(observation.announced_port, None);

        match handled.reply.unwrap().body {
            MessageBody::Response(response) => {
                assert!(!response.token.unwrap().is_empty());
                assert_eq!(response.values, Some(Vec::new()));
            }
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[test]
    fn an_announce_peer_discloses_the_announced_port() {
        let mut pending = PendingQueries::new();
        let info_hash = InfoHash([0xBB; 20]);

        let handled = handle_message(
            Message::query(
                tid(),
                Query::AnnouncePeer {
                    id: NodeId([1; 20]),
                    info_hash,
                    port: 6881,
                    implied_port: false,
                    token: b"x".to_vec(),
                },
            ),
            from(),
            &mut pending,
        );

        let observation = handled.observation.unwrap();
        assert_eq!(observation.peer(), Some("203.0.113.7:6881".parse().unwrap()));
        assert!(handled.reply.is_some());
    }

    #[test]
    fn an_implied_port_announce_uses_the_udp_source_port() {
        let mut pending = PendingQueries::new();
        let source: SocketAddr = "203.0.113.7:55555".parse().unwrap();

        let handled = handle_message(
            Message::query(
                tid(),
                Query::AnnouncePeer {
                    id: NodeId([1; 20]),
                    info_hash: InfoHash([0xBB; 20]),
                    port: 6881,
                    implied_port: true,
                    token: b"x".to_vec(),
                },
            ),
            source,
            &mut pending,
        );

        assert_eq!(
            handled.observation.unwrap().peer(),
            Some("203.0.113.7:55555".parse().unwrap())
        );
    }

    #[test]
    fn an_announce_with_an_empty_token_is_ignored() {
        let mut pending = PendingQueries::new();

        let handled = handle_message(
            Message::query(
                tid(),
                Query::AnnouncePeer {
                    id: NodeId([1; 20]),
                    info_hash: InfoHash([0xBB; 20]),
                    port: 6881,
                    implied_port: false,
                    token: Vec::new(),
                },
            ),
            from(),
            &mut pending,
        );

        assert!(handled.reply.is_none());
        assert!(handled.observation.is_none());
    }

    #[test]
    fn a_solicited_reply_feeds_the_harvest() {
        let mut pending = PendingQueries::new();
        let transaction_id = pending.register(from()).unwrap();

        let entry = NodeEntry {
            id: NodeId([9; 20]),
            addr: "192.0.2.9:6881".parse().unwrap(),
        };

        let handled = handle_message(
            Message::response(
                transaction_id,
                Response {
                    id: NodeId([1; 20]),
                    nodes: Some(vec![entry]),
                    ..Default::default()
                },
            ),
            from(),
            &mut pending,
        );

        assert_eq!(handled.harvested, vec![entry]);
        assert!(pending.is_empty());
    }

    #[test]
    fn an_unsolicited_reply_is_dropped() {
        let mut pending = PendingQueries::new();

        let handled = handle_message(
            Message::response(
                tid(),
                Response {
                    id: NodeId([1; 20]),
                    nodes: Some(vec![NodeEntry {
                        id: NodeId([9; 20]),
                        addr: "192.0.2.9:6881".parse().unwrap(),
                    }]),
                    ..Default::default()
                },
            ),
            from(),
            &mut pending,
        );

        assert!(handled.harvested.is_empty());
    }
}
