//! The KRPC message model (BEP 5): bencoded dictionaries over UDP.
//!
//! Every message carries a transaction id `t` binding replies to queries and
//! a kind marker `y`: `q` for queries, `r` for replies, `e` for errors.
//! Unknown top-level keys (`v`, `ip`, `ro`) are tolerated and ignored;
//! unknown query methods and malformed payloads are decoding errors, handled
//! by the caller as droppable noise.
use bencode::{ben_bytes, ben_int, ben_map, Bencode, Dict};
use rand::Rng;
use torrust_dht_crawler_primitives::info_hash::InfoHash;
use torrust_dht_crawler_primitives::node_id::NodeId;

use crate::servers::dht::compact;
use crate::servers::dht::compact::NodeEntry;
use crate::servers::dht::error::Error;

/// The opaque byte string binding a KRPC reply to its query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(pub Vec<u8>);

impl TransactionId {
    /// Two random bytes, the customary size on the wire.
    #[must_use]
    pub fn random() -> TransactionId {
        let mut bytes = [0u8; 2];
        rand::thread_rng().fill(&mut bytes);
        TransactionId(bytes.to_vec())
    }
}

/// A KRPC query, with its `a` arguments flattened into the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Ping {
        id: NodeId,
    },
    FindNode {
        id: NodeId,
        target: NodeId,
    },
    GetPeers {
        id: NodeId,
        info_hash: InfoHash,
    },
    AnnouncePeer {
        id: NodeId,
        info_hash: InfoHash,
        port: u16,
        implied_port: bool,
        token: Vec<u8>,
    },
}

impl Query {
    /// The sender id common to all queries.
    #[must_use]
    pub fn sender_id(&self) -> NodeId {
        match self {
            Query::Ping { id } | Query::FindNode { id, .. } | Query::GetPeers { id, .. } | Query::AnnouncePeer { id, .. } => *id,
        }
    }
}

/// A KRPC reply (`y = r`). Which optional payloads are present depends on the
/// query that is being answered. `Some(vec![])` and an absent key are
/// different things on the wire, so presence is modelled explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub id: NodeId,
    pub nodes: Option<Vec<NodeEntry>>,
    pub nodes6: Option<Vec<NodeEntry>>,
    pub values: Option<Vec<std::net::SocketAddr>>,
    pub token: Option<Vec<u8>>,
}

/// The three KRPC message kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Query(Query),
    Response(Response),
    Error { code: i64, message: String },
}

/// A full KRPC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub transaction_id: TransactionId,
    pub body: MessageBody,
}

impl Message {
    #[must_use]
    pub fn query(transaction_id: TransactionId, query: Query) -> Message {
        Message {
            transaction_id,
            body: MessageBody::Query(query),
        }
    }

    #[must_use]
    pub fn response(transaction_id: TransactionId, response: Response) -> Message {
        Message {
            transaction_id,
            body: MessageBody::Response(response),
        }
    }

    /// Decodes one UDP datagram.
    ///
    /// # Errors
    ///
    /// Will return an [`enum@Error`] for anything that is not a well-formed
    /// KRPC message.
    pub fn decode(bytes: &[u8]) -> Result<Message, Error> {
        let value = Bencode::decode(bytes)?;
        let dict = value.as_dict().ok_or(Error::NotADictionary)?;

        let transaction_id = TransactionId(require_bytes(dict, "t")?.to_vec());

        let body = match require_bytes(dict, "y")? {
            b"q" => MessageBody::Query(decode_query(dict)?),
            b"r" => MessageBody::Response(decode_response(dict)?),
            b"e" => decode_error(dict)?,
            kind => {
                return Err(Error::UnknownMessageKind {
                    kind: String::from_utf8_lossy(kind).into_owned(),
                })
            }
        };

        Ok(Message { transaction_id, body })
    }

    /// Encodes the message into its canonical bencode form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut dict = Dict::new();
        dict.insert(b"t".to_vec(), Bencode::Bytes(self.transaction_id.0.clone()));

        match &self.body {
            MessageBody::Query(query) => {
                let (method, arguments) = encode_query(query);
                dict.insert(b"y".to_vec(), ben_bytes!("q"));
                dict.insert(b"q".to_vec(), ben_bytes!(method));
                dict.insert(b"a".to_vec(), arguments);
            }
            MessageBody::Response(response) => {
                dict.insert(b"y".to_vec(), ben_bytes!("r"));
                dict.insert(b"r".to_vec(), encode_response(response));
            }
            MessageBody::Error { code, message } => {
                dict.insert(b"y".to_vec(), ben_bytes!("e"));
                dict.insert(
                    b"e".to_vec(),
                    Bencode::List(vec![ben_int!(*code), Bencode::Bytes(message.clone().into_bytes())]),
                );
            }
        }

        Bencode::Dict(dict).encode()
    }
}

fn decode_query(dict: &Dict) -> Result<Query, Error> {
    let arguments = require_dict(dict, "a")?;
    let id = node_id(arguments, "id")?;

    match require_bytes(dict, "q")? {
        b"ping" => Ok(Query::Ping { id }),
        b"find_node" => Ok(Query::FindNode {
            id,
            target: node_id(arguments, "target")?,
        }),
        b"get_peers" => Ok(Query::GetPeers {
            id,
            info_hash: info_hash(arguments, "info_hash")?,
        }),
        b"announce_peer" => {
            let port = require_int(arguments, "port")?;
            let port = u16::try_from(port).map_err(|_| Error::PortOutOfRange)?;

            let implied_port = matches!(arguments.lookup(b"implied_port"), Some(Bencode::Int(n)) if *n != 0);

            Ok(Query::AnnouncePeer {
                id,
                info_hash: info_hash(arguments, "info_hash")?,
                port,
                implied_port,
                token: require_bytes(arguments, "token")?.to_vec(),
            })
        }
        method => Err(Error::UnknownQueryMethod {
            method: String::from_utf8_lossy(method).into_owned(),
        }),
    }
}

fn decode_response(dict: &Dict) -> Result<Response, Error> {
    let payload = require_dict(dict, "r")?;

    let nodes = match payload.lookup(b"nodes") {
        Some(value) => Some(compact::parse_nodes_v4(value.as_bytes().ok_or(Error::WrongType { key: "nodes" })?)?),
        None => None,
    };

    let nodes6 = match payload.lookup(b"nodes6") {
        Some(value) => Some(compact::parse_nodes_v6(value.as_bytes().ok_or(Error::WrongType { key: "nodes6" })?)?),
        None => None,
    };

    let values = match payload.lookup(b"values") {
        Some(value) => Some(
            value
                .as_list()
                .ok_or(Error::WrongType { key: "values" })?
                .iter()
                .map(|peer| compact::parse_peer(peer.as_bytes().ok_or(Error::WrongType { key: "values" })?))
                .collect::<Result<Vec<std::net::SocketAddr>, Error>>()?,
        ),
        None => None,
    };

    let token = match payload.lookup(b"token") {
        Some(value) => Some(value.as_bytes().ok_or(Error::WrongType { key: "token" })?.to_vec()),
        None => None,
    };

    Ok(Response {
        id: node_id(payload, "id")?,
        nodes,
        nodes6,
        values,
        token,
    })
}

fn decode_error(dict: &Dict) -> Result<MessageBody, Error> {
    let payload = dict
        .lookup(b"e")
        .ok_or(Error::MissingKey { key: "e" })?
        .as_list()
        .ok_or(Error::WrongType { key: "e" })?;

    let code = payload.first().and_then(Bencode::as_int).ok_or(Error::WrongType { key: "e" })?;
    let message = payload
        .get(1)
        .and_then(Bencode::as_bytes)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();

    Ok(MessageBody::Error { code, message })
}

fn encode_query(query: &Query) -> (&'static str, Bencode) {
    match query {
        Query::Ping { id } => ("ping", ben_map! { "id" => ben_bytes!(id.bytes()) }),
        Query::FindNode { id, target } => (
            "find_node",
            ben_map! {
                "id" => ben_bytes!(id.bytes()),
                "target" => ben_bytes!(target.bytes())
            },
        ),
        Query::GetPeers { id, info_hash } => (
            "get_peers",
            ben_map! {
                "id" => ben_bytes!(id.bytes()),
                "info_hash" => ben_bytes!(info_hash.bytes())
            },
        ),
        Query::AnnouncePeer {
            id,
            info_hash,
            port,
            implied_port,
            token,
        } => (
            "announce_peer",
            ben_map! {
                "id" => ben_bytes!(id.bytes()),
                "implied_port" => ben_int!(i64::from(*implied_port)),
                "info_hash" => ben_bytes!(info_hash.bytes()),
                "port" => ben_int!(i64::from(*port)),
                "token" => Bencode::Bytes(token.clone())
            },
        ),
    }
}

fn encode_response(response: &Response) -> Bencode {
    let mut payload = Dict::new();
    payload.insert(b"id".to_vec(), ben_bytes!(response.id.bytes()));

    if let Some(nodes) = &response.nodes {
        payload.insert(b"nodes".to_vec(), Bencode::Bytes(compact::encode_nodes(nodes, false)));
    }
    if let Some(nodes6) = &response.nodes6 {
        payload.insert(b"nodes6".to_vec(), Bencode::Bytes(compact::encode_nodes(nodes6, true)));
    }
    if let Some(values) = &response.values {
        payload.insert(
            b"values".to_vec(),
            Bencode::List(values.iter().map(|peer| Bencode::Bytes(compact::encode_peer(peer))).collect()),
        );
    }
    if let Some(token) = &response.token {
        payload.insert(b"token".to_vec(), Bencode::Bytes(token.clone()));
    }

    Bencode::Dict(payload)
}

fn node_id(dict: &Dict, key: &'static str) -> Result<NodeId, Error> {
    NodeId::try_from(require_bytes(dict, key)?).map_err(|_| Error::InvalidIdLength)
}

fn info_hash(dict: &Dict, key: &'static str) -> Result<InfoHash, Error> {
    InfoHash::try_from(require_bytes(dict, key)?).map_err(|_| Error::InvalidIdLength)
}

fn require_bytes<'a>(dict: &'a Dict, key: &'static str) -> Result<&'a [u8], Error> {
    dict.lookup(key.as_bytes())
        .ok_or(Error::MissingKey { key })?
        .as_bytes()
        .ok_or(Error::WrongType { key })
}

fn require_int(dict: &Dict, key: &'static str) -> Result<i64, Error> {
    dict.lookup(key.as_bytes())
        .ok_or(Error::MissingKey { key })?
        .as_int()
        .ok_or(Error::WrongType { key })
}

fn require_dict<'a>(dict: &'a Dict, key: &'static str) -> Result<&'a Dict, Error> {
    dict.lookup(key.as_bytes())
        .ok_or(Error::MissingKey { key })?
        .as_dict()
        .ok_or(Error::WrongType { key })
}
