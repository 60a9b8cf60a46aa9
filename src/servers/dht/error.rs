//! Errors raised while decoding or handling KRPC traffic.
//!
//! All of these are transport-benign: the offending datagram is dropped and
//! counted, and the indexing node keeps running.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed bencode: {0}")]
    Bencode(#[from] bencode::ParseError),

    #[error("the message is not a dictionary")]
    NotADictionary,

    #[error("missing key: {key}")]
    MissingKey { key: &'static str },

    #[error("wrong type for key: {key}")]
    WrongType { key: &'static str },

    #[error("unknown message kind: {kind}")]
    UnknownMessageKind { kind: String },

    #[error("unknown query method: {method}")]
    UnknownQueryMethod { method: String },

    #[error("invalid id length")]
    InvalidIdLength,

    #[error("port out of range")]
    PortOutOfRange,

    #[error("truncated compact node info")]
    TruncatedCompactNodeInfo,

    #[error("invalid compact peer info length: {len}")]
    InvalidCompactPeerInfo { len: usize },
}
