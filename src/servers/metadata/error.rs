//! Why a metadata leech was aborted.
//!
//! None of these reach the output stream: a failed leech simply produces no
//! result. Peers are not blacklisted either; the same infohash may succeed
//! from the next announcer. Integrity failures deliberately leave the
//! infohash out of the dedup window so it can be retried.
use thiserror::Error;

use crate::shared::bit_torrent::metainfo;

#[derive(Error, Debug)]
pub enum Error {
    /// Connection-level failures: refused, reset, routing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// One of the leech deadlines fired.
    #[error("the leech ran out of time")]
    Timeout,

    /// The 68-byte handshake did not parse or answered for another torrent.
    #[error("peer sent a bad handshake")]
    BadHandshake,

    /// The peer does not speak the extension protocol (reserved bit clear).
    #[error("peer does not support the extension protocol")]
    ExtensionsUnsupported,

    /// The extension handshake carries no `ut_metadata` mapping.
    #[error("peer does not support ut_metadata")]
    UtMetadataUnsupported,

    /// Declared size of zero, above the cap, or missing.
    #[error("declared metadata size {size} is not acceptable")]
    MetadataSizeOutOfRange { size: i64 },

    /// A length-prefixed frame larger than anything the protocol needs.
    #[error("peer sent an oversized frame of {len} bytes")]
    FrameTooLarge { len: usize },

    /// The peer closed the connection mid-exchange.
    #[error("peer closed the connection")]
    ConnectionClosed,

    /// An extension payload that does not decode.
    #[error("malformed extension message: {0}")]
    Bencode(#[from] bencode::ParseError),

    /// A `data` message for a piece that was never requested, out of range,
    /// or of the wrong size.
    #[error("unexpected metadata piece {piece}")]
    UnexpectedPiece { piece: i64 },

    /// SHA-1 over the assembled metadata does not equal the infohash.
    #[error("metadata does not match the requested infohash")]
    InfoHashMismatch,

    /// The assembled metadata is not an acceptable `info` dictionary.
    #[error("unparsable info dictionary: {0}")]
    Metainfo(#[from] metainfo::Error),
}

impl Error {
    /// Whether the leech died on a deadline, for the timeout counter.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}
