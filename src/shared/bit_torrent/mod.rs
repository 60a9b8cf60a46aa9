//! `BitTorrent` protocol primitives shared by the DHT and metadata layers.
//!
//! The [`metainfo`] module turns a bencoded `info` dictionary into the
//! normalised record the crawler emits.
use torrust_dht_crawler_primitives::info_hash::InfoHash;

pub mod metainfo;

/// Computes the infohash of a torrent file: the SHA-1 over the verbatim bytes
/// of the `info` value, not over a re-encoding.
///
/// # Errors
///
/// Will return an error if `torrent_bytes` is not a bencoded dictionary with
/// an `info` entry.
pub fn info_hash_of_torrent_file(torrent_bytes: &[u8]) -> Result<InfoHash, metainfo::Error> {
    let span = bencode::dict_entry_span(torrent_bytes, b"info")?.ok_or(metainfo::Error::MissingField { field: "info" })?;

    Ok(InfoHash(sha1_digest(&torrent_bytes[span])))
}

/// SHA-1 of an arbitrary byte slice as a 20-byte array.
#[must_use]
pub fn sha1_digest(bytes: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hasher.finalize().into()
}
