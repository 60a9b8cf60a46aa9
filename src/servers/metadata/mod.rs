//! The metadata sink: `BitTorrent` client sessions that fetch torrent
//! metadata directly from peers (BEP 9 over BEP 10).
//!
//! For every admitted `(infohash, peer)` pair the sink runs one *leech*: a
//! one-shot TCP session that handshakes, negotiates `ut_metadata`, downloads
//! the metadata pieces, verifies the SHA-1 against the infohash and parses
//! the result. Completed leeches surface as
//! [`IndexingResult`](crate::core::IndexingResult)s; failed leeches surface
//! as counters.
use std::time::Duration;

pub mod error;
pub mod leech;
pub mod sink;
pub mod wire;

/// Largest metadata blob a peer may declare. Larger declarations are rejected
/// before any piece is requested.
pub const MAX_METADATA_SIZE: usize = 10 * 1024 * 1024;

/// Fixed metadata piece size of BEP 9: 16 KiB, the last piece may be shorter.
pub const METADATA_PIECE_SIZE: usize = 16 * 1024;

/// How many piece requests may be in flight per leech.
pub const MAX_PIPELINED_REQUESTS: usize = 4;

/// TCP connect budget of one leech.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-exchange budget of one leech, from handshake to the last piece.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Hard cap of concurrently running leeches.
pub const MAX_ACTIVE_LEECHES: usize = 1000;

/// How many recently fetched infohashes the sink remembers to avoid
/// re-leeching them.
pub const RECENTLY_FETCHED_CAPACITY: usize = 1024;
