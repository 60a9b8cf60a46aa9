//! The network layer of the crawler.
//!
//! Two server-side subsystems live here:
//!
//! - [`dht`]: the KRPC indexing nodes that harvest infohashes from the
//!   Mainline DHT.
//! - [`metadata`]: the `BitTorrent` client sessions that download the
//!   metadata for harvested infohashes (BEP 9).
pub mod dht;
pub mod metadata;
pub mod signals;
