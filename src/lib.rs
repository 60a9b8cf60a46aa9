//! **Torrust DHT Crawler** is a passive/active crawler for the `BitTorrent`
//! Mainline DHT.
//!
//! It joins the DHT as a pool of lightweight indexing nodes, provokes
//! `get_peers` and `announce_peer` traffic, and fetches the metadata of every
//! newly observed torrent directly from its peers
//! ([BEP 9](https://www.bittorrent.org/beps/bep_0009.html)). Discovered
//! torrents (infohash, name, file list, peer samples) are emitted on a single
//! result stream for an external sink to persist.
//!
//! > **NOTICE**: the crawler is not a well-behaved DHT citizen. It keeps no
//! > routing table, answers lookups with empty results and forges a new node
//! > id for every conversation, placing itself in everyone's close-neighbour
//! > set to maximise the announce traffic it sees. Run it accordingly.
//!
//! # How it works
//!
//! The crawl is three subsystems connected by channels:
//!
//! 1. **DHT indexing nodes** ([`servers::dht`]). One per configured bind
//!    address, each with its own UDP socket. A node keeps a small
//!    insertion-ordered pool of recently seen DHT nodes (no buckets, no
//!    routing correctness) and sprays `find_node` queries at it once per
//!    second, with a freshly forged sender id per query. The replies refill
//!    the pool; the queries the rest of the network sends back disclose
//!    infohashes, which the node reports as observations.
//!
//! 2. **The manager** ([`core::Crawler`] plus the loop in
//!    [`bootstrap::jobs::crawler`]). It filters observations against the IP
//!    policy (address family, CIDR denylist, port sanity), drops infohashes
//!    that were emitted recently (a bounded LRU window) and hands the
//!    survivors to the metadata sink. Completed metadata comes back to the
//!    manager, which emits it on the output stream.
//!
//! 3. **The metadata sink** ([`servers::metadata`]). For every admitted
//!    `(infohash, peer)` pair it runs a one-shot `BitTorrent` session: TCP
//!    connect, 68-byte handshake with the extension bit set, `ut_metadata`
//!    negotiation, piece download, SHA-1 verification against the infohash,
//!    and `info`-dictionary parsing. At most one session per infohash runs
//!    at a time; failures are counted and forgotten.
//!
//! # Configuration
//!
//! The configuration is loaded from `crawler.toml` or the
//! `TORRUST_DHT_CRAWLER_CONFIG` environment variable. Refer to the
//! [`torrust-dht-crawler-configuration`](torrust_dht_crawler_configuration)
//! crate for all the options and their defaults.
//!
//! # Output
//!
//! The output stream is unordered and deduplicated per window: consumers may
//! still see a duplicate infohash across windows and must treat it as a late
//! arrival. The stream is backpressure-friendly in one direction only — when
//! the consumer falls behind, the channel doubles its capacity up to a hard
//! ceiling, beyond which the oldest unread result is dropped and counted.
//! Within the process the stream ends up in the
//! [`results_logger`](bootstrap::jobs::results_logger) job, which prints one
//! JSON line per torrent.
pub mod app;
pub mod bootstrap;
pub mod core;
pub mod servers;
pub mod shared;
