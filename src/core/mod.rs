//! The domain layer of the crawler.
//!
//! The central type is [`Crawler`]: the fan-in manager that every DHT
//! indexing node reports its observations to, and through which every
//! completed metadata exchange is emitted. It owns the three crawl-wide
//! policies:
//!
//! - the [`AddressPolicy`](crate::core::policy::AddressPolicy) (IP family,
//!   CIDR denylist, port sanity) applied to every observation;
//! - the [`DedupSet`](crate::core::dedup::DedupSet) of recently emitted
//!   infohashes, so a torrent is fetched at most once per window;
//! - the results channel growth policy
//!   (see [`output`](crate::core::output)).
//!
//! > **NOTICE**: the `Crawler` is not responsible for handling the network
//! > layer. The indexing nodes and the metadata sink live in
//! > [`servers`](crate::servers) and are wired to the `Crawler` by the
//! > application jobs.
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use torrust_dht_crawler_configuration::Configuration;
use torrust_dht_crawler_primitives::info_hash::InfoHash;

use self::dedup::DedupSet;
use self::error::Error;
use self::output::{results_channel, ResultsReceiver, ResultsSender};
use self::policy::AddressPolicy;
use self::statistics::Metrics;
use crate::shared::bit_torrent::metainfo::TorrentFile;

pub mod dedup;
pub mod error;
pub mod output;
pub mod policy;
pub mod services;
pub mod statistics;

/// One infohash sighting reported by an indexing node.
///
/// A `get_peers` query discloses only the infohash; an `announce_peer` query
/// additionally discloses the port the announcing peer serves torrent data
/// on. Only the latter can feed a metadata exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub info_hash: InfoHash,
    /// The UDP source address the query arrived from.
    pub source: SocketAddr,
    /// The announced `BitTorrent` port, when the sighting came from
    /// `announce_peer`. Already resolved against `implied_port`.
    pub announced_port: Option<u16>,
}

impl Observation {
    /// The peer to fetch metadata from, if the observation disclosed one.
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.announced_port.map(|port| SocketAddr::new(self.source.ip(), port))
    }
}

/// A completed crawl of one torrent: the record pushed to the output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexingResult {
    pub info_hash: InfoHash,
    /// The torrent name; empty when the torrent does not provide one.
    pub name: String,
    /// The torrent content. Single-file torrents present as a one-element
    /// list whose path is the torrent name.
    pub files: Vec<TorrentFile>,
    /// Peers observed advertising this infohash.
    pub peers: Vec<SocketAddr>,
}

/// The fan-in manager of the crawl.
pub struct Crawler {
    policy: AddressPolicy,
    dedup: Mutex<DedupSet>,
    stats: Arc<Metrics>,
    results: ResultsSender,
}

impl Crawler {
    /// `Crawler` constructor. Parses the textual policy settings once; bad
    /// settings are a startup failure.
    ///
    /// # Errors
    ///
    /// Will return a [`enum@Error`] if the CIDR denylist cannot be parsed or a
    /// capacity setting is zero.
    pub fn new(config: &Configuration) -> Result<(Crawler, ResultsReceiver), Error> {
        let policy = AddressPolicy::new(config.ip_family, &config.cidr_denylist)?;

        let dedup_capacity = NonZeroUsize::new(config.dedup_capacity).ok_or(Error::InvalidCapacity {
            setting: "dedup_capacity",
        })?;

        if config.results_channel_capacity == 0 {
            return Err(Error::InvalidCapacity {
                setting: "results_channel_capacity",
            });
        }

        let stats = Arc::new(Metrics::default());
        let (results, results_receiver) = results_channel(config.results_channel_capacity, stats.clone());

        Ok((
            Crawler {
                policy,
                dedup: Mutex::new(DedupSet::new(dedup_capacity)),
                stats,
                results,
            },
            results_receiver,
        ))
    }

    /// The crawl-wide address policy, shared with the indexing nodes.
    #[must_use]
    pub fn policy(&self) -> &AddressPolicy {
        &self.policy
    }

    /// The crawl-wide counters.
    #[must_use]
    pub fn statistics(&self) -> Arc<Metrics> {
        self.stats.clone()
    }

    /// Current capacity of the results channel, for the statistics log line.
    #[must_use]
    pub fn results_capacity(&self) -> usize {
        self.results.capacity()
    }

    /// Decides what to do with an observation: returns the peer to start a
    /// metadata exchange with, or `None` when the observation is filtered,
    /// peer-less, or a duplicate of a recently emitted infohash.
    pub fn admit(&self, observation: &Observation) -> Option<SocketAddr> {
        if !self.policy.permits_source(&observation.source) {
            Metrics::increment(&self.stats.policy_drops);
            return None;
        }

        Metrics::increment(&self.stats.observations);

        let peer = observation.peer()?;

        if !self.policy.permits_peer(&peer) {
            Metrics::increment(&self.stats.policy_drops);
            return None;
        }

        if self.dedup.lock().expect("dedup lock poisoned").contains(&observation.info_hash) {
            return None;
        }

        Some(peer)
    }

    /// Pushes a completed result to the output stream and records its
    /// infohash in the dedup window. Returns `false` after termination.
    pub fn emit(&self, result: IndexingResult) -> bool {
        self.dedup.lock().expect("dedup lock poisoned").insert(result.info_hash);

        if self.results.send(result) {
            Metrics::increment(&self.stats.results_emitted);
            true
        } else {
            false
        }
    }

    /// Closes the output stream. Buffered results stay readable; later
    /// [`Crawler::emit`] calls are rejected.
    pub fn terminate(&self) {
        self.results.close();
    }
}
