//! The metadata sink task: admission control and leech fan-out.
//!
//! The sink receives `(infohash, peer)` fetch tasks from the manager and runs
//! at most one leech per infohash at a time. Duplicate submissions for an
//! infohash currently being leeched are dropped, not queued; so are
//! submissions for infohashes fetched a short while ago, and anything beyond
//! the leech cap. Completed metadata flows back to the manager as
//! [`IndexingResult`]s.
use std::collections::HashSet;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use torrust_dht_crawler_primitives::info_hash::InfoHash;
use tracing::{debug, info};

use crate::core::statistics::Metrics;
use crate::core::IndexingResult;
use crate::servers::metadata::error::Error;
use crate::servers::metadata::leech::fetch_metadata;
use crate::servers::metadata::{MAX_ACTIVE_LEECHES, RECENTLY_FETCHED_CAPACITY};
use crate::shared::bit_torrent::metainfo::TorrentMetadata;

/// One admission request: fetch the metadata of `info_hash` from `peer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTask {
    pub info_hash: InfoHash,
    pub peer: SocketAddr,
}

/// The admission state of the sink task.
pub struct MetadataSink {
    results_tx: mpsc::Sender<IndexingResult>,
    stats: Arc<Metrics>,
    in_flight: HashSet<InfoHash>,
    recently_fetched: LruCache<InfoHash, ()>,
}

impl MetadataSink {
    #[must_use]
    pub fn new(results_tx: mpsc::Sender<IndexingResult>, stats: Arc<Metrics>) -> MetadataSink {
        MetadataSink {
            results_tx,
            stats,
            in_flight: HashSet::new(),
            recently_fetched: LruCache::new(NonZeroUsize::new(RECENTLY_FETCHED_CAPACITY).expect("capacity is a nonzero constant")),
        }
    }

    /// Runs the sink until `shutdown` resolves or the fetch channel closes,
    /// then settles what is still in flight.
    pub async fn run<F>(mut self, mut fetch_rx: mpsc::Receiver<FetchTask>, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        futures::pin_mut!(shutdown);

        let mut leeches: JoinSet<(FetchTask, Result<TorrentMetadata, Error>)> = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                task = fetch_rx.recv() => {
                    match task {
                        Some(task) => self.admit(&mut leeches, task),
                        None => break,
                    }
                }
                Some(joined) = leeches.join_next() => {
                    if let Ok((task, outcome)) = joined {
                        self.settle(task, outcome).await;
                    }
                }
            }
        }

        info!("Stopping metadata sink ...");

        // In-flight exchanges are cancelled; whatever already finished is
        // still delivered before the sink goes away.
        leeches.abort_all();
        while let Some(joined) = leeches.join_next().await {
            if let Ok((task, outcome)) = joined {
                self.settle(task, outcome).await;
            }
        }
    }

    fn admit(&mut self, leeches: &mut JoinSet<(FetchTask, Result<TorrentMetadata, Error>)>, task: FetchTask) {
        // One leech per infohash; concurrent duplicates are dropped, not queued.
        if self.in_flight.contains(&task.info_hash) {
            return;
        }

        if self.recently_fetched.contains(&task.info_hash) {
            return;
        }

        if leeches.len() >= MAX_ACTIVE_LEECHES {
            debug!("leech cap reached; dropping a fetch task for {}", task.info_hash);
            return;
        }

        Metrics::increment(&self.stats.leeches_started);
        self.in_flight.insert(task.info_hash);

        leeches.spawn(async move {
            let outcome = fetch_metadata(task.info_hash, task.peer).await;
            (task, outcome)
        });
    }

    async fn settle(&mut self, task: FetchTask, outcome: Result<TorrentMetadata, Error>) {
        self.in_flight.remove(&task.info_hash);

        match outcome {
            Ok(metadata) => {
                self.recently_fetched.put(task.info_hash, ());

                let result = IndexingResult {
                    info_hash: task.info_hash,
                    name: metadata.name,
                    files: metadata.files,
                    peers: vec![task.peer],
                };

                if self.results_tx.send(result).await.is_err() {
                    debug!("the manager is gone; discarding a completed result");
                }
            }
            Err(e) => {
                Metrics::increment(&self.stats.leeches_failed);
                if e.is_timeout() {
                    Metrics::increment(&self.stats.leech_timeouts);
                }
                debug!("leech for {} via {} failed: {e}", task.info_hash, task.peer);
            }
        }
    }
}
