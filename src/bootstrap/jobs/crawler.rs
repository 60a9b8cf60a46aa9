//! Crawler job starter.
//!
//! The [`start_job`](crate::bootstrap::jobs::crawler::start_job) function
//! starts the whole crawl: one DHT indexing node per configured bind
//! address, the metadata sink, and the manager loop that connects them to
//! the domain [`Crawler`].
//!
//! > **NOTICE**: the application can launch more than one indexing node on
//! > different ports. Every extra node multiplies the harvest rate.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use torrust_dht_crawler_configuration::Configuration;
use tracing::{info, warn};

use crate::core::{Crawler, IndexingResult, Observation};
use crate::servers::dht::server::{IndexingNode, NodeSettings, RunningIndexingNode};
use crate::servers::metadata::sink::{FetchTask, MetadataSink};
use crate::servers::signals::{shutdown_signal_with_message, Halted};

/// Capacity of the internal fan-in channels. They only buffer bursts; the
/// manager drains them continuously.
const CHANNEL_CAPACITY: usize = 128;

/// Cadence of the statistics log line.
const STATISTICS_INTERVAL: Duration = Duration::from_secs(60);

/// It starts the crawl with the provided configuration.
///
/// It spawns one asynchronous task per indexing node, one for the metadata
/// sink and one for the manager loop, and returns the handle of the manager
/// loop. Stopping the manager (via the halt channel or a process signal)
/// stops everything else in order and closes the output stream.
///
/// # Panics
///
/// It will panic if a configured bind address is not a valid socket address,
/// or if an indexing node cannot bind its socket.
#[must_use]
pub async fn start_job(config: &Configuration, crawler: Arc<Crawler>, rx_halt: oneshot::Receiver<Halted>) -> JoinHandle<()> {
    let settings = NodeSettings {
        max_neighbours: config.max_neighbours,
        bootstrap_nodes: config.bootstrap_nodes.clone(),
    };

    let (observations_tx, observations_rx) = mpsc::channel::<Observation>(CHANNEL_CAPACITY);
    let (fetch_tx, fetch_rx) = mpsc::channel::<FetchTask>(CHANNEL_CAPACITY);
    let (results_tx, results_rx) = mpsc::channel::<IndexingResult>(CHANNEL_CAPACITY);

    let sink = MetadataSink::new(results_tx, crawler.statistics());
    // The sink stops when the fetch channel closes; the manager owns that.
    let sink_task = tokio::spawn(sink.run(fetch_rx, std::future::pending()));

    let policy = Arc::new(crawler.policy().clone());

    let mut nodes: Vec<RunningIndexingNode> = Vec::with_capacity(config.indexers.len());
    for indexer in &config.indexers {
        let bind_address: SocketAddr = indexer
            .bind_address
            .parse()
            .expect("indexer bind address should be a valid socket address");

        let node = IndexingNode::new(bind_address, settings.clone())
            .start(policy.clone(), crawler.statistics(), observations_tx.clone())
            .await
            .expect("it should start the indexing node");

        nodes.push(node);
    }

    tokio::spawn(run_manager(crawler, nodes, observations_rx, fetch_tx, results_rx, sink_task, rx_halt))
}

/// The manager loop: policy, dedup and fan-in between the indexing nodes and
/// the metadata sink.
async fn run_manager(
    crawler: Arc<Crawler>,
    nodes: Vec<RunningIndexingNode>,
    mut observations_rx: mpsc::Receiver<Observation>,
    fetch_tx: mpsc::Sender<FetchTask>,
    mut results_rx: mpsc::Receiver<IndexingResult>,
    sink_task: JoinHandle<()>,
    rx_halt: oneshot::Receiver<Halted>,
) {
    let shutdown = shutdown_signal_with_message(rx_halt, String::from("Halting crawler manager ..."));
    futures::pin_mut!(shutdown);

    let mut statistics_ticker = tokio::time::interval(STATISTICS_INTERVAL);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = statistics_ticker.tick() => log_statistics(&crawler),
            observation = observations_rx.recv() => {
                match observation {
                    Some(observation) => {
                        if let Some(peer) = crawler.admit(&observation) {
                            let task = FetchTask { info_hash: observation.info_hash, peer };
                            // A full sink means it is saturated with leeches;
                            // dropping the task is the admission policy, and
                            // blocking here could deadlock the fan-in.
                            drop(fetch_tx.try_send(task));
                        }
                    }
                    None => {
                        warn!("every indexing node is gone; stopping the crawl");
                        break;
                    }
                }
            }
            result = results_rx.recv() => {
                match result {
                    Some(result) => emit(&crawler, result),
                    None => {
                        warn!("the metadata sink is gone; stopping the crawl");
                        break;
                    }
                }
            }
        }
    }

    // Ordered teardown: nodes first, then the sink (by closing its channel),
    // then the output stream once everything is drained.
    for node in nodes {
        if let Err(e) = node.stop().await {
            warn!("could not stop an indexing node: {e}");
        }
    }

    drop(fetch_tx);

    // Keep draining results while the sink settles what is still in flight;
    // the channel closes when the sink task is done.
    while let Some(result) = results_rx.recv().await {
        emit(&crawler, result);
    }
    drop(sink_task.await);

    crawler.terminate();

    info!("Crawler manager stopped");
}

fn emit(crawler: &Crawler, result: IndexingResult) {
    info!("indexed torrent {} ({})", result.info_hash, result.name);

    if !crawler.emit(result) {
        warn!("the output stream is closed; discarding a result");
    }
}

fn log_statistics(crawler: &Crawler) {
    let stats = crawler.statistics().snapshot();

    info!(
        "observations: {}, leeches started/failed/timed out: {}/{}/{}, results emitted/dropped: {}/{}, policy drops: {}, malformed packets: {}, output capacity: {}",
        stats.observations,
        stats.leeches_started,
        stats.leeches_failed,
        stats.leech_timeouts,
        stats.results_emitted,
        stats.results_dropped,
        stats.policy_drops,
        stats.malformed_packets,
        crawler.results_capacity(),
    );
}
