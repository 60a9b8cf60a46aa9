//! Torrust DHT crawler application.
//!
//! The application is a container for jobs. [`start`] spawns them and hands
//! the join handles back to `main`:
//!
//! - The crawler job: the DHT indexing nodes, the metadata sink and the
//!   manager loop (see [`bootstrap::jobs::crawler`](crate::bootstrap::jobs::crawler)).
//! - The results logger job: the built-in consumer of the output stream (see
//!   [`bootstrap::jobs::results_logger`](crate::bootstrap::jobs::results_logger)).
//!
//! Every job observes the process signals on its own; dropping the returned
//! [`HaltSenders`] also stops the jobs.
use std::sync::Arc;

use tokio::task::JoinHandle;
use torrust_dht_crawler_configuration::Configuration;

use crate::bootstrap::jobs::{crawler, results_logger};
use crate::core::output::ResultsReceiver;
use crate::core::Crawler;
use crate::servers::signals::Halted;

/// The halt channels of the started jobs. Kept by `main` for the lifetime of
/// the process: dropping a sender halts the matching job.
pub struct HaltSenders {
    pub crawler: tokio::sync::oneshot::Sender<Halted>,
}

/// # Panics
///
/// Will panic if a configured bind address is invalid or a socket cannot be
/// bound (see [`crawler::start_job`]).
pub async fn start(config: &Configuration, crawler: Arc<Crawler>, results: ResultsReceiver) -> (Vec<JoinHandle<()>>, HaltSenders) {
    let mut jobs: Vec<JoinHandle<()>> = Vec::new();

    let (halt_crawler, rx_halt) = tokio::sync::oneshot::channel::<Halted>();

    // Start the DHT indexing nodes, the metadata sink and the manager.
    jobs.push(crawler::start_job(config, crawler, rx_halt).await);

    // Start the output stream consumer.
    jobs.push(results_logger::start_job(results));

    (jobs, HaltSenders { crawler: halt_crawler })
}
