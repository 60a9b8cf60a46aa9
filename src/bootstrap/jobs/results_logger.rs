//! Results logger job starter.
//!
//! The built-in consumer of the output stream: it renders every
//! [`IndexingResult`](crate::core::IndexingResult) as one JSON line on the
//! log. Deployments with a real sink (a database importer, a message queue)
//! replace this job and consume the
//! [`ResultsReceiver`](crate::core::output::ResultsReceiver) themselves.
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::output::ResultsReceiver;

/// It starts the results logger.
///
/// The job ends when the output stream is closed and drained.
#[must_use]
pub fn start_job(mut results: ResultsReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = results.recv().await {
            match serde_json::to_string(&result) {
                Ok(line) => info!("{line}"),
                Err(e) => warn!("could not render a result as JSON: {e}"),
            }
        }

        info!("Results stream closed");
    })
}
