use torrust_dht_crawler::{app, bootstrap};

#[tokio::main]
async fn main() {
    let (config, crawler, results) = bootstrap::app::setup();

    let (jobs, _halt_senders) = app::start(&config, crawler, results).await;

    // The jobs observe the process signals themselves; the crawler job closes
    // the output stream on shutdown, which in turn ends the logger job.
    for job in jobs {
        drop(job.await);
    }
}
