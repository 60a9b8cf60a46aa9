//! Setup for the main crawler application.
//!
//! The [`setup`] function only builds the application dependencies, it does
//! not start anything. There is no such thing as a main application process:
//! when the application starts, the only thing it does is starting a bunch of
//! independent jobs. If you are looking for how things are started you should
//! read [`app::start`](crate::app::start).
//!
//! Setup steps:
//!
//! 1. Load the global application configuration.
//! 2. Initialize logging.
//! 3. Build the domain crawler.
use std::sync::Arc;

use torrust_dht_crawler_configuration::Configuration;

use super::config::initialize_configuration;
use crate::bootstrap::logging;
use crate::core::output::ResultsReceiver;
use crate::core::services::crawler_factory;
use crate::core::Crawler;

/// It loads the configuration from the environment, sets up logging and
/// builds the domain crawler with the receiving end of its output stream.
///
/// # Panics
///
/// Will panic if the configuration cannot be loaded or carries an unparsable
/// policy (bad CIDR blocks, zero capacities).
#[must_use]
pub fn setup() -> (Configuration, Arc<Crawler>, ResultsReceiver) {
    let config = initialize_configuration();

    logging::setup(&config);

    let (crawler, results) = crawler_factory(&config).expect("it should build the crawler from the configuration");

    (config, Arc::new(crawler), results)
}
