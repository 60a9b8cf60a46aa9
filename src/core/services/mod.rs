//! Core services.
//!
//! There is only one at the moment: building the domain
//! [`Crawler`](crate::core::Crawler) from a configuration.
use torrust_dht_crawler_configuration::Configuration;

use crate::core::error::Error;
use crate::core::output::ResultsReceiver;
use crate::core::Crawler;

/// Builds the core `Crawler` and the receiving end of its output stream.
///
/// # Errors
///
/// Will return a [`enum@Error`] if the configuration carries an unparsable
/// policy (see [`Crawler::new`]).
pub fn crawler_factory(config: &Configuration) -> Result<(Crawler, ResultsReceiver), Error> {
    Crawler::new(config)
}
