//! Setup for the application logging.
//!
//! It redirects the tracing events to the standard output with the level
//! defined in the configuration:
//!
//! - `Off`
//! - `Error`
//! - `Warn`
//! - `Info`
//! - `Debug`
//! - `Trace`
use std::sync::Once;

use torrust_dht_crawler_configuration::Configuration;
use tracing::info;
use tracing::level_filters::LevelFilter;

static INIT: Once = Once::new();

/// It redirects the tracing events to the standard output with the level
/// defined in the configuration.
///
/// # Panics
///
/// Will panic if the level in the configuration is not a valid level name.
pub fn setup(cfg: &Configuration) {
    let level = config_level_or_default(&cfg.log_level);

    if level == LevelFilter::OFF {
        return;
    }

    INIT.call_once(|| {
        stdout_config(level);
    });
}

fn config_level_or_default(log_level: &Option<String>) -> LevelFilter {
    log_level
        .as_deref()
        .unwrap_or("info")
        .parse()
        .expect("it should provide a valid log level")
}

fn stdout_config(filter: LevelFilter) {
    tracing_subscriber::fmt().with_max_level(filter).init();

    info!("logging initialized.");
}
