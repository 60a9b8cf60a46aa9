//! Initialize configuration from file or env var.
//!
//! All environment variables are prefixed with `TORRUST_DHT_CRAWLER_`.
use torrust_dht_crawler_configuration::{Configuration, Info};

// Environment variables

/// The whole `crawler.toml` file content. It has priority over the config
/// file. Even if the file is not on the default path.
const ENV_VAR_CONFIG: &str = "TORRUST_DHT_CRAWLER_CONFIG";

/// The `crawler.toml` file location.
pub const ENV_VAR_PATH_CONFIG: &str = "TORRUST_DHT_CRAWLER_PATH_CONFIG";

// Default values

pub const DEFAULT_PATH_CONFIG: &str = "./crawler.toml";

/// It loads the application configuration from the environment.
///
/// There are two methods to inject the configuration:
///
/// 1. By using a config file: `crawler.toml`.
/// 2. Environment variable: `TORRUST_DHT_CRAWLER_CONFIG`. The variable
///    contains the same contents as the `crawler.toml` file.
///
/// Environment variable has priority over the config file.
///
/// When neither is available a default `crawler.toml` is written next to the
/// binary and used as-is.
///
/// # Panics
///
/// Will panic if the loaded configuration is not valid TOML, or if the
/// default configuration file cannot be written.
#[must_use]
pub fn initialize_configuration() -> Configuration {
    match Info::new(
        ENV_VAR_CONFIG.to_string(),
        ENV_VAR_PATH_CONFIG.to_string(),
        DEFAULT_PATH_CONFIG.to_string(),
    ) {
        Ok(info) => Configuration::load(&info).expect("configuration should be valid"),
        Err(_) => {
            println!("No configuration found. Creating default configuration file: `{DEFAULT_PATH_CONFIG}` ...");

            Configuration::create_default_configuration_file(DEFAULT_PATH_CONFIG)
                .expect("default configuration file should be writable")
        }
    }
}
