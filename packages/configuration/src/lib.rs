//! Configuration data structures for the [Torrust DHT crawler](https://docs.rs/torrust-dht-crawler).
//!
//! The configuration is loaded from a [TOML](https://toml.io/en/) file
//! `crawler.toml` in the project root folder or from an environment variable
//! with the same content as the file.
//!
//! When you run the crawler without a configuration file, a new one is
//! created with the default values, and the crawler immediately exits. You
//! can then edit the configuration file and run the crawler again.
//!
//! Configuration can not only be loaded from a file, but also from the
//! environment variable `TORRUST_DHT_CRAWLER_CONFIG`. This is useful when
//! running the crawler in a Docker container or environments where you do not
//! have persistent storage or you cannot inject a configuration file.
//!
//! # Default configuration
//!
//! The default configuration is:
//!
//! ```toml
//! log_level = "info"
//! ip_family = "both"
//! max_neighbours = 10
//! dedup_capacity = 16384
//! results_channel_capacity = 20
//! bootstrap_nodes = [
//!     "router.bittorrent.com:6881",
//!     "dht.transmissionbt.com:6881",
//!     "router.utorrent.com:6881",
//! ]
//! cidr_denylist = []
//!
//! [[indexers]]
//! bind_address = "0.0.0.0:6881"
//! ```
//!
//! The `[[indexers]]` section is an array: the crawler starts one DHT
//! indexing node per entry, each with its own UDP socket. Running several
//! nodes on different ports multiplies the harvest rate.
use std::{env, fs};

use config::{Config, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use torrust_dht_crawler_primitives::IpFamily;

/// Information required for loading config
#[derive(Debug, Default, Clone)]
pub struct Info {
    crawler_toml: String,
}

impl Info {
    /// Build Configuration Info.
    ///
    /// # Errors
    ///
    /// Will return `Err` if unable to obtain a configuration.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(env_var_config: String, env_var_path_config: String, default_path_config: String) -> Result<Self, Error> {
        let crawler_toml = if let Ok(crawler_toml) = env::var(&env_var_config) {
            println!("Loading configuration from env var {env_var_config} ...");

            crawler_toml
        } else {
            let config_path = if let Ok(config_path) = env::var(env_var_path_config) {
                println!("Loading configuration file: `{config_path}` ...");

                config_path
            } else {
                println!("Loading default configuration file: `{default_path_config}` ...");

                default_path_config
            };

            fs::read_to_string(config_path).map_err(|e| Error::UnableToLoadFromConfigFile { source: e })?
        };

        Ok(Self { crawler_toml })
    }
}

/// Configuration for each DHT indexing node.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Indexer {
    /// The address the indexing node will bind its UDP socket to.
    /// The format is `ip:port`, for example `0.0.0.0:6881`. If you want to
    /// listen to all interfaces, use `0.0.0.0`. If you want the operating
    /// system to choose a random port, use port `0`.
    pub bind_address: String,
}

/// Core configuration for the crawler.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Configuration {
    /// Logging level. Possible values are: `Off`, `Error`, `Warn`, `Info`,
    /// `Debug` and `Trace`. Default is `Info`.
    pub log_level: Option<String>,

    /// Which IP families the crawler talks to. Observations and peers of the
    /// excluded family are dropped.
    pub ip_family: IpFamily,

    /// Upper bound of each indexing node's neighbour pool. The pool feeds the
    /// outgoing `find_node` storm; older entries are evicted first.
    pub max_neighbours: usize,

    /// Capacity of the LRU set of recently emitted infohashes. Observations
    /// for an infohash still in the set are dropped before the metadata
    /// exchange starts.
    pub dedup_capacity: usize,

    /// Initial capacity of the results channel. The channel grows by doubling
    /// when the consumer falls behind, up to a hard internal ceiling.
    pub results_channel_capacity: usize,

    /// Well-known DHT nodes used to seed the neighbour pools. Resolved at
    /// startup (A and AAAA records, subject to `ip_family`).
    pub bootstrap_nodes: Vec<String>,

    /// CIDR blocks the crawler must not talk to, for example
    /// `["10.0.0.0/8", "fc00::/7"]`. Applies to DHT messages and to peers.
    pub cidr_denylist: Vec<String>,

    /// The list of DHT indexing nodes the crawler runs. Each entry is a UDP
    /// socket with its own harvesting loop.
    pub indexers: Vec<Indexer>,
}

/// Errors that can occur when loading the configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Unable to load the configuration from the configuration file.
    #[error("Unable to load from Config File: {source}")]
    UnableToLoadFromConfigFile { source: std::io::Error },

    #[error("Failed processing the configuration: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: Option::from(String::from("info")),
            ip_family: IpFamily::Both,
            max_neighbours: 10,
            dedup_capacity: 16384,
            results_channel_capacity: 20,
            bootstrap_nodes: vec![
                String::from("router.bittorrent.com:6881"),
                String::from("dht.transmissionbt.com:6881"),
                String::from("router.utorrent.com:6881"),
            ],
            cidr_denylist: Vec::new(),
            indexers: vec![Indexer {
                bind_address: String::from("0.0.0.0:6881"),
            }],
        }
    }
}

impl Configuration {
    /// Loads the configuration from the configuration file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `path` does not exist or has a bad configuration.
    pub fn load_from_file(path: &str) -> Result<Configuration, Error> {
        let config = Config::builder().add_source(File::with_name(path)).build()?;

        let crawler_config: Configuration = config.try_deserialize()?;

        Ok(crawler_config)
    }

    /// Loads the configuration from the [`Info`] struct. The whole
    /// configuration in TOML format is included in the `info.crawler_toml`
    /// string.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the TOML is invalid or is missing settings.
    pub fn load(info: &Info) -> Result<Configuration, Error> {
        let config = Config::builder()
            .add_source(File::from_str(&info.crawler_toml, FileFormat::Toml))
            .build()?;

        let crawler_config: Configuration = config.try_deserialize()?;

        Ok(crawler_config)
    }

    /// Saves the default configuration at the given path.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `path` is not a valid path or the configuration
    /// file cannot be created.
    pub fn create_default_configuration_file(path: &str) -> Result<Configuration, Error> {
        let config = Configuration::default();
        config.save_to_file(path)?;
        Ok(config)
    }

    /// Saves the configuration to the configuration file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be written.
    ///
    /// # Panics
    ///
    /// Will panic if the configuration cannot be encoded to TOML.
    pub fn save_to_file(&self, path: &str) -> Result<(), Error> {
        fs::write(path, self.to_toml()).map_err(|e| Error::UnableToLoadFromConfigFile { source: e })?;
        Ok(())
    }

    /// Encodes the configuration to TOML.
    fn to_toml(&self) -> String {
        toml::to_string(self).expect("Could not encode TOML value")
    }
}

#[cfg(test)]
mod tests {
    use torrust_dht_crawler_primitives::IpFamily;

    use crate::Configuration;

    fn default_config_toml() -> String {
        let config = r#"log_level = "info"
                        ip_family = "both"
                        max_neighbours = 10
                        dedup_capacity = 16384
                        results_channel_capacity = 20
                        bootstrap_nodes = [
                            "router.bittorrent.com:6881",
                            "dht.transmissionbt.com:6881",
                            "router.utorrent.com:6881",
                        ]
                        cidr_denylist = []

                        [[indexers]]
                        bind_address = "0.0.0.0:6881"
        "#
        .to_string();
        config
    }

    #[test]
    fn default_configuration_should_round_trip_through_toml() {
        let configuration = Configuration::default();

        let toml = toml::to_string(&configuration).expect("Could not encode TOML value");
        let reloaded = Configuration::load(&crate::Info { crawler_toml: toml }).expect("Failed to load configuration");

        assert_eq!(reloaded, configuration);
    }

    #[test]
    fn configuration_should_be_loaded_from_a_toml_config_string() {
        let info = crate::Info {
            crawler_toml: default_config_toml(),
        };

        let configuration = Configuration::load(&info).expect("Failed to load configuration");

        assert_eq!(configuration, Configuration::default());
    }

    #[test]
    fn configuration_should_allow_a_restricted_ip_family() {
        let toml = default_config_toml().replace("\"both\"", "\"v4-only\"");

        let configuration = Configuration::load(&crate::Info { crawler_toml: toml }).expect("Failed to load configuration");

        assert_eq!(configuration.ip_family, IpFamily::V4Only);
    }
}
