//! Crawler configuration factories for testing.
use torrust_dht_crawler_configuration::{Configuration, Indexer};
use torrust_dht_crawler_primitives::IpFamily;

/// This configuration is used for testing. It binds to the loopback interface
/// with ephemeral ports so test runs do not collide, and it keeps the crawler
/// off the public DHT by leaving the bootstrap list empty.
///
/// > **NOTICE**: This configuration is not meant to be used in production.
///
/// > **NOTICE**: Port 0 is used for ephemeral ports, which means that the OS
/// > will assign a random free port for each indexing node.
#[must_use]
pub fn ephemeral() -> Configuration {
    Configuration {
        log_level: Some(String::from("off")), // Change to `debug` for tests debugging
        bootstrap_nodes: Vec::new(),
        indexers: vec![Indexer {
            bind_address: String::from("127.0.0.1:0"),
        }],
        ..Configuration::default()
    }
}

/// Ephemeral configuration restricted to IPv4.
#[must_use]
pub fn ephemeral_ipv4_only() -> Configuration {
    let mut cfg = ephemeral();

    cfg.ip_family = IpFamily::V4Only;

    cfg
}

/// Ephemeral configuration with a CIDR denylist.
#[must_use]
pub fn ephemeral_with_denylist(denylist: &[&str]) -> Configuration {
    let mut cfg = ephemeral();

    cfg.cidr_denylist = denylist.iter().map(ToString::to_string).collect();

    cfg
}
