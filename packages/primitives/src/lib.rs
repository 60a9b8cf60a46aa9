//! Primitive types shared by the Torrust DHT crawler packages.
//!
//! This package contains the identifier types of the Mainline DHT and the
//! crawler's IP family policy:
//!
//! - [`InfoHash`](crate::info_hash::InfoHash): the SHA-1 of a torrent's
//!   bencoded `info` dictionary. It is the key torrents are announced and
//!   looked up under.
//! - [`NodeId`](crate::node_id::NodeId): the 20-byte identifier of a DHT
//!   participant. XOR distance between two ids defines proximity.
//! - [`IpFamily`]: which address families the crawler is willing to talk to.
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub mod info_hash;
pub mod node_id;

/// The IP address families the crawler accepts for both DHT traffic and
/// metadata exchanges.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IpFamily {
    /// Only IPv4 sources and targets.
    V4Only,
    /// Only IPv6 sources and targets.
    V6Only,
    /// No family restriction.
    #[default]
    Both,
}

impl IpFamily {
    /// Returns `true` if addresses of this family may be used.
    #[must_use]
    pub fn permits(&self, addr: &IpAddr) -> bool {
        match self {
            IpFamily::V4Only => addr.is_ipv4(),
            IpFamily::V6Only => addr.is_ipv6(),
            IpFamily::Both => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use crate::IpFamily;

    #[test]
    fn ip_family_restricts_the_other_family() {
        let v4 = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);

        assert!(IpFamily::V4Only.permits(&v4));
        assert!(!IpFamily::V4Only.permits(&v6));
        assert!(!IpFamily::V6Only.permits(&v4));
        assert!(IpFamily::V6Only.permits(&v6));
        assert!(IpFamily::Both.permits(&v4));
        assert!(IpFamily::Both.permits(&v6));
    }
}
