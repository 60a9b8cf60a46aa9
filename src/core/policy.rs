//! The address policy applied to every DHT source and every announced peer.
//!
//! Three rules, checked before any traffic is acted on:
//!
//! - the configured [`IpFamily`] must permit the address family;
//! - the address must not fall into any denylisted CIDR block;
//! - announced peers must carry a sane port (no port 0, no reserved ports)
//!   and a routable address.
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use torrust_dht_crawler_primitives::IpFamily;

use crate::core::error::Error;

/// Lowest port accepted in a peer announcement. Everything below the
/// registered range is noise or an amplification attempt.
const MIN_PEER_PORT: u16 = 1024;

/// A parsed CIDR block, IPv4 or IPv6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    /// Returns `true` if `addr` lies inside this block. Addresses of the
    /// other family never match.
    #[must_use]
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(network), IpAddr::V4(addr)) => {
                prefix_matches(&network.octets(), &addr.octets(), self.prefix_len)
            }
            (IpAddr::V6(network), IpAddr::V6(addr)) => {
                prefix_matches(&network.octets(), &addr.octets(), self.prefix_len)
            }
            _ => false,
        }
    }
}

fn prefix_matches(network: &[u8], addr: &[u8], prefix_len: u8) -> bool {
    let full_bytes = usize::from(prefix_len / 8);
    let remaining_bits = prefix_len % 8;

    if network[..full_bytes] != addr[..full_bytes] {
        return false;
    }

    if remaining_bits == 0 {
        return true;
    }

    let mask = 0xFF_u8 << (8 - remaining_bits);
    (network[full_bytes] & mask) == (addr[full_bytes] & mask)
}

impl FromStr for Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCidr { cidr: s.to_string() };

        let (network, prefix_len) = s.split_once('/').ok_or_else(invalid)?;

        let network: IpAddr = network.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix_len.parse().map_err(|_| invalid())?;

        let max_prefix = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max_prefix {
            return Err(invalid());
        }

        Ok(Cidr { network, prefix_len })
    }
}

/// The crawler-wide address filter. Immutable after construction and shared
/// by the indexing nodes and the manager.
#[derive(Debug, Clone)]
pub struct AddressPolicy {
    family: IpFamily,
    denylist: Vec<Cidr>,
}

impl AddressPolicy {
    /// Parses the textual denylist once.
    ///
    /// # Errors
    ///
    /// Will return an [`Error::InvalidCidr`] for the first block that fails
    /// to parse.
    pub fn new(family: IpFamily, denylist: &[String]) -> Result<AddressPolicy, Error> {
        let denylist = denylist.iter().map(|block| block.parse()).collect::<Result<Vec<Cidr>, Error>>()?;

        Ok(AddressPolicy { family, denylist })
    }

    /// Whether a KRPC datagram from (or to) `source` may be processed.
    #[must_use]
    pub fn permits_source(&self, source: &SocketAddr) -> bool {
        source.port() != 0 && self.permits_ip(&source.ip())
    }

    /// Whether `peer` may be contacted for a metadata exchange. Stricter than
    /// [`Self::permits_source`]: unroutable addresses and reserved ports are
    /// rejected.
    #[must_use]
    pub fn permits_peer(&self, peer: &SocketAddr) -> bool {
        peer.port() >= MIN_PEER_PORT && !peer.ip().is_unspecified() && self.permits_ip(&peer.ip())
    }

    fn permits_ip(&self, ip: &IpAddr) -> bool {
        self.family.permits(ip) && !self.denylist.iter().any(|block| block.contains(ip))
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use torrust_dht_crawler_primitives::IpFamily;

    use super::{AddressPolicy, Cidr};
    use crate::core::error::Error;

    fn policy(family: IpFamily, denylist: &[&str]) -> AddressPolicy {
        let denylist: Vec<String> = denylist.iter().map(ToString::to_string).collect();
        AddressPolicy::new(family, &denylist).unwrap()
    }

    #[test]
    fn cidr_blocks_are_parsed_and_matched() {
        let block: Cidr = "10.0.0.0/8".parse().unwrap();

        assert!(block.contains(&"10.1.2.3".parse().unwrap()));
        assert!(!block.contains(&"11.1.2.3".parse().unwrap()));
        assert!(!block.contains(&"::1".parse().unwrap()));
    }

    #[test]
    fn cidr_prefixes_that_cross_a_byte_boundary_are_matched() {
        let block: Cidr = "192.0.2.0/25".parse().unwrap();

        assert!(block.contains(&"192.0.2.127".parse().unwrap()));
        assert!(!block.contains(&"192.0.2.128".parse().unwrap()));
    }

    #[test]
    fn a_whole_family_cidr_matches_everything_in_that_family() {
        let block: Cidr = "0.0.0.0/0".parse().unwrap();

        assert!(block.contains(&"203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn malformed_cidrs_are_a_setup_error() {
        for cidr in ["10.0.0.0", "10.0.0.0/33", "::/129", "banana/8", "10.0.0.0/x"] {
            assert_eq!(
                cidr.parse::<Cidr>().unwrap_err(),
                Error::InvalidCidr { cidr: cidr.to_string() }
            );
        }
    }

    #[test]
    fn denylisted_sources_are_dropped() {
        let policy = policy(IpFamily::Both, &["10.0.0.0/8"]);

        let denied: SocketAddr = "10.1.2.3:6881".parse().unwrap();
        let allowed: SocketAddr = "203.0.113.7:6881".parse().unwrap();

        assert!(!policy.permits_source(&denied));
        assert!(policy.permits_source(&allowed));
    }

    #[test]
    fn the_wrong_family_is_dropped() {
        let policy = policy(IpFamily::V4Only, &[]);

        let v6: SocketAddr = "[2001:db8::1]:6881".parse().unwrap();
        let v4: SocketAddr = "203.0.113.7:6881".parse().unwrap();

        assert!(!policy.permits_source(&v6));
        assert!(policy.permits_source(&v4));
    }

    #[test]
    fn peers_with_reserved_ports_are_dropped() {
        let policy = policy(IpFamily::Both, &[]);

        assert!(!policy.permits_peer(&"203.0.113.7:0".parse().unwrap()));
        assert!(!policy.permits_peer(&"203.0.113.7:80".parse().unwrap()));
        assert!(policy.permits_peer(&"203.0.113.7:1024".parse().unwrap()));
        assert!(policy.permits_peer(&"203.0.113.7:6881".parse().unwrap()));
    }

    #[test]
    fn unroutable_peers_are_dropped() {
        let policy = policy(IpFamily::Both, &[]);

        assert!(!policy.permits_peer(&"0.0.0.0:6881".parse().unwrap()));
    }
}
