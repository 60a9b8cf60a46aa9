//! Codecs for the compact binary formats of BEP 5.
//!
//! Node lists pack `(node id, IP, port)` into fixed-width records: 26 bytes
//! per IPv4 node, 38 per IPv6 node. Peer lists pack `(IP, port)` into 6 or 18
//! bytes. Parsers accept arbitrary concatenations and reject truncated tails
//! without keeping any partial entries.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use torrust_dht_crawler_primitives::node_id::NodeId;

use crate::servers::dht::error::Error;

/// Wire size of one IPv4 node record.
pub const NODE_INFO_V4_LEN: usize = 26;

/// Wire size of one IPv6 node record.
pub const NODE_INFO_V6_LEN: usize = 38;

/// One entry of a `nodes`/`nodes6` reply payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    pub id: NodeId,
    pub addr: SocketAddr,
}

/// Parses a concatenation of 26-byte IPv4 node records.
///
/// # Errors
///
/// Will return [`Error::TruncatedCompactNodeInfo`] if the payload is not a
/// multiple of the record size. No partial entries are returned.
pub fn parse_nodes_v4(bytes: &[u8]) -> Result<Vec<NodeEntry>, Error> {
    if bytes.len() % NODE_INFO_V4_LEN != 0 {
        return Err(Error::TruncatedCompactNodeInfo);
    }

    Ok(bytes
        .chunks_exact(NODE_INFO_V4_LEN)
        .map(|chunk| {
            let id = NodeId::try_from(&chunk[0..20]).expect("chunk carries exactly 20 id bytes");
            let ip = Ipv4Addr::new(chunk[20], chunk[21], chunk[22], chunk[23]);
            let port = u16::from_be_bytes([chunk[24], chunk[25]]);

            NodeEntry {
                id,
                addr: SocketAddr::new(IpAddr::V4(ip), port),
            }
        })
        .collect())
}

/// Parses a concatenation of 38-byte IPv6 node records.
///
/// # Errors
///
/// Will return [`Error::TruncatedCompactNodeInfo`] if the payload is not a
/// multiple of the record size. No partial entries are returned.
pub fn parse_nodes_v6(bytes: &[u8]) -> Result<Vec<NodeEntry>, Error> {
    if bytes.len() % NODE_INFO_V6_LEN != 0 {
        return Err(Error::TruncatedCompactNodeInfo);
    }

    Ok(bytes
        .chunks_exact(NODE_INFO_V6_LEN)
        .map(|chunk| {
            let id = NodeId::try_from(&chunk[0..20]).expect("chunk carries exactly 20 id bytes");
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&chunk[20..36]);
            let port = u16::from_be_bytes([chunk[36], chunk[37]]);

            NodeEntry {
                id,
                addr: SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port),
            }
        })
        .collect())
}

/// Encodes node entries into the compact form matching `want_v6`. Entries of
/// the other family are skipped.
#[must_use]
pub fn encode_nodes(entries: &[NodeEntry], want_v6: bool) -> Vec<u8> {
    let mut bytes = Vec::new();

    for entry in entries {
        match (entry.addr.ip(), want_v6) {
            (IpAddr::V4(ip), false) => {
                bytes.extend_from_slice(&entry.id.bytes());
                bytes.extend_from_slice(&ip.octets());
                bytes.extend_from_slice(&entry.addr.port().to_be_bytes());
            }
            (IpAddr::V6(ip), true) => {
                bytes.extend_from_slice(&entry.id.bytes());
                bytes.extend_from_slice(&ip.octets());
                bytes.extend_from_slice(&entry.addr.port().to_be_bytes());
            }
            _ => (),
        }
    }

    bytes
}

/// Parses one compact peer record: 6 bytes for IPv4, 18 for IPv6.
///
/// # Errors
///
/// Will return [`Error::InvalidCompactPeerInfo`] for any other length.
pub fn parse_peer(bytes: &[u8]) -> Result<SocketAddr, Error> {
    match bytes.len() {
        6 => {
            let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
            let port = u16::from_be_bytes([bytes[4], bytes[5]]);
            Ok(SocketAddr::new(IpAddr::V4(ip), port))
        }
        18 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&bytes[0..16]);
            let port = u16::from_be_bytes([bytes[16], bytes[17]]);
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        len => Err(Error::InvalidCompactPeerInfo { len }),
    }
}

/// Encodes one peer into its compact form.
#[must_use]
pub fn encode_peer(addr: &SocketAddr) -> Vec<u8> {
    let mut bytes = Vec::new();

    match addr.ip() {
        IpAddr::V4(ip) => bytes.extend_from_slice(&ip.octets()),
        IpAddr::V6(ip) => bytes.extend_from_slice(&ip.octets()),
    }
    bytes.extend_from_slice(&addr.port().to_be_bytes());

    bytes
}
