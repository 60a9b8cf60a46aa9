//! The DHT indexing engine.
//!
//! The crawler joins the Mainline DHT ([BEP 5](https://www.bittorrent.org/beps/bep_0005.html))
//! as a pool of lightweight indexing nodes. A node does not keep a routing
//! table and does not answer lookups usefully; its only goal is to be told
//! about infohashes. To that end it:
//!
//! - floods the network with `find_node` queries to make itself known
//!   ([`server`]);
//! - forges its sender id per conversation so remote nodes consider it one
//!   of their closest neighbours ([`handlers`]);
//! - answers `get_peers` and `announce_peer` with the minimal replies that
//!   keep remote nodes talking, and harvests the infohashes those queries
//!   disclose.
use std::time::Duration;

pub mod compact;
pub mod error;
pub mod handlers;
pub mod messages;
pub mod pool;
pub mod server;
pub mod transactions;

/// Maximum UDP datagram size processed by an indexing node.
pub const MAX_PACKET_SIZE: usize = 1496;

/// Cadence of the `find_node` storm.
pub const STORM_INTERVAL: Duration = Duration::from_secs(1);

/// Queries sent per storm tick.
pub const STORM_BURST: usize = 8;

/// Length of the opaque token returned to `get_peers` callers.
pub const TOKEN_LENGTH: usize = 8;
