//! The DHT indexing node: one UDP socket plus the harvesting loop.
//!
//! There are two main types in this module:
//!
//! - [`IndexingNode`]: a controller to start and stop one node. It is a state
//!   machine over a fixed configuration: starting a `IndexingNode<Stopped>`
//!   yields a `IndexingNode<Running>` and vice versa.
//! - [`Harvester`]: the loop itself, owned by the spawned task.
//!
//! The loop multiplexes two events: the storm ticker (once per second it
//! sprays `find_node` queries at a sample of the neighbour pool) and the
//! socket (inbound queries are answered with a forged identity, inbound
//! replies refill the pool). Observations flow out through a bounded channel
//! to the manager; everything else stays inside the task.
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use torrust_dht_crawler_primitives::node_id::NodeId;
use tracing::{debug, info, trace, warn};

use crate::core::policy::AddressPolicy;
use crate::core::statistics::Metrics;
use crate::core::Observation;
use crate::servers::dht::compact::NodeEntry;
use crate::servers::dht::handlers::handle_message;
use crate::servers::dht::messages::{Message, Query};
use crate::servers::dht::pool::NeighbourPool;
use crate::servers::dht::transactions::PendingQueries;
use crate::servers::dht::{MAX_PACKET_SIZE, STORM_BURST, STORM_INTERVAL};
use crate::servers::signals::{shutdown_signal, Halted};

/// Error that can occur when starting or stopping an indexing node.
#[derive(Error, Debug)]
pub enum Error {
    #[error("could not bind the indexing socket: {0}")]
    Bind(std::io::Error),

    #[error("could not send the halt signal to the indexing node task")]
    Halt,
}

/// The per-node knobs taken from the configuration.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Neighbour pool bound.
    pub max_neighbours: usize,
    /// Hostnames seeding the pool, resolved at startup.
    pub bootstrap_nodes: Vec<String>,
}

/// An indexing node controller with no harvesting task running.
#[allow(clippy::module_name_repetitions)]
pub type StoppedIndexingNode = IndexingNode<Stopped>;

/// An indexing node controller with a running harvesting task.
#[allow(clippy::module_name_repetitions)]
pub type RunningIndexingNode = IndexingNode<Running>;

/// A DHT indexing node controller.
///
/// It keeps the node configuration and the `running` or `stopped` state, and
/// allows moving between the states without changing the configuration.
pub struct IndexingNode<S> {
    /// The address the UDP socket is bound to when the node runs.
    pub bind_address: SocketAddr,
    /// The node configuration applied on every start.
    pub settings: NodeSettings,
    /// The state of the node: `running` or `stopped`.
    pub state: S,
}

/// A stopped indexing node state.
pub struct Stopped;

/// A running indexing node state.
pub struct Running {
    /// The address the socket actually bound to (relevant with port 0).
    pub local_addr: SocketAddr,
    halt_sender: oneshot::Sender<Halted>,
    task: JoinHandle<()>,
}

impl IndexingNode<Stopped> {
    #[must_use]
    pub fn new(bind_address: SocketAddr, settings: NodeSettings) -> IndexingNode<Stopped> {
        IndexingNode {
            bind_address,
            settings,
            state: Stopped {},
        }
    }

    /// Binds the socket and spawns the harvesting task.
    ///
    /// # Errors
    ///
    /// Will return an [`Error::Bind`] if the socket cannot be bound.
    pub async fn start(
        self,
        policy: Arc<AddressPolicy>,
        stats: Arc<Metrics>,
        observations: mpsc::Sender<Observation>,
    ) -> Result<IndexingNode<Running>, Error> {
        let socket = UdpSocket::bind(self.bind_address).await.map_err(Error::Bind)?;
        let local_addr = socket.local_addr().map_err(Error::Bind)?;

        let (halt_sender, rx_halt) = oneshot::channel::<Halted>();

        let harvester = Harvester::new(socket, self.settings.clone(), policy, stats, observations);

        let task = tokio::spawn(async move {
            harvester.run(shutdown_signal(rx_halt)).await;
        });

        info!("Started DHT indexing node on: udp://{local_addr}");

        Ok(IndexingNode {
            bind_address: self.bind_address,
            settings: self.settings,
            state: Running {
                local_addr,
                halt_sender,
                task,
            },
        })
    }
}

impl IndexingNode<Running> {
    /// The address the node is listening on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.state.local_addr
    }

    /// Signals the harvesting task to stop and waits for it.
    ///
    /// # Errors
    ///
    /// Will return an [`Error::Halt`] if the halt signal was already sent.
    pub async fn stop(self) -> Result<IndexingNode<Stopped>, Error> {
        self.state.halt_sender.send(Halted::Normal).map_err(|_| Error::Halt)?;

        drop(self.state.task.await);

        Ok(IndexingNode {
            bind_address: self.bind_address,
            settings: self.settings,
            state: Stopped {},
        })
    }
}

/// The harvesting loop of one indexing node.
struct Harvester {
    socket: Arc<UdpSocket>,
    settings: NodeSettings,
    policy: Arc<AddressPolicy>,
    stats: Arc<Metrics>,
    observations: mpsc::Sender<Observation>,
    pending: PendingQueries,
    pool: NeighbourPool,
    bootstrap: Vec<NodeEntry>,
}

impl Harvester {
    fn new(
        socket: UdpSocket,
        settings: NodeSettings,
        policy: Arc<AddressPolicy>,
        stats: Arc<Metrics>,
        observations: mpsc::Sender<Observation>,
    ) -> Harvester {
        let pool = NeighbourPool::new(settings.max_neighbours);

        Harvester {
            socket: Arc::new(socket),
            settings,
            policy,
            stats,
            observations,
            pending: PendingQueries::new(),
            pool,
            bootstrap: Vec::new(),
        }
    }

    async fn run<F>(mut self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        // Pin the future so that it doesn't move to the first loop iteration.
        futures::pin_mut!(shutdown);

        self.bootstrap = self.resolve_bootstrap().await;

        let mut ticker = tokio::time::interval(STORM_INTERVAL);

        loop {
            let socket = self.socket.clone();
            let mut data = [0; MAX_PACKET_SIZE];

            tokio::select! {
                () = &mut shutdown => {
                    info!("Stopping DHT indexing node: {} ...", self.local_addr_display());
                    break;
                }
                _ = ticker.tick() => {
                    self.storm().await;
                }
                result = socket.recv_from(&mut data) => {
                    match result {
                        Ok((valid_bytes, remote_addr)) => self.handle_datagram(&data[..valid_bytes], remote_addr).await,
                        // Reads can fail transiently (ICMP port unreachable);
                        // only a closed socket would end the loop, and that
                        // is driven by the shutdown signal instead.
                        Err(e) => debug!("recoverable socket read error: {e}"),
                    }
                }
            }
        }
    }

    /// One burst of `find_node` queries. The pool feeds the burst; while it
    /// is empty (startup, starvation) the bootstrap nodes are used instead.
    async fn storm(&mut self) {
        self.pending.purge_expired();

        let targets = if self.pool.is_empty() {
            self.bootstrap.clone()
        } else {
            self.pool.sample(STORM_BURST)
        };

        for entry in targets {
            let Some(transaction_id) = self.pending.register(entry.addr) else {
                break;
            };

            let query = Query::FindNode {
                id: NodeId::neighbour_of(&entry.id),
                target: NodeId::random(),
            };

            self.send(&Message::query(transaction_id, query), entry.addr).await;
        }
    }

    async fn handle_datagram(&mut self, data: &[u8], remote_addr: SocketAddr) {
        if !self.policy.permits_source(&remote_addr) {
            Metrics::increment(&self.stats.policy_drops);
            return;
        }

        let message = match Message::decode(data) {
            Ok(message) => message,
            Err(e) => {
                Metrics::increment(&self.stats.malformed_packets);
                trace!("dropping malformed datagram from {remote_addr}: {e}");
                return;
            }
        };

        trace!("handling {} bytes from {remote_addr}", data.len());

        let handled = handle_message(message, remote_addr, &mut self.pending);

        if let Some(reply) = handled.reply {
            self.send(&reply, remote_addr).await;
        }

        for entry in handled.harvested {
            if self.reachable(&entry.addr) {
                self.pool.insert(entry);
            }
        }

        if let Some(observation) = handled.observation {
            if self.observations.send(observation).await.is_err() {
                debug!("the manager is gone; discarding an observation");
            }
        }
    }

    /// A harvested node is only useful if the policy allows it and this
    /// socket's address family can reach it.
    fn reachable(&self, addr: &SocketAddr) -> bool {
        self.policy.permits_source(addr) && addr.is_ipv4() == self.socket.local_addr().map_or(true, |local| local.is_ipv4())
    }

    async fn send(&self, message: &Message, to: SocketAddr) {
        // Losing a datagram only costs a little harvest rate.
        drop(self.socket.send_to(&message.encode(), to).await);
    }

    async fn resolve_bootstrap(&self) -> Vec<NodeEntry> {
        let mut entries = Vec::new();

        for host in &self.settings.bootstrap_nodes {
            match tokio::net::lookup_host(host.as_str()).await {
                Ok(addrs) => {
                    // The resolved node ids are unknown until a node answers,
                    // so the forged sender derives from a placeholder.
                    entries.extend(
                        addrs
                            .filter(|addr| self.reachable(addr))
                            .map(|addr| NodeEntry { id: NodeId::random(), addr }),
                    );
                }
                Err(e) => warn!("could not resolve bootstrap node {host}: {e}"),
            }
        }

        if entries.is_empty() && !self.settings.bootstrap_nodes.is_empty() {
            warn!("no bootstrap node resolved; the node relies on inbound traffic only");
        }

        entries
    }

    fn local_addr_display(&self) -> String {
        self.socket
            .local_addr()
            .map_or_else(|_| String::from("unknown"), |addr| addr.to_string())
    }
}
