//! The bounded neighbour pool of one indexing node.
//!
//! There is no routing table and no notion of buckets: the pool is an
//! insertion-ordered ring of recently seen nodes, fed by the `nodes` payloads
//! of incoming replies and drained by the `find_node` storm. When the pool is
//! full the oldest entry is evicted.
use std::collections::VecDeque;

use rand::seq::SliceRandom;

use crate::servers::dht::compact::NodeEntry;

/// A FIFO ring of DHT nodes with a fixed capacity.
#[derive(Debug)]
pub struct NeighbourPool {
    entries: VecDeque<NodeEntry>,
    capacity: usize,
}

impl NeighbourPool {
    #[must_use]
    pub fn new(capacity: usize) -> NeighbourPool {
        NeighbourPool {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a node, evicting the oldest entry when full. Nodes already in
    /// the pool are not duplicated.
    pub fn insert(&mut self, entry: NodeEntry) {
        if self.entries.iter().any(|present| present.addr == entry.addr) {
            return;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(entry);
    }

    /// Up to `count` distinct nodes, in random order.
    #[must_use]
    pub fn sample(&self, count: usize) -> Vec<NodeEntry> {
        let entries: Vec<&NodeEntry> = self.entries.iter().collect();

        entries
            .choose_multiple(&mut rand::thread_rng(), count.min(entries.len()))
            .map(|entry| **entry)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
