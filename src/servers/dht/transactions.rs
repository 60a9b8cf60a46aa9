//! The table of outstanding KRPC queries.
//!
//! Every outbound query gets a random transaction id; a reply is only
//! processed when its id matches a pending entry. Entries expire after
//! [`TRANSACTION_TIMEOUT`] and are purged by the storm tick, or evicted
//! early when the table is full.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::servers::dht::messages::TransactionId;

/// How long a query may remain unanswered.
pub const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound of the table. A full table simply stops issuing queries for
/// a tick, so the bound only needs to cover a few storm bursts.
const MAX_PENDING: usize = 1024;

/// Context kept for one outstanding query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    /// Where the query was sent.
    pub target: SocketAddr,
    issued_at: Instant,
}

/// The bounded id -> pending-query table of one indexing node.
#[derive(Debug, Default)]
pub struct PendingQueries {
    entries: HashMap<Vec<u8>, Pending>,
}

impl PendingQueries {
    #[must_use]
    pub fn new() -> PendingQueries {
        PendingQueries::default()
    }

    /// Reserves a fresh transaction id for a query to `target`. Returns
    /// `None` when the table is full of still-live entries.
    pub fn register(&mut self, target: SocketAddr) -> Option<TransactionId> {
        if self.entries.len() >= MAX_PENDING {
            self.purge_expired();
            if self.entries.len() >= MAX_PENDING {
                return None;
            }
        }

        loop {
            let transaction_id = TransactionId::random();
            if self.entries.contains_key(&transaction_id.0) {
                continue;
            }

            self.entries.insert(
                transaction_id.0.clone(),
                Pending {
                    target,
                    issued_at: Instant::now(),
                },
            );

            return Some(transaction_id);
        }
    }

    /// Claims the pending entry for a reply. Expired entries count as absent.
    pub fn claim(&mut self, transaction_id: &TransactionId) -> Option<Pending> {
        let pending = self.entries.remove(&transaction_id.0)?;

        if pending.issued_at.elapsed() > TRANSACTION_TIMEOUT {
            return None;
        }

        Some(pending)
    }

    /// Drops every expired entry. Called once per storm tick.
    pub fn purge_expired(&mut self) {
        self.entries.retain(|_, pending| pending.issued_at.elapsed() <= TRANSACTION_TIMEOUT);
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
