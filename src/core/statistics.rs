//! Structures to collect metrics about the crawler.
//!
//! Every counter is monotonic and updated with relaxed atomics: the numbers
//! feed a periodic log line, not control flow.
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the indexing nodes, the metadata sink and the manager.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Datagrams that failed to decode as KRPC.
    pub malformed_packets: AtomicU64,
    /// Messages and peers dropped by the address policy.
    pub policy_drops: AtomicU64,
    /// Infohash observations accepted from the DHT.
    pub observations: AtomicU64,
    /// Metadata exchanges started.
    pub leeches_started: AtomicU64,
    /// Metadata exchanges that failed before completion.
    pub leeches_failed: AtomicU64,
    /// Metadata exchanges aborted by a timeout.
    pub leech_timeouts: AtomicU64,
    /// Results handed to the output channel.
    pub results_emitted: AtomicU64,
    /// Results discarded because the output channel hit its hard ceiling.
    pub results_dropped: AtomicU64,
}

impl Metrics {
    pub fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            policy_drops: self.policy_drops.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            leeches_started: self.leeches_started.load(Ordering::Relaxed),
            leeches_failed: self.leeches_failed.load(Ordering::Relaxed),
            leech_timeouts: self.leech_timeouts.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            results_dropped: self.results_dropped.load(Ordering::Relaxed),
        }
    }
}

/// The frozen counter values of one [`Metrics::snapshot`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub malformed_packets: u64,
    pub policy_drops: u64,
    pub observations: u64,
    pub leeches_started: u64,
    pub leeches_failed: u64,
    pub leech_timeouts: u64,
    pub results_emitted: u64,
    pub results_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::Metrics;

    #[test]
    fn incremented_counters_show_up_in_the_snapshot() {
        let metrics = Metrics::default();

        Metrics::increment(&metrics.observations);
        Metrics::increment(&metrics.observations);
        Metrics::increment(&metrics.results_emitted);

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.observations, 2);
        assert_eq!(snapshot.results_emitted, 1);
        assert_eq!(snapshot.malformed_packets, 0);
    }
}
