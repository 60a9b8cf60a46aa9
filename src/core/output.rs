//! The crawler's results channel.
//!
//! A bounded FIFO between the manager and whatever consumes the crawl. The
//! consumer is expected to be slower than the DHT: when the channel fills up
//! its capacity doubles instead of blocking the crawl, up to a hard ceiling.
//! At the ceiling the oldest unread result is discarded and counted. Results
//! are never re-ordered.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::core::statistics::Metrics;
use crate::core::IndexingResult;

/// The channel never grows beyond this many buffered results.
pub const HARD_CAPACITY_LIMIT: usize = 1 << 16;

#[derive(Debug)]
struct Inner {
    queue: VecDeque<IndexingResult>,
    capacity: usize,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
}

/// Creates a results channel with the given initial capacity.
#[must_use]
pub fn results_channel(capacity: usize, stats: Arc<Metrics>) -> (ResultsSender, ResultsReceiver) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            closed: false,
        }),
        notify: Notify::new(),
    });

    (
        ResultsSender {
            shared: shared.clone(),
            stats,
        },
        ResultsReceiver { shared },
    )
}

/// The manager-side handle of the results channel.
#[derive(Debug)]
pub struct ResultsSender {
    shared: Arc<Shared>,
    stats: Arc<Metrics>,
}

impl ResultsSender {
    /// Enqueues a result. Returns `false` if the channel has been closed.
    ///
    /// A full channel grows by doubling its capacity. Once the capacity has
    /// reached [`HARD_CAPACITY_LIMIT`] the oldest unread result is dropped
    /// instead, and the drop is counted.
    pub fn send(&self, result: IndexingResult) -> bool {
        let mut inner = self.shared.inner.lock().expect("results channel lock poisoned");

        if inner.closed {
            return false;
        }

        if inner.queue.len() >= inner.capacity {
            if inner.capacity < HARD_CAPACITY_LIMIT {
                inner.capacity = (inner.capacity * 2).min(HARD_CAPACITY_LIMIT);
            } else {
                inner.queue.pop_front();
                Metrics::increment(&self.stats.results_dropped);
            }
        }

        inner.queue.push_back(result);
        drop(inner);

        self.shared.notify.notify_one();
        true
    }

    /// Closes the channel. Buffered results stay readable; the receiver gets
    /// `None` once the queue is drained.
    pub fn close(&self) {
        self.shared.inner.lock().expect("results channel lock poisoned").closed = true;
        self.shared.notify.notify_one();
    }

    /// The current capacity, for the statistics log line.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.inner.lock().expect("results channel lock poisoned").capacity
    }
}

/// The consumer-side handle of the results channel.
#[derive(Debug)]
pub struct ResultsReceiver {
    shared: Arc<Shared>,
}

impl ResultsReceiver {
    /// Waits for the next result. Returns `None` once the channel is closed
    /// and drained.
    pub async fn recv(&mut self) -> Option<IndexingResult> {
        loop {
            {
                let mut inner = self.shared.inner.lock().expect("results channel lock poisoned");
                if let Some(result) = inner.queue.pop_front() {
                    return Some(result);
                }
                if inner.closed {
                    return None;
                }
            }

            // `notify_one` stores a permit, so a send racing with this await
            // cannot be missed.
            self.shared.notify.notified().await;
        }
    }

    /// Non-blocking receive, used by tests and the drain path.
    pub fn try_recv(&mut self) -> Option<IndexingResult> {
        self.shared.inner.lock().expect("results channel lock poisoned").queue.pop_front()
    }
}
