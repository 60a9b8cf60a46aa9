//! The bounded set of recently emitted infohashes.
//!
//! The crawler sees the same infohash announced over and over; only the first
//! completed metadata exchange per dedup window may produce a result. The set
//! is only updated when a result is actually emitted, so a failed exchange
//! leaves the infohash eligible for another attempt.
use std::num::NonZeroUsize;

use lru::LruCache;
use torrust_dht_crawler_primitives::info_hash::InfoHash;

/// An LRU set of infohashes with a fixed capacity.
#[derive(Debug)]
pub struct DedupSet {
    cache: LruCache<InfoHash, ()>,
}

impl DedupSet {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> DedupSet {
        DedupSet {
            cache: LruCache::new(capacity),
        }
    }

    /// Membership test. A hit refreshes the entry's recency.
    pub fn contains(&mut self, info_hash: &InfoHash) -> bool {
        self.cache.get(info_hash).is_some()
    }

    /// Marks an infohash as emitted, evicting the least recently used entry
    /// when the set is full.
    pub fn insert(&mut self, info_hash: InfoHash) {
        self.cache.put(info_hash, ());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use torrust_dht_crawler_primitives::info_hash::InfoHash;

    use super::DedupSet;

    fn info_hash(byte: u8) -> InfoHash {
        InfoHash([byte; 20])
    }

    #[test]
    fn an_inserted_infohash_is_a_member() {
        let mut set = DedupSet::new(NonZeroUsize::new(4).unwrap());

        set.insert(info_hash(0xAA));

        assert!(set.contains(&info_hash(0xAA)));
        assert!(!set.contains(&info_hash(0xBB)));
    }

    #[test]
    fn at_capacity_the_oldest_entry_is_evicted() {
        let mut set = DedupSet::new(NonZeroUsize::new(2).unwrap());

        set.insert(info_hash(1));
        set.insert(info_hash(2));
        set.insert(info_hash(3));

        assert!(!set.contains(&info_hash(1)));
        assert!(set.contains(&info_hash(2)));
        assert!(set.contains(&info_hash(3)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn no_false_negatives_within_capacity() {
        let mut set = DedupSet::new(NonZeroUsize::new(64).unwrap());

        for byte in 0..64 {
            set.insert(info_hash(byte));
        }
        for byte in 0..64 {
            assert!(set.contains(&info_hash(byte)));
        }
    }
}
