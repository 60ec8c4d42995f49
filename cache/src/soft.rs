use lru::LruCache;
use std::sync::Arc;
use tessera_matrix::MatrixBlock;

/// Identifies a soft cache entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    /// The released payload of an object.
    Payload(u64),
    /// The most recently read partition block of an object.
    Partition(u64),
}

/// Size-bounded LRU of payloads that may be dropped at any time.
///
/// Entries are weighed by their number of cells (at least one). Inserting past capacity evicts
/// least recently used entries until the cache fits again. An entry that alone exceeds the
/// capacity is never retained.
pub(crate) struct SoftCache {
    entries: LruCache<Key, Arc<MatrixBlock>>,
    capacity: u64,
    cells: u64,
}

fn weight(block: &MatrixBlock) -> u64 {
    block.cells().max(1)
}

impl SoftCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
            cells: 0,
        }
    }

    /// Insert `block` under `key`, replacing any previous entry.
    ///
    /// Returns the number of entries dropped to make room.
    pub fn insert(&mut self, key: Key, block: Arc<MatrixBlock>) -> usize {
        self.remove(&key);
        let added = weight(&block);
        if added > self.capacity {
            return 0;
        }
        let mut dropped = 0;
        while self.cells + added > self.capacity {
            let Some((_, old)) = self.entries.pop_lru() else {
                break;
            };
            self.cells -= weight(&old);
            dropped += 1;
        }
        self.cells += added;
        self.entries.put(key, block);
        dropped
    }

    /// Remove and return the entry for `key`.
    pub fn take(&mut self, key: &Key) -> Option<Arc<MatrixBlock>> {
        let block = self.entries.pop(key)?;
        self.cells -= weight(&block);
        Some(block)
    }

    /// Return the entry for `key` (marking it as recently used).
    pub fn get(&mut self, key: &Key) -> Option<Arc<MatrixBlock>> {
        self.entries.get(key).cloned()
    }

    pub fn remove(&mut self, key: &Key) -> bool {
        self.take(key).is_some()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains(key)
    }

    pub fn cells(&self) -> u64 {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cells = 0;
    }
}
