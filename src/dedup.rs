//! Deduplication of raw credential lines
//!
//! The raw line text is the uniqueness key. Two strategies:
//! - Memory: single HashSet behind a lock
//! - Sharded: hash-partitioned sets for concurrent inserts

use ahash::RandomState;
use hashbrown::HashSet;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::RwLock;

/// Inputs with at least this many lines are deduplicated with sharded sets
pub const SHARDED_MIN_ITEMS: usize = 100_000;

/// Trait for deduplication implementations
pub trait Deduplicator: Send + Sync {
    /// Check if item is unique and add it if so
    /// Returns true if the item is unique (not seen before)
    fn insert(&self, item: &str) -> bool;

    /// Get the number of unique items
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory HashSet-based deduplicator
pub struct MemoryDeduplicator {
    set: RwLock<HashSet<String, RandomState>>,
}

impl MemoryDeduplicator {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            set: RwLock::new(HashSet::with_capacity_and_hasher(capacity, RandomState::new())),
        }
    }
}

impl Default for MemoryDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator for MemoryDeduplicator {
    fn insert(&self, item: &str) -> bool {
        let mut set = self.set.write().unwrap_or_else(|e| e.into_inner());
        if set.contains(item) {
            return false;
        }
        set.insert(item.to_string())
    }

    fn len(&self) -> usize {
        let set = self.set.read().unwrap_or_else(|e| e.into_inner());
        set.len()
    }
}

/// Sharded memory deduplicator for better parallel performance
pub struct ShardedDeduplicator {
    shards: Vec<RwLock<HashSet<String, RandomState>>>,
    hasher: RandomState,
}

impl ShardedDeduplicator {
    pub fn new(num_shards: usize) -> Self {
        Self::with_capacity(num_shards, 0)
    }

    pub fn with_capacity(num_shards: usize, capacity_per_shard: usize) -> Self {
        let shards = (0..num_shards.max(1))
            .map(|_| RwLock::new(HashSet::with_capacity_and_hasher(capacity_per_shard, RandomState::new())))
            .collect();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Size the shards for roughly `expected_items` entries
    pub fn for_items(expected_items: usize) -> Self {
        let num_shards = num_cpus::get() * 4;
        Self::with_capacity(num_shards, expected_items / num_shards)
    }

    fn get_shard_index(&self, item: &str) -> usize {
        let mut hasher = self.hasher.build_hasher();
        item.hash(&mut hasher);
        hasher.finish() as usize % self.shards.len()
    }
}

impl Deduplicator for ShardedDeduplicator {
    fn insert(&self, item: &str) -> bool {
        let shard_idx = self.get_shard_index(item);
        let mut shard = self.shards[shard_idx].write().unwrap_or_else(|e| e.into_inner());
        if shard.contains(item) {
            return false;
        }
        shard.insert(item.to_string())
    }

    fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }
}

/// Keep the first occurrence of every line, in input order
pub fn dedup_lines(lines: Vec<String>, dedup: &dyn Deduplicator) -> Vec<String> {
    lines.into_iter().filter(|line| dedup.insert(line)).collect()
}

/// Deduplicate with a freshly sized set; large inputs get a sharded one
pub fn dedup(lines: Vec<String>) -> Vec<String> {
    if lines.len() < SHARDED_MIN_ITEMS {
        let dedup = MemoryDeduplicator::with_capacity(lines.len());
        dedup_lines(lines, &dedup)
    } else {
        let dedup = ShardedDeduplicator::for_items(lines.len());
        dedup_lines(lines, &dedup)
    }
}
