//! Hit/miss/eviction accounting.
//!
//! Counters are owned by the owner task and only ever mutated there, so
//! increments arriving from many callers never race. Snapshots are therefore
//! eventually consistent with the operations that produced them.

use serde::Serialize;

/// A counter update reported by a cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsEvent {
    Hit,
    Miss,
    Evicted(u64),
}

/// Monotonic counters, reset only when the owner is restarted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsCollector {
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: StatsEvent) {
        match event {
            StatsEvent::Hit => self.hits = self.hits.saturating_add(1),
            StatsEvent::Miss => self.misses = self.misses.saturating_add(1),
            StatsEvent::Evicted(n) => self.evictions = self.evictions.saturating_add(n),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Combine the counters with the table's current size into a snapshot.
    pub fn snapshot(&self, size: usize, memory_bytes: usize) -> CacheStats {
        CacheStats {
            size,
            memory_bytes,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            hit_rate: hit_rate(self.hits, self.misses),
        }
    }
}

/// Read-only view of cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently in the table.
    pub size: usize,
    /// Approximate memory held by keys and payloads.
    pub memory_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Percentage of lookups that hit, rounded to two decimals.
    pub hit_rate: f64,
}

/// `hits / (hits + misses) * 100`, rounded to two decimals; `0.0` with no
/// lookups.
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    let pct = hits as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
