//! Summaries describing a learned model and a clustering run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Size and usage figures of a [`crate::WordModel`].
///
/// Every figure is derived from the graph itself, so a freshly loaded model reports the same
/// numbers as the one that was saved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ModelStats {
    /// Number of graph nodes, sentinels included.
    pub nodes: usize,
    /// Number of distinct directed links.
    pub links: usize,
    /// Total number of tokens learned, sentinels included.
    pub tokens_learned: u64,
    /// Number of lines learned (visits of the START sentinel).
    pub lines_learned: u64,
    /// Number of distinct non-sentinel tokens.
    pub vocabulary: usize,
}

/// Metrics captured while building a dendrogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClusterMetrics {
    /// Number of words clustered.
    pub words: usize,
    /// Number of merges performed.
    pub merges: usize,
    /// Pair similarities served from the cache.
    pub cache_hits: u64,
    /// Pair similarities computed from the graph.
    pub cache_misses: u64,
    /// Times the cache was cleared after exceeding its capacity.
    pub cache_resets: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl ClusterMetrics {
    /// Share of lookups answered from the cache, zero before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / lookups as f64
    }
}
