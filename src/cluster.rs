//! Agglomerative clustering of the vocabulary by transition similarity.
//!
//! Every vocabulary word starts as a singleton. Each iteration scores all pairs of live
//! clusters, merges the best pair, and gives the survivor a fresh [`ClusterId`]. Because
//! identifiers are never reused, a cached score can only ever describe the exact pair of
//! word sets it was computed for. The full merge sequence is kept as a [`Dendrogram`] that
//! can be cut into a flat partition.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::error::{Result, WeaveError};
use crate::graph::WordGraph;
use crate::metrics::ClusterMetrics;
use crate::token::Token;

/// Version stamp of a cluster; a new one is issued whenever a cluster changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(u64);

impl ClusterId {
    /// Raw identifier value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A set of words together with its current identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    id: ClusterId,
    words: BTreeSet<Token>,
}

impl Cluster {
    fn singleton(id: ClusterId, word: Token) -> Self {
        Self {
            id,
            words: BTreeSet::from([word]),
        }
    }

    /// Current identifier.
    #[must_use]
    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// Member words in token order.
    #[must_use]
    pub fn words(&self) -> &BTreeSet<Token> {
        &self.words
    }

    /// Number of member words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// `true` for a cluster without words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Similarity of two clusters.
///
/// The weighted mean of [`WordGraph::similarity`] over every cross pair of words present in
/// the graph, each pair weighted by `√(c1² + c2²)` of the words' visit counts. Zero when no
/// cross pair carries weight.
#[must_use]
pub fn cluster_similarity(graph: &WordGraph, a: &Cluster, b: &Cluster) -> f64 {
    let mut weighted = 0.0;
    let mut weights = 0.0;
    for left in &a.words {
        let Some(left_node) = graph.node(left) else {
            continue;
        };
        for right in &b.words {
            let Some(right_node) = graph.node(right) else {
                continue;
            };
            let weight = f64::from(left_node.count()).hypot(f64::from(right_node.count()));
            weighted += weight * graph.similarity(left, right);
            weights += weight;
        }
    }
    if weights > 0.0 {
        weighted / weights
    } else {
        0.0
    }
}

/// One agglomeration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    /// Identifier of the surviving (larger) cluster before the merge.
    pub survivor: ClusterId,
    /// Identifier of the absorbed cluster.
    pub absorbed: ClusterId,
    /// Identifier issued to the merged cluster.
    pub merged: ClusterId,
    /// Similarity of the two clusters when they were merged.
    pub similarity: f64,
    /// Number of words in the merged cluster.
    pub size: usize,
}

/// Full merge history of a clustering run.
///
/// Leaf `i` carries `ClusterId(i)`; each merge issues the next identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dendrogram {
    leaves: Vec<Token>,
    merges: Vec<Merge>,
}

impl Dendrogram {
    /// Clustered words in leaf order.
    #[must_use]
    pub fn leaves(&self) -> &[Token] {
        &self.leaves
    }

    /// Merges in the order they were performed.
    #[must_use]
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// The final cluster holding every word, or `None` for an empty vocabulary.
    #[must_use]
    pub fn root(&self) -> Option<Vec<Token>> {
        if self.leaves.is_empty() {
            return None;
        }
        let mut words = self.leaves.clone();
        words.sort();
        Some(words)
    }

    /// Partition produced by replaying merges in order until the first one whose similarity
    /// falls below `threshold`.
    ///
    /// Average linkage is not monotone, so a later merge may score higher than an earlier
    /// one. Replay stops at the first miss so every group is a subtree of the dendrogram.
    #[must_use]
    pub fn cut_threshold(&self, threshold: f64) -> Vec<Vec<Token>> {
        self.partition(self.merges.iter().take_while(|merge| merge.similarity >= threshold))
    }

    /// Partition with `clusters` groups (at least one), replaying merges in order.
    #[must_use]
    pub fn cut_count(&self, clusters: usize) -> Vec<Vec<Token>> {
        let applied = self.leaves.len().saturating_sub(clusters.max(1));
        self.partition(self.merges.iter().take(applied))
    }

    /// Groups are sorted internally; larger groups come first, ties by first word.
    fn partition<'a>(&self, applied: impl Iterator<Item = &'a Merge>) -> Vec<Vec<Token>> {
        // Representative leaf of every identifier the run ever issued.
        let mut leaf_of: FxHashMap<ClusterId, usize> = (0..self.leaves.len())
            .map(|idx| (ClusterId(idx as u64), idx))
            .collect();
        for merge in &self.merges {
            if let Some(&leaf) = leaf_of.get(&merge.survivor) {
                leaf_of.insert(merge.merged, leaf);
            }
        }

        let mut sets = DisjointSets::new(self.leaves.len());
        for merge in applied {
            let survivor = leaf_of.get(&merge.survivor);
            let absorbed = leaf_of.get(&merge.absorbed);
            if let (Some(&a), Some(&b)) = (survivor, absorbed) {
                sets.union(a, b);
            }
        }

        let mut groups: FxHashMap<usize, Vec<Token>> = FxHashMap::default();
        for (idx, word) in self.leaves.iter().enumerate() {
            groups.entry(sets.find(idx)).or_default().push(word.clone());
        }
        let mut groups: Vec<Vec<Token>> = groups.into_values().collect();
        for group in &mut groups {
            group.sort();
        }
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));
        groups
    }
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut idx: usize) -> usize {
        while self.parent[idx] != idx {
            self.parent[idx] = self.parent[self.parent[idx]];
            idx = self.parent[idx];
        }
        idx
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[b.max(a)] = a.min(b);
        }
    }
}

/// Clusters the vocabulary of `graph`.
pub fn cluster(graph: &WordGraph, config: &ClusterConfig) -> Result<(Dendrogram, ClusterMetrics)> {
    Clusterer::new(graph, config.clone())?.run()
}

/// One clustering run over a borrowed graph, owning its similarity cache.
#[derive(Debug)]
pub struct Clusterer<'g> {
    graph: &'g WordGraph,
    config: ClusterConfig,
    cache: FxHashMap<(ClusterId, ClusterId), f64>,
    metrics: ClusterMetrics,
}

impl<'g> Clusterer<'g> {
    /// Prepares a run after validating `config`.
    pub fn new(graph: &'g WordGraph, config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            graph,
            config,
            cache: FxHashMap::default(),
            metrics: ClusterMetrics::default(),
        })
    }

    /// Merges down to a single cluster and returns the history.
    pub fn run(mut self) -> Result<(Dendrogram, ClusterMetrics)> {
        let started = Instant::now();
        let leaves: Vec<Token> = self
            .graph
            .nodes()
            .map(|(_, node)| node.token())
            .filter(|token| self.config.include_sentinels || !token.is_sentinel())
            .cloned()
            .collect();
        let mut live: Vec<Cluster> = leaves
            .iter()
            .enumerate()
            .map(|(idx, word)| Cluster::singleton(ClusterId(idx as u64), word.clone()))
            .collect();
        let mut next_id = leaves.len() as u64;
        let mut merges = Vec::with_capacity(leaves.len().saturating_sub(1));
        self.metrics.words = leaves.len();

        if self.config.show_progress {
            info!("clustering {} words", leaves.len());
        }

        while live.len() > 1 {
            let (i, j, similarity) = self.best_pair(&live)?;
            // Larger cluster survives; on equal sizes the earlier one does.
            let (keep, gone) = if live[j].len() > live[i].len() {
                (j, i)
            } else {
                (i, j)
            };
            let absorbed = live.remove(gone);
            let keep = if gone < keep { keep - 1 } else { keep };
            let survivor = &mut live[keep];
            let merge = Merge {
                survivor: survivor.id,
                absorbed: absorbed.id,
                merged: ClusterId(next_id),
                similarity,
                size: survivor.len() + absorbed.len(),
            };
            next_id += 1;
            survivor.words.extend(absorbed.words);
            survivor.id = merge.merged;
            self.evict(merge.survivor, merge.absorbed);

            debug!(
                "merged {} into {} as {} (similarity {:.4}, size {})",
                merge.absorbed, merge.survivor, merge.merged, merge.similarity, merge.size
            );
            merges.push(merge);
            if self.config.show_progress && merges.len() % 100 == 0 {
                info!("{} merges, {} clusters left", merges.len(), live.len());
            }
        }

        self.metrics.merges = merges.len();
        self.metrics.duration = started.elapsed();
        if self.config.show_progress {
            info!(
                "completed {} merges in {:.2?}; cache hit rate {:.1}%",
                self.metrics.merges,
                self.metrics.duration,
                self.metrics.hit_rate() * 100.0
            );
        }
        Ok((Dendrogram { leaves, merges }, self.metrics))
    }

    /// Highest-scoring pair of live positions; ties go to the lowest positions.
    fn best_pair(&mut self, live: &[Cluster]) -> Result<(usize, usize, f64)> {
        let mut scored = Vec::new();
        let mut missing = Vec::new();
        for i in 0..live.len() {
            for j in (i + 1)..live.len() {
                match self.cache.get(&cache_key(live[i].id, live[j].id)) {
                    Some(&similarity) => scored.push((i, j, similarity)),
                    None => missing.push((i, j)),
                }
            }
        }
        self.metrics.cache_hits += scored.len() as u64;
        self.metrics.cache_misses += missing.len() as u64;

        let graph = self.graph;
        let computed: Vec<(usize, usize, f64)> = missing
            .par_iter()
            .map(|&(i, j)| (i, j, cluster_similarity(graph, &live[i], &live[j])))
            .collect();
        for &(i, j, similarity) in &computed {
            self.cache.insert(cache_key(live[i].id, live[j].id), similarity);
        }
        scored.extend(computed);

        scored
            .into_iter()
            .reduce(|best, candidate| {
                let better = candidate.2 > best.2
                    || (candidate.2 == best.2 && (candidate.0, candidate.1) < (best.0, best.1));
                if better {
                    candidate
                } else {
                    best
                }
            })
            .ok_or_else(|| WeaveError::Internal("no cluster pair to merge".into()))
    }

    /// Drops cached scores that name a retired identifier and enforces the capacity bound.
    fn evict(&mut self, a: ClusterId, b: ClusterId) {
        self.cache.retain(|&(x, y), _| x != a && x != b && y != a && y != b);
        if let Some(capacity) = self.config.cache_capacity {
            if self.cache.len() > capacity {
                debug!("similarity cache exceeded {capacity} entries; clearing");
                self.cache.clear();
                self.metrics.cache_resets += 1;
            }
        }
    }
}

fn cache_key(a: ClusterId, b: ClusterId) -> (ClusterId, ClusterId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
