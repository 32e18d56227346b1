//! Word graph: an arena of nodes addressed by [`NodeId`], indexed by [`Token`].

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Result, WeaveError};
use crate::frec::{Count, FrecTable};
use crate::token::Token;

/// Stable handle of a node inside one [`WordGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Graph vertex: a token, how often it was seen, and its links in both directions.
#[derive(Debug, Clone)]
pub struct WordNode {
    token: Token,
    count: Count,
    incoming: FrecTable<NodeId>,
    outgoing: FrecTable<NodeId>,
}

impl WordNode {
    fn new(token: Token, count: Count) -> Self {
        Self {
            token,
            count,
            incoming: FrecTable::new(),
            outgoing: FrecTable::new(),
        }
    }

    /// Token stored on this node.
    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Number of times the token was learned.
    #[must_use]
    pub fn count(&self) -> Count {
        self.count
    }

    /// Predecessors ranked by frequency.
    #[must_use]
    pub fn incoming(&self) -> &FrecTable<NodeId> {
        &self.incoming
    }

    /// Successors ranked by frequency.
    #[must_use]
    pub fn outgoing(&self) -> &FrecTable<NodeId> {
        &self.outgoing
    }

    pub(crate) fn incoming_mut(&mut self) -> &mut FrecTable<NodeId> {
        &mut self.incoming
    }

    pub(crate) fn outgoing_mut(&mut self) -> &mut FrecTable<NodeId> {
        &mut self.outgoing
    }

    /// Similarity of two nodes: agreement of their successors times agreement of their
    /// predecessors.
    #[must_use]
    pub fn similarity(a: &WordNode, b: &WordNode) -> f64 {
        FrecTable::similarity(&a.outgoing, &b.outgoing)
            * FrecTable::similarity(&a.incoming, &b.incoming)
    }
}

/// Owns every [`WordNode`]; nodes live as long as the graph and are never removed.
#[derive(Debug, Clone, Default)]
pub struct WordGraph {
    nodes: Vec<WordNode>,
    index: FxHashMap<Token, NodeId>,
}

impl WordGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when no token was ever added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `true` when `token` is a node.
    #[must_use]
    pub fn contains(&self, token: &Token) -> bool {
        self.index.contains_key(token)
    }

    /// Handle of the node holding `token`.
    #[must_use]
    pub fn id_of(&self, token: &Token) -> Option<NodeId> {
        self.index.get(token).copied()
    }

    /// Node holding `token`.
    #[must_use]
    pub fn node(&self, token: &Token) -> Option<&WordNode> {
        self.id_of(token).map(|id| &self.nodes[id.index()])
    }

    /// Node behind a handle issued by this graph.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&WordNode> {
        self.nodes.get(id.index())
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &WordNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx), node))
    }

    /// Every link as `(from, to, count)`, grouped by source in creation order.
    pub fn links(&self) -> impl Iterator<Item = (&Token, &Token, Count)> + '_ {
        self.nodes.iter().flat_map(move |node| {
            node.outgoing
                .iter()
                .map(move |(count, to)| (&node.token, &self.nodes[to.index()].token, count))
        })
    }

    /// Number of distinct directed links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.nodes.iter().map(|node| node.outgoing.len()).sum()
    }

    /// Count of the link `from -> to`, zero when either side or the link is missing.
    #[must_use]
    pub fn link_weight(&self, from: &Token, to: &Token) -> Count {
        match (self.node(from), self.id_of(to)) {
            (Some(node), Some(to)) => node.outgoing.count(&to),
            _ => 0,
        }
    }

    /// Adds `token` with a count of one, or bumps the count of the existing node.
    pub fn add_word(&mut self, token: &Token) -> NodeId {
        if let Some(id) = self.id_of(token) {
            let node = &mut self.nodes[id.index()];
            node.count = node.count.saturating_add(1);
            return id;
        }
        self.push_node(token.clone(), 1)
    }

    /// Records the link `prev -> next` in both adjacent tables. Both tokens must be nodes.
    pub fn add_link(&mut self, prev: &Token, next: &Token) -> Result<()> {
        let from = self
            .id_of(prev)
            .ok_or_else(|| WeaveError::UnknownToken(prev.to_string()))?;
        let to = self
            .id_of(next)
            .ok_or_else(|| WeaveError::UnknownToken(next.to_string()))?;
        self.add_link_ids(from, to);
        Ok(())
    }

    pub(crate) fn add_link_ids(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.index()].outgoing.add(to);
        self.nodes[to.index()].incoming.add(from);
    }

    /// Inserts a node restored from storage; duplicates are corruption.
    pub(crate) fn insert_restored(&mut self, token: Token, count: Count) -> Result<NodeId> {
        if self.contains(&token) {
            return Err(WeaveError::Corrupt(format!("node {token} declared twice")));
        }
        if count == 0 {
            return Err(WeaveError::Corrupt(format!("node {token} has a zero count")));
        }
        Ok(self.push_node(token, count))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut WordNode {
        &mut self.nodes[id.index()]
    }

    fn push_node(&mut self, token: Token, count: Count) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.index.insert(token.clone(), id);
        self.nodes.push(WordNode::new(token, count));
        id
    }

    /// Verifies that every link is recorded with the same count on both of its ends.
    pub fn check_links(&self) -> Result<()> {
        for (id, node) in self.nodes() {
            for (count, to) in node.outgoing.iter() {
                let back = self
                    .get(to)
                    .map_or(0, |target| target.incoming.count(&id));
                if back != count {
                    return Err(WeaveError::Corrupt(format!(
                        "link {} -> {} counted {count} forward but {back} backward",
                        node.token,
                        self.nodes[to.index()].token
                    )));
                }
            }
            for (count, from) in node.incoming.iter() {
                let forward = self
                    .get(from)
                    .map_or(0, |source| source.outgoing.count(&id));
                if forward != count {
                    return Err(WeaveError::Corrupt(format!(
                        "link into {} counted {count} backward but {forward} forward",
                        node.token
                    )));
                }
            }
        }
        Ok(())
    }

    /// Word similarity in `[0, 1]`; zero when either token is missing.
    #[must_use]
    pub fn similarity(&self, a: &Token, b: &Token) -> f64 {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => WordNode::similarity(a, b),
            _ => 0.0,
        }
    }

    /// Estimates how likely a path keeps growing backward through `candidates`.
    ///
    /// `path` is in text order, its first token being the head the next (earlier) word would
    /// attach to. At each position, every candidate present in the graph is weighted by its
    /// incoming mass and scored by its share of the head's incoming links; the rest of the
    /// path contributes `floor + (1 - floor) · P(rest)`. An empty path scores one; a head
    /// unknown to the graph, or no usable candidate, scores zero.
    #[must_use]
    pub fn path_probability(&self, path: &[Token], candidates: &[Token], floor: f64) -> f64 {
        let mut seen = FxHashSet::default();
        let candidates: Vec<(NodeId, f64)> = candidates
            .iter()
            .filter_map(|token| self.id_of(token))
            .filter(|id| seen.insert(*id))
            .map(|id| (id, self.nodes[id.index()].incoming.total() as f64))
            .collect();
        let mass: f64 = candidates.iter().map(|&(_, weight)| weight).sum();

        // Folded from the tail so long paths do not recurse.
        let mut probability = 1.0;
        for head in path.iter().rev() {
            let Some(head) = self.node(head) else {
                return 0.0;
            };
            if mass <= 0.0 {
                return 0.0;
            }
            let continuation = floor + (1.0 - floor) * probability;
            let weighted: f64 = candidates
                .iter()
                .map(|(id, weight)| weight * head.incoming.frequency(id) * continuation)
                .sum();
            probability = weighted / mass;
        }
        probability
    }
}
