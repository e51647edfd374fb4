//! Longest directed paths over an acyclic prerequisite graph.
//!
//! Every source vertex (outgoing edges, no incoming edges) is seeded at
//! depth zero and a FIFO work queue relaxes successors until nothing
//! improves. A vertex can be revisited any number of times; termination
//! relies on the graph being acyclic, which the caller must have checked.

use std::collections::{BTreeMap, HashMap, VecDeque};

use nonempty::NonEmpty;
use petgraph::Direction;

use crate::domain::{ModuleIndex, graph::Edges};

/// A directed walk through representative vertices, starting at a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRecord {
    vertices: NonEmpty<ModuleIndex>,
}

impl PathRecord {
    /// Number of edges on the path. A lone source has length zero.
    #[must_use]
    pub fn length(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The vertices, from source to end.
    #[must_use]
    pub const fn vertices(&self) -> &NonEmpty<ModuleIndex> {
        &self.vertices
    }

    /// The source vertex the path starts from.
    #[must_use]
    pub fn source(&self) -> ModuleIndex {
        *self.vertices.first()
    }

    /// The vertex the path ends at.
    #[must_use]
    pub fn end(&self) -> ModuleIndex {
        *self.vertices.last()
    }
}

/// Path records grouped by length.
///
/// Every vertex reachable from a source contributes exactly one record: one
/// longest path ending there. Within a group records are ordered by their
/// vertex sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LongestPaths {
    by_length: BTreeMap<usize, Vec<PathRecord>>,
}

impl LongestPaths {
    /// The greatest path length found, or `None` if the graph has no edges.
    #[must_use]
    pub fn max_length(&self) -> Option<usize> {
        self.by_length.keys().next_back().copied()
    }

    /// Every record achieving [`Self::max_length`].
    #[must_use]
    pub fn longest(&self) -> &[PathRecord] {
        self.by_length
            .values()
            .next_back()
            .map_or(&[], Vec::as_slice)
    }

    /// The records of exactly `length` edges.
    #[must_use]
    pub fn get(&self, length: usize) -> &[PathRecord] {
        self.by_length.get(&length).map_or(&[], Vec::as_slice)
    }

    /// Groups of length `threshold` or more, shortest first.
    pub fn at_least(&self, threshold: usize) -> impl Iterator<Item = (usize, &[PathRecord])> + '_ {
        self.by_length
            .range(threshold..)
            .map(|(&length, records)| (length, records.as_slice()))
    }

    /// Total number of records across all lengths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_length.values().map(Vec::len).sum()
    }

    /// Whether no records were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_length.is_empty()
    }
}

/// Vertices with at least one outgoing edge and no incoming edge, in graph
/// order.
pub(crate) fn sources(edges: &Edges) -> Vec<ModuleIndex> {
    edges
        .nodes()
        .filter(|&n| edges.neighbors_directed(n, Direction::Outgoing).next().is_some())
        .filter(|&n| edges.neighbors_directed(n, Direction::Incoming).next().is_none())
        .collect()
}

/// Computes one longest path ending at every vertex reachable from a source.
///
/// Ties between equally long paths into the same vertex are resolved in
/// favour of whichever is relaxed first. That depends on graph order and is
/// not part of the contract.
///
/// The graph must be acyclic; on a cyclic graph this never terminates.
pub(crate) fn longest_paths(edges: &Edges) -> LongestPaths {
    let mut depth: HashMap<ModuleIndex, usize> = HashMap::new();
    let mut predecessor: HashMap<ModuleIndex, ModuleIndex> = HashMap::new();
    let mut queue = VecDeque::new();

    for source in sources(edges) {
        depth.insert(source, 0);
        queue.push_back(source);
    }

    let mut relaxations = 0_usize;
    while let Some(u) = queue.pop_front() {
        let candidate = depth[&u] + 1;
        for v in edges.neighbors(u) {
            if depth.get(&v).is_none_or(|&current| candidate > current) {
                depth.insert(v, candidate);
                predecessor.insert(v, u);
                queue.push_back(v);
                relaxations += 1;
            }
        }
    }
    tracing::debug!(vertices = depth.len(), relaxations, "relaxation finished");

    let mut by_length: BTreeMap<usize, Vec<PathRecord>> = BTreeMap::new();
    for &end in depth.keys() {
        let record = reconstruct(end, &predecessor);
        by_length.entry(record.length()).or_default().push(record);
    }
    for records in by_length.values_mut() {
        records.sort_by(|a, b| a.vertices.iter().cmp(b.vertices.iter()));
    }

    LongestPaths { by_length }
}

fn reconstruct(end: ModuleIndex, predecessor: &HashMap<ModuleIndex, ModuleIndex>) -> PathRecord {
    let mut reversed = vec![end];
    let mut node = end;
    while let Some(&previous) = predecessor.get(&node) {
        reversed.push(previous);
        node = previous;
    }
    reversed.reverse();

    let vertices = NonEmpty::from_vec(reversed).expect("path contains at least its end vertex");
    PathRecord { vertices }
}
