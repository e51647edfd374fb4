//! The contracted prerequisite graph.
//!
//! A [`PrereqGraph`] owns the module universe, the disjoint set recording
//! which modules have been contracted together, the edges between
//! representative vertices, and the per-edge provenance metadata.
//!
//! Edges point from a module to each of its prerequisites. Both endpoints
//! are resolved to their representative when the edge is inserted, so
//! contraction is refused once the first edge exists.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use petgraph::{Direction, graphmap::DiGraphMap};
use tracing::instrument;

use crate::domain::{
    AcademicYear, EdgeMetadata, ModuleCode, ModuleIndex, ModuleUniverse, PrereqTree, cycle,
    disjoint_set::{CorruptDisjointSet, DisjointSet, DisjointSetParts},
    longest_path::{self, LongestPaths, PathRecord},
    module::InvalidModuleCode,
};

/// Adjacency between representative vertices.
pub(crate) type Edges = DiGraphMap<ModuleIndex, ()>;

/// A directed prerequisite graph over contracted module groups.
#[derive(Debug, Clone)]
pub struct PrereqGraph {
    universe: ModuleUniverse,
    sets: DisjointSet,
    edges: Edges,
    metadata: EdgeMetadata,
}

impl PrereqGraph {
    /// Creates a graph with no edges in which every module is its own
    /// vertex.
    #[must_use]
    pub fn new(universe: ModuleUniverse) -> Self {
        let sets = DisjointSet::new(universe.len());
        Self {
            universe,
            sets,
            edges: Edges::new(),
            metadata: EdgeMetadata::default(),
        }
    }

    /// The module universe the graph is built over.
    #[must_use]
    pub const fn universe(&self) -> &ModuleUniverse {
        &self.universe
    }

    /// Provenance recorded for the edges added so far.
    #[must_use]
    pub const fn metadata(&self) -> &EdgeMetadata {
        &self.metadata
    }

    /// Contracts two modules into a single vertex.
    ///
    /// Returns `false`, leaving the graph untouched, if either code is
    /// unknown, the two are already contracted, or edges have already been
    /// added. Edges are stored between representatives, so a later merge
    /// would strand them on a vertex that no longer exists.
    pub fn contract(&mut self, a: &str, b: &str) -> bool {
        let (Some(i), Some(j)) = (self.universe.index_of(a), self.universe.index_of(b)) else {
            return false;
        };
        if self.edges.edge_count() > 0 {
            tracing::debug!(a, b, "refusing to contract after edges were added");
            return false;
        }
        self.sets.union(i, j)
    }

    /// Contracts `code` with every module code mentioned in its free-text
    /// preclusion description.
    ///
    /// Modules that cannot both be taken are treated as interchangeable
    /// alternatives. The text matching is approximate. Returns the number of
    /// merges performed, which is zero once edges have been added.
    pub fn contract_preclusions(&mut self, code: &str, preclusion: &str) -> usize {
        if self.edges.edge_count() > 0 {
            tracing::warn!(code, "ignoring preclusions added after edges");
            return 0;
        }
        ModuleCode::find_all(preclusion)
            .filter(|precluded| self.contract(code, precluded))
            .count()
    }

    /// Adds an edge from `from` to `to`, both resolved to their current
    /// representatives.
    ///
    /// Repeated edges are absorbed. When `year` is given it is recorded as
    /// provenance. Returns `false`, leaving the graph untouched, if either
    /// code is outside the universe.
    pub fn add_edge(&mut self, from: &str, to: &str, year: Option<AcademicYear>) -> bool {
        let (Some(u), Some(v)) = (self.universe.index_of(from), self.universe.index_of(to)) else {
            tracing::trace!(from, to, "dropping edge with unknown endpoint");
            return false;
        };

        let u = self.sets.find(u);
        let v = self.sets.find(v);
        self.edges.add_edge(u, v, ());

        if let Some(year) = year {
            self.metadata
                .record(self.universe.code(u), self.universe.code(v), year);
        }
        true
    }

    /// Adds an edge from `code` to every leaf of its prerequisite tree,
    /// whether the leaf sits under an AND or an OR.
    ///
    /// Returns the number of edges accepted.
    pub fn add_prerequisites(
        &mut self,
        code: &str,
        tree: &PrereqTree,
        year: Option<AcademicYear>,
    ) -> usize {
        tree.leaves()
            .filter(|leaf| self.add_edge(code, leaf, year))
            .count()
    }

    /// Adds an edge from every requirement that `code` fulfils back to
    /// `code`.
    ///
    /// Returns the number of edges accepted.
    pub fn add_fulfillments<S: AsRef<str>>(
        &mut self,
        code: &str,
        fulfills: &[S],
        year: Option<AcademicYear>,
    ) -> usize {
        fulfills
            .iter()
            .filter(|requirement| self.add_edge((*requirement).as_ref(), code, year))
            .count()
    }

    /// The vertex a module currently belongs to.
    #[must_use]
    pub fn vertex_of(&self, code: &str) -> Option<ModuleIndex> {
        self.universe.index_of(code).map(|i| self.sets.root(i))
    }

    /// The sorted codes contracted into `vertex`.
    ///
    /// Empty if `vertex` is not a representative.
    #[must_use]
    pub fn group(&self, vertex: ModuleIndex) -> Vec<&ModuleCode> {
        self.sets
            .members(vertex)
            .iter()
            .map(|&member| self.universe.code(member))
            .collect()
    }

    /// Vertices that `vertex` has edges to (its prerequisites).
    pub fn successors(&self, vertex: ModuleIndex) -> impl Iterator<Item = ModuleIndex> + '_ {
        self.edges.neighbors_directed(vertex, Direction::Outgoing)
    }

    /// Vertices with edges to `vertex` (modules that require it).
    pub fn predecessors(&self, vertex: ModuleIndex) -> impl Iterator<Item = ModuleIndex> + '_ {
        self.edges.neighbors_directed(vertex, Direction::Incoming)
    }

    /// Number of vertices touched by at least one edge.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.edges.node_count()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.edge_count()
    }

    /// Number of groups, including modules that were never contracted.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.sets.representatives().count()
    }

    /// Vertices with outgoing edges but no incoming edges.
    #[must_use]
    pub fn sources(&self) -> Vec<ModuleIndex> {
        longest_path::sources(&self.edges)
    }

    /// Checks that the graph is acyclic.
    ///
    /// This is the gate in front of the longest-path computation, which is
    /// only reachable through the returned [`AcyclicGraph`].
    ///
    /// # Errors
    ///
    /// Returns a [`CycleError`] naming the vertices of a cycle if one exists.
    #[instrument(level = "debug", skip(self), fields(vertices = self.vertex_count(), edges = self.edge_count()))]
    pub fn validate(&self) -> Result<AcyclicGraph<'_>, CycleError> {
        match cycle::find_cycle(&self.edges) {
            Some(cycle) => Err(CycleError {
                groups: cycle
                    .into_iter()
                    .map(|vertex| self.group(vertex).into_iter().cloned().collect())
                    .collect(),
            }),
            None => Ok(AcyclicGraph { graph: self }),
        }
    }

    /// Expands each vertex of a path into its sorted group of module codes.
    #[must_use]
    pub fn render(&self, record: &PathRecord) -> Vec<Vec<&ModuleCode>> {
        record
            .vertices()
            .iter()
            .map(|&vertex| self.group(vertex))
            .collect()
    }

    /// Decomposes the graph into plain data, for persisting.
    ///
    /// Vertices and edges keep their insertion order, so a graph restored
    /// with [`Self::from_parts`] is traversed in exactly the same order.
    #[must_use]
    pub fn to_parts(&self) -> GraphParts {
        GraphParts {
            codes: self.universe.codes().iter().map(ToString::to_string).collect(),
            vertices: self.edges.nodes().map(ModuleIndex::raw).collect(),
            edges: self
                .edges
                .all_edges()
                .map(|(from, to, _)| (from.raw(), to.raw()))
                .collect(),
            metadata: self
                .metadata
                .iter()
                .map(|(from, to, years)| {
                    (
                        from.to_string(),
                        to.to_string(),
                        years.iter().map(|y| y.start()).collect(),
                    )
                })
                .collect(),
            disjoint_set: self.sets.to_parts(),
        }
    }

    /// Rebuilds a graph from persisted parts.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParts`] if the universe is not sorted and unique, the
    /// disjoint-set arrays are corrupt or sized for a different universe, or
    /// a vertex, edge or metadata entry refers to an unknown module.
    pub fn from_parts(parts: GraphParts) -> Result<Self, InvalidParts> {
        let codes = parts
            .codes
            .into_iter()
            .map(ModuleCode::new)
            .collect::<Result<Vec<_>, _>>()?;
        let universe = ModuleUniverse::from_sorted(codes).ok_or(InvalidParts::UnsortedUniverse)?;

        let sets = DisjointSet::from_parts(parts.disjoint_set)?;
        if sets.len() != universe.len() {
            return Err(InvalidParts::SizeMismatch {
                universe: universe.len(),
                disjoint_set: sets.len(),
            });
        }

        let vertex = |raw: u32| {
            if (raw as usize) < universe.len() {
                Ok(ModuleIndex::from_raw(raw))
            } else {
                Err(InvalidParts::VertexOutOfRange(raw))
            }
        };

        let mut edges = Edges::with_capacity(parts.vertices.len(), parts.edges.len());
        for raw in parts.vertices {
            edges.add_node(vertex(raw)?);
        }
        for (from, to) in parts.edges {
            edges.add_edge(vertex(from)?, vertex(to)?, ());
        }

        let mut metadata = EdgeMetadata::default();
        for (from, to, years) in parts.metadata {
            let from = universe
                .index_of(&from)
                .ok_or(InvalidParts::UnknownCode(from))?;
            let to = universe.index_of(&to).ok_or(InvalidParts::UnknownCode(to))?;
            for year in years {
                metadata.record(universe.code(from), universe.code(to), AcademicYear::new(year));
            }
        }

        Ok(Self {
            universe,
            sets,
            edges,
            metadata,
        })
    }
}

/// A [`PrereqGraph`] that has been checked to contain no cycle.
#[derive(Debug, Clone, Copy)]
pub struct AcyclicGraph<'a> {
    graph: &'a PrereqGraph,
}

impl<'a> AcyclicGraph<'a> {
    /// The validated graph.
    #[must_use]
    pub const fn graph(&self) -> &'a PrereqGraph {
        self.graph
    }

    /// Computes one longest path ending at every vertex reachable from a
    /// source, grouped by length.
    #[instrument(level = "debug", skip(self))]
    #[must_use]
    pub fn longest_paths(&self) -> LongestPaths {
        longest_path::longest_paths(&self.graph.edges)
    }
}

/// The graph contains a directed cycle, so longest paths are undefined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct CycleError {
    groups: Vec<Vec<ModuleCode>>,
}

impl CycleError {
    /// The vertices of the cycle, in order, each expanded to its module
    /// codes. The first group is repeated at the end to close the cycle.
    #[must_use]
    pub fn groups(&self) -> &[Vec<ModuleCode>] {
        &self.groups
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle detected: ")?;
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{{")?;
            for (j, code) in group.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{code}")?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

/// A [`PrereqGraph`] as plain data.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GraphParts {
    /// The sorted, unique module universe.
    pub codes: Vec<String>,
    /// Vertices touched by edges, in insertion order.
    pub vertices: Vec<u32>,
    /// Edges between representative indices, in insertion order.
    pub edges: Vec<(u32, u32)>,
    /// Tagged edges as `(from, to, academic start years)`.
    pub metadata: Vec<(String, String, Vec<u16>)>,
    /// The disjoint-set arrays.
    pub disjoint_set: DisjointSetParts,
}

/// Reasons persisted graph parts can be rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidParts {
    /// A stored module code is invalid.
    #[error(transparent)]
    Code(#[from] InvalidModuleCode),
    /// The stored universe is not sorted and unique.
    #[error("module universe is not sorted and unique")]
    UnsortedUniverse,
    /// The disjoint-set arrays are corrupt.
    #[error(transparent)]
    DisjointSet(#[from] CorruptDisjointSet),
    /// The disjoint set covers a different number of modules.
    #[error("disjoint set covers {disjoint_set} modules but the universe has {universe}")]
    SizeMismatch {
        /// Size of the universe.
        universe: usize,
        /// Size of the disjoint set.
        disjoint_set: usize,
    },
    /// A vertex or edge refers outside the universe.
    #[error("vertex index {0} is outside the universe")]
    VertexOutOfRange(u32),
    /// Metadata refers to a code outside the universe.
    #[error("metadata refers to unknown module {0}")]
    UnknownCode(String),
}

#[cfg(test)]
mod tests {
    use petgraph::algo::has_path_connecting;

    use super::*;

    fn universe(codes: &[&str]) -> ModuleUniverse {
        ModuleUniverse::new(codes.iter().map(|c| c.parse().unwrap()))
    }

    fn codes(groups: Vec<Vec<&ModuleCode>>) -> Vec<Vec<String>> {
        groups
            .into_iter()
            .map(|group| group.into_iter().map(ToString::to_string).collect())
            .collect()
    }

    fn reaches(graph: &PrereqGraph, from: &str, to: &str) -> bool {
        let (Some(u), Some(v)) = (graph.vertex_of(from), graph.vertex_of(to)) else {
            return false;
        };
        graph.edges.contains_node(u)
            && graph.edges.contains_node(v)
            && has_path_connecting(&graph.edges, u, v, None)
    }

    #[test]
    fn reports_longest_chain_from_source() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS1231", "CS2040", "CS3243"]));
        graph.add_edge("CS1010", "CS1231", None);
        graph.add_edge("CS1231", "CS2040", None);
        graph.add_edge("CS2040", "CS3243", None);

        let cs1010 = graph.vertex_of("CS1010").unwrap();
        assert_eq!(graph.sources(), [cs1010]);

        let paths = graph.validate().unwrap().longest_paths();
        assert_eq!(paths.max_length(), Some(3));
        assert_eq!(paths.longest().len(), 1);
        assert_eq!(
            codes(graph.render(&paths.longest()[0])),
            [["CS1010"], ["CS1231"], ["CS2040"], ["CS3243"]]
        );
    }

    #[test]
    fn prerequisites_use_every_leaf() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS1101S", "CS1231", "CS2040"]));
        let tree: PrereqTree =
            serde_json::from_str(r#"{"and": [{"or": ["CS1010", "CS1101S"]}, "CS1231"]}"#).unwrap();

        assert_eq!(graph.add_prerequisites("CS2040", &tree, None), 3);

        let cs2040 = graph.vertex_of("CS2040").unwrap();
        let mut successors: Vec<_> = graph
            .successors(cs2040)
            .map(|v| graph.universe().code(v).to_string())
            .collect();
        successors.sort();
        assert_eq!(successors, ["CS1010", "CS1101S", "CS1231"]);
    }

    #[test]
    fn fulfillments_add_reversed_edges() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS2030", "CS2040"]));
        assert_eq!(graph.add_fulfillments("CS1010", &["CS2030", "CS2040"], None), 2);

        let cs1010 = graph.vertex_of("CS1010").unwrap();
        assert_eq!(graph.predecessors(cs1010).count(), 2);
        assert!(reaches(&graph, "CS2030", "CS1010"));
        assert!(!reaches(&graph, "CS1010", "CS2030"));
    }

    #[test]
    fn unknown_endpoint_leaves_graph_unchanged() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS2040"]));
        graph.add_edge("CS2040", "CS1010", Some(AcademicYear::new(2020)));
        let before = graph.to_parts();

        assert!(!graph.add_edge("CS2040", "XX9999", Some(AcademicYear::new(2021))));
        assert!(!graph.add_edge("XX9999", "CS1010", None));
        assert!(!graph.contract("CS1010", "XX9999"));

        assert_eq!(graph.to_parts(), before);
    }

    #[test]
    fn duplicate_edges_are_absorbed_and_years_accumulate() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS2040"]));
        graph.add_edge("CS2040", "CS1010", Some(AcademicYear::new(2019)));
        graph.add_edge("CS2040", "CS1010", Some(AcademicYear::new(2020)));
        graph.add_edge("CS2040", "CS1010", None);

        assert_eq!(graph.edge_count(), 1);
        let years = graph.metadata().years("CS2040", "CS1010").unwrap();
        assert_eq!(years.len(), 2);
    }

    #[test]
    fn edges_connect_representatives() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS1010S", "CS2040"]));
        assert!(graph.contract("CS1010", "CS1010S"));
        graph.add_edge("CS2040", "CS1010", Some(AcademicYear::new(2020)));
        graph.add_edge("CS2040", "CS1010S", Some(AcademicYear::new(2021)));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.vertex_of("CS1010"), graph.vertex_of("CS1010S"));

        // metadata is keyed by the code stored at the representative
        let rep = graph.vertex_of("CS1010").unwrap();
        let rep_code = graph.universe().code(rep).to_string();
        let years = graph.metadata().years("CS2040", &rep_code).unwrap();
        assert_eq!(years.len(), 2);

        let group: Vec<_> = graph.group(rep).iter().map(ToString::to_string).collect();
        assert_eq!(group, ["CS1010", "CS1010S"]);
    }

    #[test]
    fn preclusions_contract_mentioned_codes() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS1010E", "CS1010S", "CS1101S"]));
        let merged =
            graph.contract_preclusions("CS1010", "CS1010E, CS1010S, CS1010X or equivalent");

        // CS1010X is not in the universe
        assert_eq!(merged, 2);
        assert_eq!(graph.group_count(), 2);
        assert_eq!(graph.vertex_of("CS1010E"), graph.vertex_of("CS1010S"));
        assert_ne!(graph.vertex_of("CS1010"), graph.vertex_of("CS1101S"));
    }

    #[test]
    fn contraction_is_refused_once_edges_exist() {
        let mut graph = PrereqGraph::new(universe(&["AA1000", "BB1000", "CC1000"]));
        graph.add_edge("CC1000", "AA1000", None);
        let before = graph.to_parts();

        assert!(!graph.contract("AA1000", "BB1000"));
        assert_eq!(graph.contract_preclusions("AA1000", "AA1000 or BB1000"), 0);
        assert_eq!(graph.to_parts(), before);
        assert_ne!(graph.vertex_of("AA1000"), graph.vertex_of("BB1000"));

        let paths = graph.validate().unwrap().longest_paths();
        assert_eq!(
            codes(graph.render(&paths.longest()[0])),
            [["CC1000"], ["AA1000"]]
        );
    }

    #[test]
    fn cycle_is_reported_with_codes() {
        let mut graph = PrereqGraph::new(universe(&["A1000", "B1000", "C1000"]));
        graph.add_edge("A1000", "B1000", None);
        graph.add_edge("B1000", "C1000", None);
        graph.add_edge("C1000", "A1000", None);

        let err = graph.validate().unwrap_err();
        assert_eq!(err.groups().len(), 4);
        assert_eq!(err.groups().first(), err.groups().last());
        assert!(err.to_string().starts_with("cycle detected: {"));
    }

    #[test]
    fn transitive_shortcut_is_not_a_cycle() {
        let mut graph = PrereqGraph::new(universe(&["A1000", "B1000", "C1000"]));
        graph.add_edge("A1000", "B1000", None);
        graph.add_edge("B1000", "C1000", None);
        graph.add_edge("A1000", "C1000", None);

        assert!(graph.validate().is_ok());
    }

    #[test]
    fn contracting_both_endpoints_creates_self_loop() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS1010S"]));
        graph.contract("CS1010", "CS1010S");
        graph.add_edge("CS1010S", "CS1010", None);

        let err = graph.validate().unwrap_err();
        assert_eq!(err.to_string(), "cycle detected: {CS1010, CS1010S} -> {CS1010, CS1010S}");
    }

    #[test]
    fn contraction_only_adds_reachability_through_the_pair() {
        let all = ["AA1000", "BB1000", "CC1000", "DD1000", "EE1000", "FF1000"];
        let build = |contract: bool| {
            let mut graph = PrereqGraph::new(universe(&all));
            if contract {
                graph.contract("BB1000", "EE1000");
            }
            graph.add_edge("AA1000", "BB1000", None);
            graph.add_edge("CC1000", "DD1000", None);
            graph.add_edge("FF1000", "EE1000", None);
            graph
        };
        let plain = build(false);
        let contracted = build(true);
        let in_pair = |code: &str| code == "BB1000" || code == "EE1000";

        for from in all {
            for to in all {
                if from == to || reaches(&plain, from, to) {
                    continue;
                }
                if reaches(&contracted, from, to) {
                    assert!(
                        in_pair(to) || in_pair(from),
                        "{from} -> {to} became reachable without passing the contracted pair"
                    );
                }
            }
        }
        assert!(!reaches(&contracted, "AA1000", "DD1000"));
        assert!(!reaches(&contracted, "CC1000", "EE1000"));
    }

    #[test]
    fn isolated_modules_never_appear() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS2040", "GE1000"]));
        graph.add_edge("CS2040", "CS1010", None);

        let ge1000 = graph.vertex_of("GE1000").unwrap();
        assert!(!graph.sources().contains(&ge1000));

        let paths = graph.validate().unwrap().longest_paths();
        for (_, records) in paths.at_least(0) {
            for record in records {
                assert!(record.vertices().iter().all(|&v| v != ge1000));
            }
        }
    }

    #[test]
    fn parts_round_trip_preserves_results() {
        let mut graph = PrereqGraph::new(universe(&[
            "CS1010", "CS1010S", "CS1231", "CS2030", "CS2040", "CS3230",
        ]));
        graph.contract("CS1010", "CS1010S");
        graph.add_edge("CS2040", "CS1010S", Some(AcademicYear::new(2019)));
        graph.add_edge("CS2030", "CS1010", Some(AcademicYear::new(2020)));
        graph.add_edge("CS3230", "CS2040", Some(AcademicYear::new(2020)));
        graph.add_edge("CS3230", "CS1231", None);

        let restored = PrereqGraph::from_parts(graph.to_parts()).unwrap();

        assert_eq!(restored.to_parts(), graph.to_parts());
        assert_eq!(
            restored.validate().unwrap().longest_paths(),
            graph.validate().unwrap().longest_paths()
        );
    }

    #[test]
    fn from_parts_rejects_out_of_range_edges() {
        let mut graph = PrereqGraph::new(universe(&["CS1010", "CS2040"]));
        graph.add_edge("CS2040", "CS1010", None);
        let mut parts = graph.to_parts();
        parts.edges.push((0, 7));

        assert_eq!(
            PrereqGraph::from_parts(parts).unwrap_err(),
            InvalidParts::VertexOutOfRange(7)
        );
    }

    #[test]
    fn from_parts_rejects_mismatched_disjoint_set() {
        let mut parts = PrereqGraph::new(universe(&["CS1010", "CS2040"])).to_parts();
        parts.disjoint_set = DisjointSet::new(3).to_parts();

        assert_eq!(
            PrereqGraph::from_parts(parts).unwrap_err(),
            InvalidParts::SizeMismatch {
                universe: 2,
                disjoint_set: 3
            }
        );
    }
}
