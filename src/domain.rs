//! Domain models for prerequisite-chain analysis.
//!
//! This module contains the module universe, the disjoint-set registry used
//! for vertex contraction, the prerequisite graph and the algorithms run
//! over it, plus configuration.

/// Module codes and the code/index lookup.
pub mod module;
pub use module::{InvalidModuleCode, ModuleCode, ModuleIndex, ModuleUniverse};

/// Union-find over module indices.
pub mod disjoint_set;
pub use disjoint_set::DisjointSet;

mod prereq;
pub use prereq::{Branch, Leaves, PrereqTree};

mod provenance;
pub use provenance::{AcademicYear, EdgeMetadata, InvalidAcademicYear};

/// The contracted prerequisite graph.
pub mod graph;
pub use graph::{AcyclicGraph, CycleError, GraphParts, InvalidParts, PrereqGraph};

mod cycle;

/// Longest-path computation and its results.
pub mod longest_path;
pub use longest_path::{LongestPaths, PathRecord};

mod config;
pub use config::Config;
