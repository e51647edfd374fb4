//! Longest prerequisite chains in a university module catalogue.
//!
//! Modules and their prerequisite relations form a directed graph. Modules
//! that preclude each other can be contracted into a single vertex. Once the
//! graph is known to be acyclic, the longest chain of prerequisites ending at
//! every vertex is computed.

pub mod domain;
pub use domain::{AcyclicGraph, Config, CycleError, LongestPaths, ModuleCode, PrereqGraph};

/// Dataset, checkpoint and run orchestration.
pub mod storage;
pub use storage::{AnalysisError, Catalog};

pub mod timing;
pub use timing::RunLog;
