/// Read access to the cached module catalogue.
pub mod dataset;
pub use dataset::{Dataset, DatasetError, ModuleInfo, ModuleRecord};

/// Binary snapshots of a prerequisite graph.
pub mod checkpoint;
pub use checkpoint::{Checkpoint, CheckpointError};

mod catalog;
pub use catalog::{AnalysisError, CONFIG_FILE, Catalog};
