use std::{
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::{
    domain::{
        AcademicYear, AcyclicGraph, Config, CycleError, ModuleCode, ModuleUniverse, PrereqGraph,
    },
    storage::{
        checkpoint::{self, Checkpoint, CheckpointError},
        dataset::{Dataset, DatasetError},
    },
    timing::RunLog,
};

/// Name of the configuration file at the root of a catalogue.
pub const CONFIG_FILE: &str = "prereq-chain.toml";

const DATASET_DIR: &str = "json";
const CHECKPOINT_DIR: &str = "checkpoint";
const CHECKPOINT_FILE: &str = "graph.ckpt";

/// Errors raised while analysing a catalogue.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The cached module data could not be read.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    /// The prerequisite graph is cyclic.
    #[error(transparent)]
    Cycle(#[from] CycleError),
    /// A checkpoint could not be written or restored.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// A module catalogue on disk: the cached dataset, its configuration and
/// its checkpoint.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    dataset: Dataset,
    config: Config,
}

impl Catalog {
    /// Opens the catalogue at `root`, loading its configuration file.
    ///
    /// A missing or unreadable configuration falls back to the defaults.
    #[must_use]
    pub fn open(root: PathBuf) -> Self {
        let config = load_config(&root);
        Self::with_config(root, config)
    }

    /// Opens the catalogue at `root` with an explicit configuration.
    #[must_use]
    pub fn with_config(root: PathBuf, config: Config) -> Self {
        let dataset = Dataset::new(root.join(DATASET_DIR));
        Self {
            root,
            dataset,
            config,
        }
    }

    /// The catalogue's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the active configuration.
    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// The cached module data.
    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Where checkpoints are written and restored from.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join(CHECKPOINT_DIR).join(CHECKPOINT_FILE)
    }

    /// The academic years to read: the configured years, or every year in
    /// the dataset if none are configured.
    #[must_use]
    pub fn years(&self) -> Vec<AcademicYear> {
        if self.config.years().is_empty() {
            self.dataset.available_years()
        } else {
            self.config.years().to_vec()
        }
    }

    /// Collects the module universe.
    ///
    /// A configured sample replaces the module lists. Otherwise the universe
    /// is the union of the module lists of every year read; years without a
    /// list are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if a module list exists but cannot be read.
    pub fn universe(&self) -> Result<ModuleUniverse, DatasetError> {
        if !self.config.sample().is_empty() {
            return Ok(ModuleUniverse::new(self.config.sample().iter().cloned()));
        }

        let mut codes: Vec<ModuleCode> = Vec::new();
        for year in self.years() {
            match self.dataset.module_list(year)? {
                Some(list) => codes.extend(list),
                None => tracing::warn!("No module list for {year}, skipping"),
            }
        }
        Ok(ModuleUniverse::new(codes))
    }

    /// Builds the prerequisite graph from the dataset.
    ///
    /// If reading the dataset fails or panics part way, the partially built
    /// graph is written to the checkpoint before the error is returned or the
    /// panic resumes.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be read.
    #[instrument(level = "debug", skip(self, log))]
    pub fn build(&self, log: &RunLog) -> Result<PrereqGraph, AnalysisError> {
        let universe = self.universe()?;
        log.step(&format!("Found {} module codes", universe.len()));

        let mut graph = PrereqGraph::new(universe);
        self.guarded(&mut graph, |graph| self.populate(graph, log))?;

        log.step(&format!(
            "Built graph with {} vertices and {} edges",
            graph.vertex_count(),
            graph.edge_count()
        ));
        Ok(graph)
    }

    /// Restores the graph from the checkpoint instead of reading the
    /// dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint is missing or invalid.
    pub fn resume(&self, log: &RunLog) -> Result<PrereqGraph, AnalysisError> {
        let Checkpoint { graph, saved_at } = checkpoint::load(&self.checkpoint_path())?;
        log.step(&format!(
            "Resumed graph with {} vertices and {} edges from checkpoint saved at {saved_at}",
            graph.vertex_count(),
            graph.edge_count()
        ));
        Ok(graph)
    }

    /// Checks `graph` for cycles.
    ///
    /// A cyclic graph is written to the checkpoint before the error is
    /// returned, so it can be inspected or resumed after the data is fixed.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Cycle`] if the graph contains a cycle.
    pub fn validate<'g>(
        &self,
        graph: &'g PrereqGraph,
        log: &RunLog,
    ) -> Result<AcyclicGraph<'g>, AnalysisError> {
        log.step("Checking for cycles");
        match graph.validate() {
            Ok(acyclic) => {
                log.step("No cycles found");
                Ok(acyclic)
            }
            Err(e) => {
                self.emergency_checkpoint(graph);
                Err(e.into())
            }
        }
    }

    /// Writes `graph` to the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be written.
    pub fn save_checkpoint(&self, graph: &PrereqGraph) -> Result<(), CheckpointError> {
        checkpoint::save(&self.checkpoint_path(), graph)
    }

    /// Runs `step` on `graph`, checkpointing the graph if the step fails or
    /// panics.
    fn guarded<E>(
        &self,
        graph: &mut PrereqGraph,
        step: impl FnOnce(&mut PrereqGraph) -> Result<(), E>,
    ) -> Result<(), E> {
        match panic::catch_unwind(AssertUnwindSafe(|| step(&mut *graph))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.emergency_checkpoint(graph);
                Err(e)
            }
            Err(payload) => {
                tracing::error!("Graph construction panicked");
                self.emergency_checkpoint(graph);
                panic::resume_unwind(payload)
            }
        }
    }

    fn emergency_checkpoint(&self, graph: &PrereqGraph) {
        let path = self.checkpoint_path();
        match checkpoint::save(&path, graph) {
            Ok(()) => tracing::warn!("Saved graph state to {}", path.display()),
            Err(e) => tracing::error!("Failed to save graph state: {e}"),
        }
    }

    fn populate(&self, graph: &mut PrereqGraph, log: &RunLog) -> Result<(), DatasetError> {
        let years = self.years();

        if self.config.contract_preclusions {
            let mut merges = 0;
            for &year in &years {
                let Some(infos) = self.dataset.module_info(year)? else {
                    tracing::warn!("No module information for {year}, skipping preclusions");
                    continue;
                };
                for info in &infos {
                    if let Some(preclusion) = &info.preclusion {
                        merges += graph.contract_preclusions(&info.module_code, preclusion);
                    }
                }
            }
            log.step(&format!(
                "Contracted {merges} preclusions into {} groups",
                graph.group_count()
            ));
        }

        let codes = graph.universe().codes().to_vec();
        for &year in &years {
            log.step(&format!("Reading per-module information from {year}"));
            let records = self.dataset.module_records(year, &codes)?;
            for (code, record) in codes.iter().zip(&records) {
                if let Some(tree) = &record.prereq_tree {
                    graph.add_prerequisites(code, tree, Some(year));
                }
                graph.add_fulfillments(code, &record.fulfill_requirements, Some(year));
            }
        }

        if self.config.revisit_module_info {
            for &year in &years {
                let Some(infos) = self.dataset.module_info(year)? else {
                    tracing::warn!("No module information for {year}, skipping revisit");
                    continue;
                };
                log.step(&format!("Revisiting module information from {year}"));
                for info in infos {
                    let Some(prerequisite) = &info.prerequisite else {
                        continue;
                    };
                    if !graph.universe().contains(&info.module_code) {
                        continue;
                    }
                    for code in ModuleCode::find_all(prerequisite) {
                        graph.add_edge(&info.module_code, &code, Some(year));
                    }
                }
            }
        }

        Ok(())
    }
}

fn load_config(root: &Path) -> Config {
    let path = root.join(CONFIG_FILE);
    Config::load(&path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config from {}: {e}", path.display());
        Config::default()
    })
}
