use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{AcademicYear, ModuleCode};

/// Configuration for a prerequisite-chain run.
///
/// Controls which academic years are read, which heuristics are applied
/// while building the graph, and how much of the result is displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The academic years to read data from.
    ///
    /// If this is empty, every year with a module list in the data set is
    /// used.
    years: Vec<AcademicYear>,

    /// An explicit module universe.
    ///
    /// When non-empty, these codes replace the module lists entirely. Useful
    /// for small experiments.
    sample: Vec<ModuleCode>,

    /// Whether modules that preclude each other are contracted into a single
    /// vertex before edges are added.
    pub contract_preclusions: bool,

    /// Whether the free-text `prerequisite` descriptions of the module info
    /// records are scanned for additional prerequisite edges.
    pub revisit_module_info: bool,

    /// Shortest chain length included in the exploratory part of the
    /// report.
    pub explore_from: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            years: default_years(),
            sample: Vec::new(),
            contract_preclusions: false,
            revisit_module_info: false,
            explore_from: default_explore_from(),
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// The configured academic years, in ascending order.
    #[must_use]
    pub fn years(&self) -> &[AcademicYear] {
        &self.years
    }

    /// Replaces the configured academic years.
    pub fn set_years(&mut self, mut years: Vec<AcademicYear>) {
        years.sort();
        years.dedup();
        self.years = years;
    }

    /// The explicit module universe, if any.
    #[must_use]
    pub fn sample(&self) -> &[ModuleCode] {
        &self.sample
    }

    /// Replaces the explicit module universe.
    pub fn set_sample(&mut self, sample: Vec<ModuleCode>) {
        self.sample = sample;
    }
}

fn default_years() -> Vec<AcademicYear> {
    (2017..=2022).map(AcademicYear::new).collect()
}

const fn default_explore_from() -> usize {
    4
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_years")]
        years: Vec<AcademicYear>,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sample: Vec<ModuleCode>,

        #[serde(default)]
        contract_preclusions: bool,

        #[serde(default)]
        revisit_module_info: bool,

        #[serde(default = "default_explore_from")]
        explore_from: usize,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                years,
                sample,
                contract_preclusions,
                revisit_module_info,
                explore_from,
            } => {
                let mut config = Self {
                    years: Vec::new(),
                    sample,
                    contract_preclusions,
                    revisit_module_info,
                    explore_from,
                };
                config.set_years(years);
                config
            }
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            years: config.years,
            sample: config.sample,
            contract_preclusions: config.contract_preclusions,
            revisit_module_info: config.revisit_module_info,
            explore_from: config.explore_from,
        }
    }
}
