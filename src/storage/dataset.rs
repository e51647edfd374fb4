//! Read access to a cached module catalogue.
//!
//! The catalogue is a directory of JSON documents, one set per academic
//! year, in the layout written by the catalogue fetcher:
//!
//! ```text
//! json/
//! ├── moduleList/2019-2020.json          [{"moduleCode": ...}, ...]
//! ├── moduleCode/2019-2020/CS2040.json   {"prereqTree": ..., "fulfillRequirements": [...]}
//! └── moduleInfo/2019-2020.json          [{"moduleCode": ..., "preclusion": ..., "prerequisite": ...}, ...]
//! ```
//!
//! Missing documents are not errors: the fetcher skips years and modules it
//! could not download. Malformed documents are.

use std::{
    ffi::OsStr,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, de::DeserializeOwned};
use walkdir::WalkDir;

use crate::domain::{AcademicYear, ModuleCode, PrereqTree};

const MODULE_LIST_DIR: &str = "moduleList";
const MODULE_DIR: &str = "moduleCode";
const MODULE_INFO_DIR: &str = "moduleInfo";

/// An entry of a module list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    /// The module's code.
    pub module_code: ModuleCode,
}

/// The per-module document for one academic year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    /// The prerequisite expression, if the module has one.
    #[serde(default)]
    pub prereq_tree: Option<PrereqTree>,
    /// Requirements this module counts towards.
    #[serde(default)]
    pub fulfill_requirements: Vec<String>,
}

/// An entry of the bulk module information document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    /// The module's code.
    pub module_code: String,
    /// Free-text description of precluded modules.
    #[serde(default)]
    pub preclusion: Option<String>,
    /// Free-text description of prerequisites.
    #[serde(default)]
    pub prerequisite: Option<String>,
}

/// Errors raised while reading the catalogue.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A document exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The document.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// A document is not valid JSON of the expected shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// The document.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },
}

/// A cached module catalogue rooted at a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    /// Opens the catalogue at `root`. Nothing is read until requested.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The catalogue's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Academic years that have a module list, in ascending order.
    #[must_use]
    pub fn available_years(&self) -> Vec<AcademicYear> {
        let mut years: Vec<_> = WalkDir::new(self.root.join(MODULE_LIST_DIR))
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension() == Some(OsStr::new("json")))
            .filter_map(|entry| {
                let stem = entry.path().file_stem()?.to_str()?;
                match stem.parse() {
                    Ok(year) => Some(year),
                    Err(e) => {
                        tracing::debug!("Skipping module list {}: {e}", entry.path().display());
                        None
                    }
                }
            })
            .collect();
        years.sort();
        years
    }

    /// The module codes listed for `year`, or `None` if the year has no
    /// module list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list exists but cannot be read or parsed.
    pub fn module_list(&self, year: AcademicYear) -> Result<Option<Vec<ModuleCode>>, DatasetError> {
        let path = self.root.join(MODULE_LIST_DIR).join(format!("{year}.json"));
        let summaries: Option<Vec<ModuleSummary>> = read_json(&path)?;
        Ok(summaries.map(|list| list.into_iter().map(|s| s.module_code).collect()))
    }

    /// The bulk module information for `year`, or `None` if it was not
    /// fetched.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub fn module_info(&self, year: AcademicYear) -> Result<Option<Vec<ModuleInfo>>, DatasetError> {
        read_json(&self.root.join(MODULE_INFO_DIR).join(format!("{year}.json")))
    }

    /// The per-module document of `code` for `year`. A missing document is
    /// treated as a module without prerequisites or fulfilments.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub fn module_record(
        &self,
        year: AcademicYear,
        code: &ModuleCode,
    ) -> Result<ModuleRecord, DatasetError> {
        let path = self
            .root
            .join(MODULE_DIR)
            .join(year.to_string())
            .join(format!("{code}.json"));
        Ok(read_json(&path)?.unwrap_or_default())
    }

    /// Reads the per-module documents of every code for `year`, in parallel.
    ///
    /// The result is in the same order as `codes`.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered reading any document.
    pub fn module_records(
        &self,
        year: AcademicYear,
        codes: &[ModuleCode],
    ) -> Result<Vec<ModuleRecord>, DatasetError> {
        codes
            .par_iter()
            .map(|code| self.module_record(year, code))
            .collect()
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DatasetError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::trace!("{} not found", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(DatasetError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::{fs, path::Path};

    use crate::domain::AcademicYear;

    /// Writes a catalogue document relative to `root`, creating directories.
    pub fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Writes the module list of `year`.
    pub fn module_list(root: &Path, year: AcademicYear, codes: &[&str]) {
        let entries: Vec<_> = codes
            .iter()
            .map(|code| serde_json::json!({ "moduleCode": code, "title": "" }))
            .collect();
        write(
            root,
            &format!("moduleList/{year}.json"),
            &serde_json::to_string(&entries).unwrap(),
        );
    }

    /// Writes the per-module document of `code` for `year`.
    pub fn module(root: &Path, year: AcademicYear, code: &str, document: &serde_json::Value) {
        write(
            root,
            &format!("moduleCode/{year}/{code}.json"),
            &document.to_string(),
        );
    }
}
