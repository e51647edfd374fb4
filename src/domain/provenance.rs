use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::domain::ModuleCode;

/// An academic year, identified by the calendar year it starts in.
///
/// Displayed the way the module catalogue names its data sets, e.g.
/// `2019-2020`. Used as the provenance tag of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcademicYear(u16);

impl AcademicYear {
    /// Creates the academic year starting in `start`.
    #[must_use]
    pub const fn new(start: u16) -> Self {
        Self(start)
    }

    /// The calendar year the academic year starts in.
    #[must_use]
    pub const fn start(self) -> u16 {
        self.0
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.0, u32::from(self.0) + 1)
    }
}

impl FromStr for AcademicYear {
    type Err = InvalidAcademicYear;

    /// Accepts either `2019` or `2019-2020`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidAcademicYear(s.to_string());
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (start, Some(end)),
            None => (s, None),
        };

        let start: u16 = start.parse().map_err(|_| invalid())?;
        if let Some(end) = end {
            let end: u32 = end.parse().map_err(|_| invalid())?;
            if end != u32::from(start) + 1 {
                return Err(invalid());
            }
        }

        Ok(Self(start))
    }
}

/// Error returned when an academic year cannot be parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid academic year '{0}': expected YYYY or YYYY-YYYY")]
pub struct InvalidAcademicYear(String);

/// Informational record of which academic years produced each edge.
///
/// Keyed by the codes at the representative index of each endpoint, so
/// contracted groups are reported under a single code. Never affects the
/// shape of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeMetadata {
    tags: BTreeMap<ModuleCode, BTreeMap<ModuleCode, BTreeSet<AcademicYear>>>,
}

impl EdgeMetadata {
    /// Records that the edge `from -> to` was seen in `year`.
    pub fn record(&mut self, from: &ModuleCode, to: &ModuleCode, year: AcademicYear) {
        self.tags
            .entry(from.clone())
            .or_default()
            .entry(to.clone())
            .or_default()
            .insert(year);
    }

    /// The years in which `from -> to` was seen, if any.
    #[must_use]
    pub fn years(&self, from: &str, to: &str) -> Option<&BTreeSet<AcademicYear>> {
        self.tags.get(from)?.get(to)
    }

    /// Iterates over every tagged edge in code order.
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&ModuleCode, &ModuleCode, &BTreeSet<AcademicYear>)> + '_ {
        self.tags
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |(to, years)| (from, to, years)))
    }

    /// Number of tagged edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.values().map(BTreeMap::len).sum()
    }

    /// Whether no edge has been tagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
