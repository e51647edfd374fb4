use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    str::FromStr,
    sync::LazyLock,
};

use non_empty_string::NonEmptyString;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern used to pick module codes out of free text.
///
/// Two to four uppercase letters, four digits, then any number of uppercase
/// suffix letters. For example `CS1010`, `MA1101R` or `DSA1101`.
static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{2,4}[0-9]{4}[A-Z]*").expect("pattern is valid"));

/// A module (course) code such as `CS1010S`.
///
/// Codes coming from the module lists are taken verbatim; the only
/// requirement is that they are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleCode(NonEmptyString);

impl ModuleCode {
    /// Creates a new `ModuleCode`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidModuleCode`] if the string is empty.
    pub fn new(code: String) -> Result<Self, InvalidModuleCode> {
        NonEmptyString::new(code)
            .map(Self)
            .map_err(|_| InvalidModuleCode)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Extracts every module code embedded in a free-text description.
    ///
    /// Used for preclusion and prerequisite descriptions, which are prose
    /// like `"CS1010 or its equivalent, MA1101R"`. Matching is purely
    /// textual and can both miss and invent codes.
    pub fn find_all(text: &str) -> impl Iterator<Item = Self> + '_ {
        CODE_PATTERN
            .find_iter(text)
            .map(|m| Self(NonEmptyString::new(m.as_str().to_string()).expect("matches are non-empty")))
    }
}

impl Hash for ModuleCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // must agree with `str` so that `Borrow<str>` lookups work
        self.as_str().hash(state);
    }
}

impl Borrow<str> for ModuleCode {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl Deref for ModuleCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for ModuleCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ModuleCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleCode {
    type Err = InvalidModuleCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ModuleCode {
    type Error = InvalidModuleCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleCode> for String {
    fn from(code: ModuleCode) -> Self {
        code.0.into_inner()
    }
}

/// Error returned when a module code is empty.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("module codes must not be empty")]
pub struct InvalidModuleCode;

/// Position of a module in the sorted [`ModuleUniverse`].
///
/// The same type names both raw modules and representative vertices of the
/// contracted graph; a representative is simply the index that the
/// disjoint set currently reports as the root of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleIndex(u32);

impl ModuleIndex {
    /// Returns the index as a `usize`, for addressing arrays.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw `u32` value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// # Panics
    ///
    /// Panics if `index` does not fit in a `u32`. Universes are bounded by
    /// [`ModuleUniverse::new`], so indices derived from one never do.
    pub(crate) fn from_usize(index: usize) -> Self {
        Self(u32::try_from(index).expect("module index exceeds u32"))
    }
}

impl fmt::Display for ModuleIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The fixed, sorted set of module codes considered in a run.
///
/// This is the single bidirectional lookup between codes and indices: the
/// index of a code is its position in sorted order, so index order and code
/// order agree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleUniverse {
    codes: Vec<ModuleCode>,
    index: HashMap<ModuleCode, ModuleIndex>,
}

impl ModuleUniverse {
    /// Builds a universe from any collection of codes. Duplicates are
    /// removed and the result is sorted.
    ///
    /// # Panics
    ///
    /// Panics if there are more than `u32::MAX` distinct codes.
    #[must_use]
    pub fn new(codes: impl IntoIterator<Item = ModuleCode>) -> Self {
        let mut codes: Vec<_> = codes.into_iter().collect();
        codes.sort();
        codes.dedup();
        assert!(
            u32::try_from(codes.len()).is_ok(),
            "module universe exceeds u32::MAX codes"
        );

        let index = codes
            .iter()
            .enumerate()
            .map(|(i, code)| (code.clone(), ModuleIndex::from_usize(i)))
            .collect();

        Self { codes, index }
    }

    /// Rebuilds a universe from codes that must already be sorted and
    /// unique, as stored in a checkpoint.
    pub(crate) fn from_sorted(codes: Vec<ModuleCode>) -> Option<Self> {
        if codes.windows(2).any(|pair| pair[0] >= pair[1]) {
            return None;
        }
        Some(Self::new(codes))
    }

    /// Looks up the index of a code. Unknown codes yield `None`.
    #[must_use]
    pub fn index_of(&self, code: &str) -> Option<ModuleIndex> {
        self.index.get(code).copied()
    }

    /// Returns the code stored at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not belong to this universe.
    #[must_use]
    pub fn code(&self, index: ModuleIndex) -> &ModuleCode {
        &self.codes[index.get()]
    }

    /// Whether `code` belongs to the universe.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    /// Number of codes in the universe.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the universe has no codes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// The codes, in index order.
    #[must_use]
    pub fn codes(&self) -> &[ModuleCode] {
        &self.codes
    }

    /// Iterates over `(index, code)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleIndex, &ModuleCode)> + '_ {
        self.codes
            .iter()
            .enumerate()
            .map(|(i, code)| (ModuleIndex::from_usize(i), code))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn code(s: &str) -> ModuleCode {
        s.parse().unwrap()
    }

    #[test]
    fn empty_code_is_rejected() {
        assert_eq!(ModuleCode::new(String::new()), Err(InvalidModuleCode));
    }

    #[test_case("CS1010 or CS1101S", &["CS1010", "CS1101S"]; "two plain codes")]
    #[test_case("DSA1101, ST2131/MA2116", &["DSA1101", "ST2131", "MA2116"]; "separators")]
    #[test_case("MA1101R and MA1102R", &["MA1101R", "MA1102R"]; "suffix letters")]
    #[test_case("A1234 or ABCDE1234", &["BCDE1234"]; "prefix length bounds")]
    #[test_case("cs1010 is lowercase", &[]; "lowercase ignored")]
    #[test_case("", &[]; "empty text")]
    fn finds_codes_in_text(text: &str, expected: &[&str]) {
        let found: Vec<_> = ModuleCode::find_all(text).collect();
        let found: Vec<&str> = found.iter().map(ModuleCode::as_str).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn universe_is_sorted_and_deduplicated() {
        let universe = ModuleUniverse::new(["MA1100", "CS2040", "CS1010", "CS2040"].map(code));

        let codes: Vec<&str> = universe.codes().iter().map(ModuleCode::as_str).collect();
        assert_eq!(codes, ["CS1010", "CS2040", "MA1100"]);
        assert_eq!(universe.len(), 3);
    }

    #[test]
    fn lookup_is_bidirectional() {
        let universe = ModuleUniverse::new(["CS2040", "CS1010"].map(code));

        for (index, code) in universe.iter() {
            assert_eq!(universe.index_of(code), Some(index));
            assert_eq!(universe.code(index), code);
        }
        assert_eq!(universe.index_of("CS1010").map(ModuleIndex::get), Some(0));
        assert_eq!(universe.index_of("CS9999"), None);
    }

    #[test]
    fn from_sorted_rejects_unsorted_input() {
        assert!(ModuleUniverse::from_sorted(vec![code("CS2040"), code("CS1010")]).is_none());
        assert!(ModuleUniverse::from_sorted(vec![code("CS1010"), code("CS1010")]).is_none());
        assert!(ModuleUniverse::from_sorted(vec![code("CS1010"), code("CS2040")]).is_some());
    }

    #[test]
    fn deserializes_from_plain_string() {
        let parsed: ModuleCode = serde_json::from_str("\"CS1231\"").unwrap();
        assert_eq!(parsed.as_str(), "CS1231");
        assert!(serde_json::from_str::<ModuleCode>("\"\"").is_err());
    }
}
