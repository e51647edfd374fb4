use serde::{Deserialize, Serialize};

/// A prerequisite expression: a nested AND/OR tree whose leaves are module
/// codes.
///
/// The graph only ever looks at the leaves, so the logical distinction
/// between "all of" and "one of" is not modelled. Unknown keys
/// in a branch (for instance `nOf`) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrereqTree {
    /// A single module code.
    Module(String),
    /// A branch. Either list may be empty; an empty object has no leaves.
    Branch(Branch),
}

/// The operands of a branch node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Operands that must all be satisfied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<PrereqTree>,
    /// Operands of which one must be satisfied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<PrereqTree>,
}

impl Default for PrereqTree {
    fn default() -> Self {
        Self::Branch(Branch::default())
    }
}

impl PrereqTree {
    /// Iterates over every leaf code, depth first, `and` operands before
    /// `or` operands.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }
}

/// Iterator returned by [`PrereqTree::leaves`].
#[derive(Debug)]
pub struct Leaves<'a> {
    stack: Vec<&'a PrereqTree>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                PrereqTree::Module(code) => return Some(code),
                PrereqTree::Branch(branch) => {
                    // pushed in reverse so that operands come out in order
                    self.stack.extend(branch.or.iter().rev());
                    self.stack.extend(branch.and.iter().rev());
                }
            }
        }
        None
    }
}
