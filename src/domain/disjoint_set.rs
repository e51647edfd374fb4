//! Union-find over module indices, with an explicit membership set per
//! representative.
//!
//! Contraction is monotonic: groups only ever grow during a run. Every index
//! belongs to exactly one group, and the membership set stored at a
//! representative is exactly the set of indices whose root it is.

use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::domain::ModuleIndex;

/// An array-backed disjoint set with union by rank and path compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisjointSet {
    parent: Vec<ModuleIndex>,
    rank: Vec<u8>,
    /// Members per representative. Non-representatives own an empty set.
    members: Vec<BTreeSet<ModuleIndex>>,
}

impl DisjointSet {
    /// Creates `len` singleton groups.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds `u32::MAX`.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let parent: Vec<_> = (0..len).map(ModuleIndex::from_usize).collect();
        let members = parent.iter().map(|&i| BTreeSet::from([i])).collect();
        Self {
            parent,
            rank: vec![0; len],
            members,
        }
    }

    /// Number of indices tracked (not the number of groups).
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Whether no indices are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Returns the representative of `i`, re-pointing every node on the way
    /// directly at the root.
    pub fn find(&mut self, i: ModuleIndex) -> ModuleIndex {
        let root = self.root(i);

        let mut node = i;
        while self.parent[node.get()] != root {
            let next = self.parent[node.get()];
            self.parent[node.get()] = root;
            node = next;
        }

        root
    }

    /// Returns the representative of `i` without compressing paths.
    #[must_use]
    pub fn root(&self, i: ModuleIndex) -> ModuleIndex {
        let mut root = i;
        while self.parent[root.get()] != root {
            root = self.parent[root.get()];
        }
        root
    }

    /// Whether `i` and `j` are currently in the same group.
    pub fn same_set(&mut self, i: ModuleIndex, j: ModuleIndex) -> bool {
        self.find(i) == self.find(j)
    }

    /// Merges the groups of `i` and `j`.
    ///
    /// The root with the lower rank is attached beneath the other. On a tie
    /// the root of `j` survives and its rank grows by one. The survivor takes
    /// over the absorbed group's members.
    ///
    /// Returns `false` if the two were already in the same group, in which
    /// case nothing changes.
    pub fn union(&mut self, i: ModuleIndex, j: ModuleIndex) -> bool {
        let x = self.find(i);
        let y = self.find(j);
        if x == y {
            return false;
        }

        let (survivor, absorbed) = if self.rank[x.get()] > self.rank[y.get()] {
            (x, y)
        } else {
            if self.rank[x.get()] == self.rank[y.get()] {
                self.rank[y.get()] = self.rank[y.get()].saturating_add(1);
            }
            (y, x)
        };

        self.parent[absorbed.get()] = survivor;
        self.absorb_members(survivor, absorbed);
        true
    }

    /// Moves the members of `absorbed` into `survivor`, always appending the
    /// smaller set onto the larger one.
    fn absorb_members(&mut self, survivor: ModuleIndex, absorbed: ModuleIndex) {
        let mut taken = std::mem::take(&mut self.members[absorbed.get()]);
        let kept = &mut self.members[survivor.get()];
        if taken.len() > kept.len() {
            std::mem::swap(&mut taken, kept);
        }
        kept.append(&mut taken);
    }

    /// The members of the group whose representative is `rep`.
    ///
    /// Returns an empty set if `rep` is not currently a representative.
    #[must_use]
    pub fn members(&self, rep: ModuleIndex) -> &BTreeSet<ModuleIndex> {
        &self.members[rep.get()]
    }

    /// Iterates over the current representatives in index order.
    pub fn representatives(&self) -> impl Iterator<Item = ModuleIndex> + '_ {
        self.parent
            .iter()
            .enumerate()
            .filter(|&(i, p)| p.get() == i)
            .map(|(_, &p)| p)
    }

    /// Exposes the three backing arrays, for persisting.
    #[must_use]
    pub fn to_parts(&self) -> DisjointSetParts {
        DisjointSetParts {
            parent: self.parent.iter().map(|p| p.raw()).collect(),
            rank: self.rank.clone(),
            members: self
                .members
                .iter()
                .map(|set| set.iter().map(|m| m.raw()).collect())
                .collect(),
        }
    }

    /// Rebuilds a disjoint set from persisted arrays, checking that they
    /// describe a valid partition.
    ///
    /// # Errors
    ///
    /// Returns [`CorruptDisjointSet`] if the arrays disagree in length, a
    /// parent is out of range, the parent pointers contain a loop, or the
    /// membership sets are not consistent with the parent pointers.
    pub fn from_parts(parts: DisjointSetParts) -> Result<Self, CorruptDisjointSet> {
        let len = parts.parent.len();
        if parts.rank.len() != len || parts.members.len() != len {
            return Err(CorruptDisjointSet::LengthMismatch);
        }
        let in_range = |raw: u32| (raw as usize) < len;

        if !parts.parent.iter().copied().all(in_range) {
            return Err(CorruptDisjointSet::OutOfRange);
        }
        let parent: Vec<_> = parts.parent.into_iter().map(ModuleIndex::from_raw).collect();

        let mut members = Vec::with_capacity(len);
        for set in parts.members {
            if !set.iter().copied().all(in_range) {
                return Err(CorruptDisjointSet::OutOfRange);
            }
            members.push(set.into_iter().map(ModuleIndex::from_raw).collect::<BTreeSet<_>>());
        }

        let restored = Self {
            parent,
            rank: parts.rank,
            members,
        };
        restored.check_partition()?;
        Ok(restored)
    }

    fn check_partition(&self) -> Result<(), CorruptDisjointSet> {
        let len = self.len();
        let mut owner = vec![None; len];

        for (i, set) in self.members.iter().enumerate() {
            for member in set {
                if owner[member.get()].replace(i).is_some() {
                    return Err(CorruptDisjointSet::Membership);
                }
            }
        }

        for i in 0..len {
            let root = self.bounded_root(ModuleIndex::from_usize(i), len)?;
            if owner[i] != Some(root.get()) {
                return Err(CorruptDisjointSet::Membership);
            }
        }

        Ok(())
    }

    /// Like [`Self::root`], but gives up after `limit` steps so that a
    /// corrupt parent array cannot loop forever.
    fn bounded_root(&self, i: ModuleIndex, limit: usize) -> Result<ModuleIndex, CorruptDisjointSet> {
        let mut root = i;
        for _ in 0..=limit {
            let parent = self.parent[root.get()];
            if parent == root {
                return Ok(root);
            }
            root = parent;
        }
        Err(CorruptDisjointSet::ParentLoop)
    }
}

/// The raw arrays behind a [`DisjointSet`].
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DisjointSetParts {
    /// Parent pointer per index.
    pub parent: Vec<u32>,
    /// Rank per index; only meaningful for representatives.
    pub rank: Vec<u8>,
    /// Membership set per index; empty for non-representatives.
    pub members: Vec<Vec<u32>>,
}

/// Reasons persisted disjoint-set arrays can be rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CorruptDisjointSet {
    /// The parent, rank and membership arrays have different lengths.
    #[error("disjoint-set arrays have different lengths")]
    LengthMismatch,
    /// An index refers outside the arrays.
    #[error("disjoint-set index out of range")]
    OutOfRange,
    /// Following parent pointers never reaches a root.
    #[error("disjoint-set parent pointers contain a loop")]
    ParentLoop,
    /// Membership sets do not match the parent pointers.
    #[error("disjoint-set membership sets do not partition the universe")]
    Membership,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ix(i: u32) -> ModuleIndex {
        ModuleIndex::from_raw(i)
    }

    /// Checks that the membership sets partition `0..len` and agree with the
    /// roots.
    fn assert_partition(set: &DisjointSet) {
        set.check_partition().expect("membership sets must partition");
        let total: usize = set.representatives().map(|r| set.members(r).len()).sum();
        assert_eq!(total, set.len());
    }

    #[test]
    fn starts_as_singletons() {
        let set = DisjointSet::new(4);
        assert_eq!(set.representatives().count(), 4);
        for i in 0..4 {
            assert_eq!(set.root(ix(i)), ix(i));
            assert_eq!(set.members(ix(i)), &BTreeSet::from([ix(i)]));
        }
    }

    #[test]
    fn union_on_tie_keeps_second_root() {
        let mut set = DisjointSet::new(2);
        assert!(set.union(ix(0), ix(1)));

        assert_eq!(set.root(ix(0)), ix(1));
        assert_eq!(set.members(ix(1)), &BTreeSet::from([ix(0), ix(1)]));
        assert!(set.members(ix(0)).is_empty());
    }

    #[test]
    fn lower_rank_root_is_attached_under_higher() {
        let mut set = DisjointSet::new(3);
        set.union(ix(0), ix(1)); // root 1, rank 1
        set.union(ix(1), ix(2)); // 2 has rank 0, so 1 survives

        assert_eq!(set.root(ix(2)), ix(1));
        assert_eq!(set.representatives().collect::<Vec<_>>(), [ix(1)]);
        assert_partition(&set);
    }

    #[test]
    fn union_is_idempotent() {
        let mut set = DisjointSet::new(5);
        set.union(ix(0), ix(3));
        set.union(ix(3), ix(4));
        let before = set.clone();

        assert!(!set.union(ix(4), ix(0)));
        assert!(!set.union(ix(0), ix(0)));
        assert_eq!(set, before);
        assert!(set.same_set(ix(0), ix(4)));
        assert!(!set.same_set(ix(1), ix(2)));
    }

    #[test]
    fn find_compresses_paths() {
        let mut set = DisjointSet::new(4);
        set.union(ix(0), ix(1)); // 0 -> 1
        set.union(ix(2), ix(3)); // 2 -> 3
        set.union(ix(1), ix(3)); // 1 -> 3, so 0 -> 1 -> 3

        assert_eq!(set.parent[0], ix(1));
        assert_eq!(set.find(ix(0)), ix(3));
        assert_eq!(set.parent[0], ix(3));
    }

    #[test]
    fn membership_partitions_after_arbitrary_unions() {
        let mut set = DisjointSet::new(32);
        // deterministic pseudo-random pairs
        let mut state = 7_u32;
        for _ in 0..40 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let a = (state >> 8) % 32;
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let b = (state >> 8) % 32;
            set.union(ix(a), ix(b));
            assert_partition(&set);
        }

        for rep in set.representatives().collect::<Vec<_>>() {
            for &member in set.members(rep) {
                assert_eq!(set.root(member), rep);
            }
        }
    }

    #[test]
    fn parts_round_trip() {
        let mut set = DisjointSet::new(6);
        set.union(ix(0), ix(5));
        set.union(ix(2), ix(5));

        let restored = DisjointSet::from_parts(set.to_parts()).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn from_parts_rejects_inconsistent_membership() {
        let mut parts = DisjointSet::new(3).to_parts();
        parts.members[0].push(1);

        assert_eq!(
            DisjointSet::from_parts(parts),
            Err(CorruptDisjointSet::Membership)
        );
    }

    #[test]
    fn from_parts_rejects_parent_loop() {
        let parts = DisjointSetParts {
            parent: vec![1, 0],
            rank: vec![0, 0],
            members: vec![vec![0], vec![1]],
        };

        assert_eq!(
            DisjointSet::from_parts(parts),
            Err(CorruptDisjointSet::ParentLoop)
        );
    }

    #[test]
    fn from_parts_rejects_length_mismatch() {
        let mut parts = DisjointSet::new(3).to_parts();
        parts.rank.pop();

        assert_eq!(
            DisjointSet::from_parts(parts),
            Err(CorruptDisjointSet::LengthMismatch)
        );
    }
}
