//! Refs model: named branch/tag heads per repository root.

use rustc_hash::{FxHashMap, FxHashSet};

use super::commit::RootId;

/// A named ref pointing at a commit (by interned commit index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsRef {
    pub name: String,
    pub commit: u32,
    pub root: RootId,
    pub is_branch: bool,
}

/// All refs known to one data pack, with a by-commit lookup.
#[derive(Debug, Default, Clone)]
pub struct RefsModel {
    refs: Vec<VcsRef>,
    by_commit: FxHashMap<u32, Vec<usize>>,
}

impl RefsModel {
    pub fn new(refs: Vec<VcsRef>) -> Self {
        let mut by_commit: FxHashMap<u32, Vec<usize>> = FxHashMap::default();
        for (i, r) in refs.iter().enumerate() {
            by_commit.entry(r.commit).or_default().push(i);
        }
        Self { refs, by_commit }
    }

    pub fn refs(&self) -> &[VcsRef] {
        &self.refs
    }

    pub fn refs_to_commit(&self, commit: u32) -> Vec<&VcsRef> {
        self.by_commit
            .get(&commit)
            .map(|ids| ids.iter().map(|&i| &self.refs[i]).collect())
            .unwrap_or_default()
    }

    pub fn branches(&self) -> impl Iterator<Item = &VcsRef> {
        self.refs.iter().filter(|r| r.is_branch)
    }

    /// Commit indices of every branch head, optionally restricted to roots.
    pub fn branch_heads(&self, roots: Option<&FxHashSet<RootId>>) -> FxHashSet<u32> {
        self.branches()
            .filter(|r| roots.is_none_or(|set| set.contains(&r.root)))
            .map(|r| r.commit)
            .collect()
    }

    /// Branch heads whose name is in `names`, restricted to `roots` if given.
    pub fn heads_matching_names(
        &self,
        names: &[String],
        roots: Option<&FxHashSet<RootId>>,
    ) -> FxHashSet<u32> {
        self.branches()
            .filter(|r| names.iter().any(|n| n == &r.name))
            .filter(|r| roots.is_none_or(|set| set.contains(&r.root)))
            .map(|r| r.commit)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
