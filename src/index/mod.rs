//! Detail index and top-commits cache.
//!
//! Detail filters (text, user, date) need commit metadata. The index
//! answers them for roots whose history has been fully indexed; for
//! everything else the filterer falls back to the in-memory top-commits
//! cache and then to the slow per-root provider scan.

mod sqlite;

pub use sqlite::{IndexRecord, SCHEMA_VERSION, SqliteCommitIndex};

use std::sync::RwLock;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{CommitMetadata, FilterCollection, RootId};

/// Answers detail filters for indexed roots.
pub trait DetailIndex: Send + Sync {
    /// Whether this index can answer the given detail filters at all.
    fn can_filter(&self, filters: &FilterCollection) -> bool;

    fn is_indexed(&self, root: RootId) -> bool;

    /// Commits of the given roots matching the detail filters.
    fn filter(&self, filters: &FilterCollection, roots: &FxHashSet<RootId>) -> FxHashSet<u32>;
}

/// One indexed commit's filterable metadata.
#[derive(Debug, Clone)]
pub struct IndexedCommit {
    pub root: RootId,
    pub author: String,
    pub timestamp: i64,
    pub message: String,
}

#[derive(Default)]
struct MemoryIndexInner {
    commits: FxHashMap<u32, IndexedCommit>,
    indexed_roots: FxHashSet<RootId>,
}

/// In-memory detail index. Roots become indexed as background indexing
/// (or a bulk load from [`SqliteCommitIndex`]) completes.
#[derive(Default)]
pub struct MemoryDetailIndex {
    inner: RwLock<MemoryIndexInner>,
}

impl MemoryDetailIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_commit(&self, commit: u32, entry: IndexedCommit) {
        let mut inner = self.inner.write().expect("index lock poisoned");
        inner.commits.insert(commit, entry);
    }

    /// Declare a root fully indexed. Only then does the index answer
    /// filters for it.
    pub fn mark_indexed(&self, root: RootId) {
        let mut inner = self.inner.write().expect("index lock poisoned");
        inner.indexed_roots.insert(root);
    }

    pub fn metadata_of(&self, commit: u32) -> Option<IndexedCommit> {
        let inner = self.inner.read().expect("index lock poisoned");
        inner.commits.get(&commit).cloned()
    }
}

impl DetailIndex for MemoryDetailIndex {
    fn can_filter(&self, filters: &FilterCollection) -> bool {
        filters.has_detail_filters()
    }

    fn is_indexed(&self, root: RootId) -> bool {
        let inner = self.inner.read().expect("index lock poisoned");
        inner.indexed_roots.contains(&root)
    }

    fn filter(&self, filters: &FilterCollection, roots: &FxHashSet<RootId>) -> FxHashSet<u32> {
        let inner = self.inner.read().expect("index lock poisoned");
        inner
            .commits
            .iter()
            .filter(|(_, entry)| roots.contains(&entry.root))
            .filter(|(_, entry)| {
                filters.text.as_ref().is_none_or(|t| t.matches(&entry.message))
                    && filters.user.as_ref().is_none_or(|u| u.matches(&entry.author))
                    && filters.date.as_ref().is_none_or(|d| d.matches(entry.timestamp))
            })
            .map(|(&commit, _)| commit)
            .collect()
    }
}

/// Bounded cache of metadata for the most recent commits, filled in graph
/// order. Once full, later (older) commits are not admitted.
pub struct TopCommitsCache {
    capacity: usize,
    map: RwLock<FxHashMap<u32, CommitMetadata>>,
}

impl TopCommitsCache {
    pub const DEFAULT_CAPACITY: usize = 5_000;

    pub fn new(capacity: usize) -> Self {
        Self { capacity, map: RwLock::new(FxHashMap::default()) }
    }

    pub fn push(&self, commit: u32, meta: CommitMetadata) {
        let mut map = self.map.write().expect("cache lock poisoned");
        if map.len() < self.capacity {
            map.insert(commit, meta);
        }
    }

    pub fn get(&self, commit: u32) -> Option<CommitMetadata> {
        let map = self.map.read().expect("cache lock poisoned");
        map.get(&commit).cloned()
    }

    pub fn len(&self) -> usize {
        self.map.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TopCommitsCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
