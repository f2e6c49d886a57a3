//! The filtering algorithm: filter specification in, visible pack out.
//!
//! Query planning goes cheapest-first: exact hash lookups, then head
//! resolution from refs, then detail resolution via the index, the
//! in-memory top-commits cache, and finally the bounded per-root provider
//! scan.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::graph::SortOrder;
use crate::index::{DetailIndex, TopCommitsCache};
use crate::model::{CommitCountStage, CommitHash, CommitId, FilterCollection, RootId};

use super::pack::{DataPack, VisiblePack};

/// Marker error for a computation superseded by a fresher request batch.
/// Not a failure: the worker silently restarts with the latest batch.
#[derive(Debug)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("filter computation superseded by a newer request")
    }
}

impl std::error::Error for Cancelled {}

/// Cooperative cancellation token: trips once the shared generation
/// counter moves past the value captured at computation start.
#[derive(Debug, Clone)]
pub struct CancelToken {
    generation: Arc<AtomicU64>,
    seen: u64,
}

impl CancelToken {
    pub fn new(generation: Arc<AtomicU64>) -> Self {
        let seen = generation.load(Ordering::SeqCst);
        Self { generation, seen }
    }

    /// A token that never trips, for direct synchronous filter calls.
    pub fn never() -> Self {
        Self::new(Arc::new(AtomicU64::new(0)))
    }

    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.seen
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }
}

/// Pure filtering over an immutable data pack.
pub struct Filterer {
    index: Arc<dyn DetailIndex>,
    cache: Arc<TopCommitsCache>,
}

impl Filterer {
    pub fn new(index: Arc<dyn DetailIndex>, cache: Arc<TopCommitsCache>) -> Self {
        Self { index, cache }
    }

    /// Compute the visible pack for `filters` over `data_pack`.
    ///
    /// Deterministic given its inputs; the only unbounded work is the
    /// per-root provider scan, capped by `stage`. Returns the stage the
    /// result was computed at.
    pub fn filter(
        &self,
        data_pack: &Arc<DataPack>,
        sort: SortOrder,
        filters: &FilterCollection,
        stage: CommitCountStage,
        cancel: &CancelToken,
    ) -> Result<(Arc<VisiblePack>, CommitCountStage)> {
        if !filters.hash_tokens().is_empty() {
            return self.filter_by_hash(data_pack, sort, filters, stage, cancel);
        }

        let heads = self.matching_heads(data_pack, filters);
        if let Some(heads) = &heads
            && heads.is_empty()
        {
            debug!("head filters matched no refs");
            return Ok((VisiblePack::sentinel(data_pack.clone(), filters.clone()), stage));
        }

        let mut can_request_more = false;
        let commits = if filters.has_detail_filters() {
            let (matches, more) =
                self.matching_details(data_pack, filters, heads.as_ref(), stage, cancel)?;
            if matches.is_empty() {
                debug!("detail filters matched no commits");
                return Ok((VisiblePack::sentinel(data_pack.clone(), filters.clone()), stage));
            }
            can_request_more = more;
            Some(matches)
        } else {
            None
        };

        let visible =
            data_pack.graph().create_visible_graph(sort, heads.as_ref(), commits.as_ref());
        let pack = VisiblePack::new(data_pack.clone(), visible, can_request_more, filters.clone());
        Ok((pack, stage))
    }

    /// Fast path: hashes must be shown regardless of other filters. An
    /// accompanying text filter is still evaluated and unioned in; head and
    /// remaining detail filters are ignored entirely.
    fn filter_by_hash(
        &self,
        data_pack: &Arc<DataPack>,
        sort: SortOrder,
        filters: &FilterCollection,
        stage: CommitCountStage,
        cancel: &CancelToken,
    ) -> Result<(Arc<VisiblePack>, CommitCountStage)> {
        let storage = data_pack.storage();
        let mut commits: FxHashSet<u32> = FxHashSet::default();

        for token in filters.hash_tokens() {
            match CommitHash::from_hex(token) {
                Ok(hash) => commits.extend(storage.find_hash(&hash)),
                Err(_) => commits.extend(storage.find_prefix(token, None)),
            }
        }

        let mut can_request_more = false;
        if filters.text.is_some() {
            let text_only = filters.text_only();
            let (matches, more) =
                self.matching_details(data_pack, &text_only, None, stage, cancel)?;
            commits.extend(matches);
            can_request_more = more;
        }

        if commits.is_empty() {
            debug!("hash filter resolved no commits");
            return Ok((VisiblePack::sentinel(data_pack.clone(), filters.clone()), stage));
        }

        let visible = data_pack.graph().create_visible_graph(sort, None, Some(&commits));
        let pack = VisiblePack::new(data_pack.clone(), visible, can_request_more, filters.clone());
        Ok((pack, stage))
    }

    /// Resolve head filters to the set of matching head commits.
    ///
    /// `None` means "no restriction" and is returned iff no branch,
    /// revision, root, or structure filter is present. An empty set means
    /// "matches nothing" and short-circuits to the sentinel upstream.
    fn matching_heads(
        &self,
        data_pack: &DataPack,
        filters: &FilterCollection,
    ) -> Option<FxHashSet<u32>> {
        if !filters.has_head_filters() {
            return None;
        }

        let allowed_roots = self.allowed_roots(data_pack, filters);
        let refs = data_pack.refs();

        if filters.branch.is_none() && filters.revision.is_none() {
            // Root/structure restriction only: every branch head of the
            // allowed roots.
            return Some(refs.branch_heads(allowed_roots.as_ref()));
        }

        let mut heads = FxHashSet::default();
        if let Some(branch) = &filters.branch {
            heads.extend(refs.heads_matching_names(&branch.names, allowed_roots.as_ref()));
        }
        if let Some(revision) = &filters.revision {
            for rev in &revision.revisions {
                if allowed_roots.as_ref().is_none_or(|roots| roots.contains(&rev.root))
                    && let Some(commit) = data_pack.storage().lookup(rev)
                {
                    heads.insert(commit);
                }
            }
        }
        Some(heads)
    }

    /// Roots admitted by the root and structure filters, `None` when both
    /// are absent.
    fn allowed_roots(
        &self,
        data_pack: &DataPack,
        filters: &FilterCollection,
    ) -> Option<FxHashSet<RootId>> {
        let mut allowed: Option<FxHashSet<RootId>> = None;
        if let Some(root_filter) = &filters.root {
            allowed = Some(root_filter.roots.iter().copied().collect());
        }
        if let Some(structure) = &filters.structure {
            let structure_roots: FxHashSet<RootId> = structure
                .paths
                .iter()
                .filter_map(|p| data_pack.root_containing(p))
                .collect();
            allowed = Some(match allowed {
                Some(roots) => roots.intersection(&structure_roots).copied().collect(),
                None => structure_roots,
            });
        }
        allowed
    }

    /// Resolve detail filters to a commit set: index for indexed roots,
    /// cache-then-provider for the rest.
    fn matching_details(
        &self,
        data_pack: &Arc<DataPack>,
        filters: &FilterCollection,
        heads: Option<&FxHashSet<u32>>,
        stage: CommitCountStage,
        cancel: &CancelToken,
    ) -> Result<(FxHashSet<u32>, bool)> {
        let visible_roots: FxHashSet<RootId> = match self.allowed_roots(data_pack, filters) {
            Some(roots) => roots,
            None => data_pack.roots().iter().map(|r| r.id).collect(),
        };

        let mut result = FxHashSet::default();
        let mut can_request_more = false;

        let index_usable = self.index.can_filter(filters);
        let indexed: FxHashSet<RootId> = if index_usable {
            visible_roots.iter().copied().filter(|&r| self.index.is_indexed(r)).collect()
        } else {
            FxHashSet::default()
        };

        if !indexed.is_empty() {
            result.extend(self.index.filter(filters, &indexed));
        }

        let unindexed: FxHashSet<RootId> =
            visible_roots.difference(&indexed).copied().collect();
        if unindexed.is_empty() {
            return Ok((result, can_request_more));
        }

        let cache_matches = self.filter_with_cache(data_pack, filters, heads, &unindexed);

        if !stage.is_all() && cache_matches.len() as u32 >= stage.count() {
            // The cache walk stopped at the bound, not at the end of
            // history; a later stage may find more.
            result.extend(cache_matches);
            can_request_more = true;
            return Ok((result, can_request_more));
        }

        for &root in &unindexed {
            cancel.check()?;
            let Some(provider) = data_pack.provider(root) else {
                debug!(root = root.as_u32(), "no provider for unindexed root, skipping slow scan");
                continue;
            };
            let scanned = match provider.commits_matching(filters, stage.count()) {
                Ok(scanned) => scanned,
                Err(e) => {
                    warn!(root = root.as_u32(), error = %e, "provider scan failed");
                    continue;
                }
            };
            if !stage.is_all() && scanned.len() as u32 >= stage.count() {
                can_request_more = true;
            }
            for (hash, _) in scanned {
                if let Some(commit) = data_pack.storage().lookup(&CommitId::new(hash, root)) {
                    result.insert(commit);
                }
            }
        }

        result.extend(cache_matches);
        Ok((result, can_request_more))
    }

    /// Walk the graph in order through the top-commits cache until the
    /// first metadata gap. A cache match is accepted only if it reaches at
    /// least one matching head.
    fn filter_with_cache(
        &self,
        data_pack: &DataPack,
        filters: &FilterCollection,
        heads: Option<&FxHashSet<u32>>,
        unindexed: &FxHashSet<RootId>,
    ) -> FxHashSet<u32> {
        let graph = data_pack.graph();
        let storage = data_pack.storage();
        let mut matches = FxHashSet::default();

        for commit in graph.all_commits() {
            let root = storage.commit_id(commit).root;
            if !unindexed.contains(&root) {
                continue;
            }
            let Some(meta) = self.cache.get(commit) else {
                // Metadata gap: everything below is unknown to the cache.
                break;
            };
            if !filters.matches_details(&meta) {
                continue;
            }
            let reaches_head = heads
                .is_none_or(|h| !graph.containing_branches(commit).is_disjoint(h));
            if reaches_head {
                matches.insert(commit);
            }
        }
        matches
    }
}
