//! Per-root VCS history providers.

mod git;

pub use git::{GitProvider, RawCommit, RawRef, RepoData, read_repository};

use anyhow::Result;

use crate::model::{CommitHash, FilterCollection};

/// Slow per-root history access. Scans are bounded by a match count; the
/// caller treats "bound reached" as "more may exist".
pub trait VcsProvider: Send + Sync {
    /// Walk history newest-first and return up to `max_count` commits
    /// matching the collection's detail filters, as (hash, timestamp).
    fn commits_matching(
        &self,
        filters: &FilterCollection,
        max_count: u32,
    ) -> Result<Vec<(CommitHash, i64)>>;
}
